//! Capture module - per-minute valuation snapshots for every active account.

mod capture_service;
mod capture_traits;

pub use capture_service::{CaptureOptions, CaptureService};
pub use capture_traits::{ActiveAccountSupplier, ValuationSource};
