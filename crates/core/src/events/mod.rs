//! Snapshot update events.
//!
//! Capture publishes one update per appended snapshot. Runtime adapters
//! implement the publisher to deliver it to the account's private channel.

mod publisher;
mod snapshot_update;

pub use publisher::*;
pub use snapshot_update::*;
