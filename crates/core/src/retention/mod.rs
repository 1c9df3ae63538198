//! Retention module - age tiers and epoch-aligned buckets.

mod retention_evaluator;
mod retention_model;

pub use retention_evaluator::*;
pub use retention_model::*;

#[cfg(test)]
mod retention_tests;
