//! Collaborator traits consumed by capture.

use async_trait::async_trait;

use crate::errors::Result;
use crate::snapshots::Valuation;

/// Prices an account at call time.
#[async_trait]
pub trait ValuationSource: Send + Sync {
    async fn valuate(&self, account_id: &str) -> Result<Valuation>;
}

/// Supplies the accounts eligible for capture in the current run.
#[async_trait]
pub trait ActiveAccountSupplier: Send + Sync {
    async fn active_accounts(&self) -> Result<Vec<String>>;
}
