//! Durable expense ledger
//!
//! Confirmed records land here and never come back as records: history
//! questions read the raw rows and hand them to the oracle untouched.

mod auth;
mod sheets;

pub use auth::ServiceAccountKey;
pub use sheets::SheetsLedger;

use crate::schema::ExpenseRecord;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Key file missing, unreadable, or not a usable signing key
    #[error("ledger credentials error: {0}")]
    Credentials(String),
    /// Token exchange with the auth endpoint failed
    #[error("ledger auth error: {0}")]
    Auth(String),
    /// The request never produced a usable response
    #[error("ledger request failed: {0}")]
    Request(String),
    /// The spreadsheet API rejected the call
    #[error("ledger API error: {0}")]
    Api(String),
    /// The response did not match the expected shape
    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

/// Append-only store of confirmed expenses
#[async_trait]
pub trait ExpenseLedger: Send + Sync {
    /// Durably append one confirmed record.
    async fn append(&self, record: &ExpenseRecord) -> Result<(), LedgerError>;

    /// All stored rows, oldest first.
    async fn read_all(&self) -> Result<Vec<Vec<String>>, LedgerError>;
}

#[async_trait]
impl<T: ExpenseLedger + ?Sized> ExpenseLedger for Arc<T> {
    async fn append(&self, record: &ExpenseRecord) -> Result<(), LedgerError> {
        (**self).append(record).await
    }

    async fn read_all(&self) -> Result<Vec<Vec<String>>, LedgerError> {
        (**self).read_all().await
    }
}
