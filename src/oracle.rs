//! Expense extraction oracle
//!
//! Common interface for the LLM-backed operations: receipt parsing,
//! correction, free-text routing, and history Q&A.

mod error;
mod openai;
mod prompts;

pub use error::{OracleError, OracleErrorKind};
pub use openai::OpenAiOracle;

use crate::schema::{ExpenseRecord, TextIntent};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// The four extraction operations. Every record-returning operation
/// validates against the shared expense schema before returning.
#[async_trait]
pub trait ExpenseOracle: Send + Sync {
    /// Extract a structured record from a receipt photo.
    async fn parse_receipt(&self, image_url: &str) -> Result<ExpenseRecord, OracleError>;

    /// Apply a correction instruction to an existing record. Returns a
    /// complete replacement with only the requested changes applied.
    async fn revise(
        &self,
        prior: &ExpenseRecord,
        instruction: &str,
    ) -> Result<ExpenseRecord, OracleError>;

    /// Route free text to expense entry or history query. `today`
    /// anchors relative dates like "yesterday".
    async fn classify(&self, text: &str, today: NaiveDate) -> Result<TextIntent, OracleError>;

    /// Answer a history question grounded on the raw ledger rows.
    async fn answer(&self, question: &str, rows: &[Vec<String>]) -> Result<String, OracleError>;
}

#[async_trait]
impl<T: ExpenseOracle + ?Sized> ExpenseOracle for Arc<T> {
    async fn parse_receipt(&self, image_url: &str) -> Result<ExpenseRecord, OracleError> {
        (**self).parse_receipt(image_url).await
    }

    async fn revise(
        &self,
        prior: &ExpenseRecord,
        instruction: &str,
    ) -> Result<ExpenseRecord, OracleError> {
        (**self).revise(prior, instruction).await
    }

    async fn classify(&self, text: &str, today: NaiveDate) -> Result<TextIntent, OracleError> {
        (**self).classify(text, today).await
    }

    async fn answer(&self, question: &str, rows: &[Vec<String>]) -> Result<String, OracleError> {
        (**self).answer(question, rows).await
    }
}
