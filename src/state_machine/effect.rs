//! Effects produced by state transitions

use crate::schema::ExpenseRecord;

/// Effects to be executed after a state transition. Gateway effects
/// feed their outcome back in as events within the same handler pass,
/// before the next inbound event is picked up.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Resolve the photo file and run receipt extraction
    ParseReceipt { file_id: String },

    /// Route free text to expense entry or query handling
    ClassifyText { text: String },

    /// Apply a correction instruction to the pending record
    Revise {
        prior: ExpenseRecord,
        instruction: String,
    },

    /// Read ledger history and answer a question over it
    AnswerQuery { question: String },

    /// Append a confirmed record to the ledger
    Append { record: ExpenseRecord },

    /// Plain notice to the chat
    Notify { text: String },

    /// Send the rendered summary with the confirm/edit keyboard
    PresentSummary { text: String },

    /// Remove the keyboard from the last summary message
    ClearAffordance,

    /// Update or recreate the pinned dashboard message
    RefreshDashboard,
}

impl Effect {
    pub fn notify(text: impl Into<String>) -> Self {
        Effect::Notify { text: text.into() }
    }
}
