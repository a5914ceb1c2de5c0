//! Events that can occur in a conversation

use crate::schema::{ExpenseRecord, TextIntent};

/// Events that trigger state transitions: inbound chat activity plus
/// the outcomes of gateway calls issued by earlier transitions.
#[derive(Debug, Clone)]
pub enum Event {
    // Inbound chat events
    /// `/start` command: reset the conversation and greet.
    Start,
    /// A receipt photo. The file reference still needs URL resolution.
    Photo { file_id: String },
    /// Free text. Correction while awaiting, classified otherwise.
    Text { text: String },
    /// Confirm button on the summary keyboard.
    Confirm,
    /// Edit button on the summary keyboard.
    Edit,

    // Oracle outcomes
    /// Extraction produced a record (from a photo or an expense-shaped
    /// text). Lands in the pending slot.
    Parsed { record: ExpenseRecord },
    ParseFailed,
    /// Free text was routed. Carries the original text for the query path.
    Classified { text: String, intent: TextIntent },
    ClassifyFailed,
    /// Correction produced a replacement record.
    Revised { record: ExpenseRecord },
    ReviseFailed,
    /// Query answered over ledger history.
    Answered { reply: String },
    AnswerFailed,

    // Ledger outcomes
    /// The pending record was appended.
    Saved,
    /// Append failed; the pending record must survive for a retry.
    SaveFailed,
}
