//! Conversation state types

use crate::schema::ExpenseRecord;

/// Per-conversation state. A pending record exists exactly when the
/// conversation is waiting on the user's confirm-or-correct decision,
/// so the two cannot drift apart.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ChatState {
    /// Nothing pending. Photos start an extraction, text gets classified.
    #[default]
    Idle,
    /// A record is pending. Text is treated as a correction (or the
    /// confirm keyword), buttons settle the record.
    AwaitingConfirmation { pending: ExpenseRecord },
}

impl ChatState {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, ChatState::AwaitingConfirmation { .. })
    }

    pub fn pending(&self) -> Option<&ExpenseRecord> {
        match self {
            ChatState::Idle => None,
            ChatState::AwaitingConfirmation { pending } => Some(pending),
        }
    }
}
