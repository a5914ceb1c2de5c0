//! Pure state transition function

use super::{ChatState, Effect, Event};
use crate::format;
use crate::schema::{ExpenseRecord, TextIntent};
use thiserror::Error;

pub const WELCOME_NOTICE: &str =
    "Welcome! Send me a receipt photo to track your expense, or ask me questions about your spending.";
pub const PROCESSING_NOTICE: &str = "Processing receipt...";
pub const SAVED_NOTICE: &str = "Expense saved!";
pub const EDIT_PROMPT: &str = "Reply with the correction you'd like to make.";
pub const PARSE_FAILED_NOTICE: &str = "Failed to parse receipt.";
pub const CLASSIFY_FAILED_NOTICE: &str =
    "Sorry, I couldn't make sense of that. Send a receipt photo, an expense, or a question about your spending.";
pub const REVISE_FAILED_NOTICE: &str = "Failed to apply that correction. Try rephrasing it.";
pub const SAVE_FAILED_NOTICE: &str = "Couldn't save the expense. Press ✅ OK to try again.";
pub const ANSWER_FAILED_NOTICE: &str = "Couldn't answer that right now. Try again in a moment.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ChatState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

/// Bare "yes" confirms the pending record, as an alias for the confirm
/// button.
fn is_confirm_keyword(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("yes")
}

/// Pure transition function: same inputs, same outputs, no I/O. All
/// side effects are returned for the runtime to execute.
pub fn transition(state: &ChatState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Commands
        // ============================================================

        // /start resets the slot; any pending record is dropped
        (_, Event::Start) => {
            Ok(TransitionResult::new(ChatState::Idle).with_effect(Effect::notify(WELCOME_NOTICE)))
        }

        // ============================================================
        // Receipt photos
        // ============================================================

        // Photos are accepted in any state. A fresh extraction replaces
        // the pending slot when it lands (last writer wins), so the
        // state only moves on the Parsed outcome.
        (state, Event::Photo { file_id }) => Ok(TransitionResult::new(state.clone())
            .with_effect(Effect::notify(PROCESSING_NOTICE))
            .with_effect(Effect::ParseReceipt { file_id })),

        (_, Event::Parsed { record }) => Ok(present_for_confirmation(record)),

        (state, Event::ParseFailed) => Ok(TransitionResult::new(state.clone())
            .with_effect(Effect::notify(PARSE_FAILED_NOTICE))),

        // ============================================================
        // Free text while idle
        // ============================================================

        (ChatState::Idle, Event::Text { text }) => {
            Ok(TransitionResult::new(ChatState::Idle).with_effect(Effect::ClassifyText { text }))
        }

        (
            ChatState::Idle,
            Event::Classified {
                intent: TextIntent::Expense(record),
                ..
            },
        ) => Ok(present_for_confirmation(record)),

        (
            ChatState::Idle,
            Event::Classified {
                text,
                intent: TextIntent::Query,
            },
        ) => Ok(TransitionResult::new(ChatState::Idle)
            .with_effect(Effect::AnswerQuery { question: text })),

        (ChatState::Idle, Event::ClassifyFailed) => Ok(TransitionResult::new(ChatState::Idle)
            .with_effect(Effect::notify(CLASSIFY_FAILED_NOTICE))),

        (ChatState::Idle, Event::Answered { reply }) => {
            Ok(TransitionResult::new(ChatState::Idle).with_effect(Effect::notify(reply)))
        }

        (ChatState::Idle, Event::AnswerFailed) => Ok(TransitionResult::new(ChatState::Idle)
            .with_effect(Effect::notify(ANSWER_FAILED_NOTICE))),

        // ============================================================
        // Confirmation loop
        // ============================================================

        (ChatState::AwaitingConfirmation { pending }, Event::Text { text }) => {
            if is_confirm_keyword(&text) {
                Ok(TransitionResult::new(ChatState::AwaitingConfirmation {
                    pending: pending.clone(),
                })
                .with_effect(Effect::Append {
                    record: pending.clone(),
                }))
            } else {
                Ok(TransitionResult::new(ChatState::AwaitingConfirmation {
                    pending: pending.clone(),
                })
                .with_effect(Effect::Revise {
                    prior: pending.clone(),
                    instruction: text,
                }))
            }
        }

        (ChatState::AwaitingConfirmation { pending }, Event::Confirm) => {
            // Stay awaiting until the append outcome arrives, so a
            // failure leaves the record in place for a retry.
            Ok(TransitionResult::new(ChatState::AwaitingConfirmation {
                pending: pending.clone(),
            })
            .with_effect(Effect::Append {
                record: pending.clone(),
            }))
        }

        (ChatState::AwaitingConfirmation { .. }, Event::Revised { record }) => {
            Ok(present_for_confirmation(record))
        }

        (ChatState::AwaitingConfirmation { pending }, Event::ReviseFailed) => {
            Ok(TransitionResult::new(ChatState::AwaitingConfirmation {
                pending: pending.clone(),
            })
            .with_effect(Effect::notify(REVISE_FAILED_NOTICE)))
        }

        (ChatState::AwaitingConfirmation { .. }, Event::Saved) => {
            Ok(TransitionResult::new(ChatState::Idle)
                .with_effect(Effect::ClearAffordance)
                .with_effect(Effect::notify(SAVED_NOTICE))
                .with_effect(Effect::RefreshDashboard))
        }

        (ChatState::AwaitingConfirmation { pending }, Event::SaveFailed) => {
            Ok(TransitionResult::new(ChatState::AwaitingConfirmation {
                pending: pending.clone(),
            })
            .with_effect(Effect::notify(SAVE_FAILED_NOTICE)))
        }

        (ChatState::AwaitingConfirmation { pending }, Event::Edit) => {
            Ok(TransitionResult::new(ChatState::AwaitingConfirmation {
                pending: pending.clone(),
            })
            .with_effect(Effect::notify(EDIT_PROMPT)))
        }

        // Stale button presses after the slot already settled
        (ChatState::Idle, Event::Confirm | Event::Edit) => {
            Ok(TransitionResult::new(ChatState::Idle))
        }

        // Internal outcomes can only follow the effect that requested
        // them; anything else is a routing bug.
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} in {state:?}"
        ))),
    }
}

/// A freshly extracted or revised record always lands in the pending
/// slot with its summary and keyboard presented.
fn present_for_confirmation(record: ExpenseRecord) -> TransitionResult {
    let text = format::render_summary(&record);
    TransitionResult::new(ChatState::AwaitingConfirmation { pending: record })
        .with_effect(Effect::PresentSummary { text })
}
