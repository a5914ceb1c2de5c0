//! Per-chat event worker
//!
//! Owns one conversation's state and event queue. Events run through
//! the pure transition function; the returned effects execute here, and
//! gateway outcomes loop back in as events within the same pass, before
//! the next inbound event is taken.

use crate::dashboard::DashboardGateway;
use crate::format;
use crate::ledger::ExpenseLedger;
use crate::oracle::ExpenseOracle;
use crate::state_machine::{transition, ChatState, Effect, Event};
use crate::transport::{ChatApi, ChatId, MessageId};
use chrono::Utc;
use tokio::sync::mpsc;

/// Shown when a save landed but the pinned dashboard could not be
/// updated afterwards.
pub(crate) const DASHBOARD_FAILED_NOTICE: &str = "Couldn't refresh the dashboard.";

/// Event worker for a single chat.
pub(crate) struct ChatWorker<O, L, C, D>
where
    O: ExpenseOracle,
    L: ExpenseLedger,
    C: ChatApi,
    D: DashboardGateway,
{
    chat: ChatId,
    state: ChatState,
    oracle: O,
    ledger: L,
    api: C,
    dashboard: D,
    event_rx: mpsc::Receiver<Event>,
    /// Message carrying the live confirm keyboard, if any.
    summary: Option<MessageId>,
    /// Pinned dashboard message, updated after each refresh.
    pinned: Option<MessageId>,
}

impl<O, L, C, D> ChatWorker<O, L, C, D>
where
    O: ExpenseOracle,
    L: ExpenseLedger,
    C: ChatApi,
    D: DashboardGateway,
{
    pub(crate) fn new(
        chat: ChatId,
        oracle: O,
        ledger: L,
        api: C,
        dashboard: D,
        event_rx: mpsc::Receiver<Event>,
        pinned: Option<MessageId>,
    ) -> Self {
        Self {
            chat,
            state: ChatState::default(),
            oracle,
            ledger,
            api,
            dashboard,
            event_rx,
            summary: None,
            pinned,
        }
    }

    /// Main loop: apply queued events until every sender is gone.
    pub(crate) async fn run(mut self) {
        tracing::info!(chat = %self.chat, "Starting chat worker");

        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event).await;
        }

        tracing::info!(chat = %self.chat, "Chat worker stopped");
    }

    /// Apply one inbound event plus every internal event its effects
    /// generate, so gateway outcomes settle before the next inbound
    /// event is taken.
    async fn process_event(&mut self, event: Event) {
        let mut events_to_process = vec![event];

        while let Some(current) = events_to_process.pop() {
            let result = match transition(&self.state, current) {
                Ok(result) => result,
                Err(e) => {
                    tracing::debug!(chat = %self.chat, error = %e, "Ignoring event");
                    continue;
                }
            };

            self.state = result.new_state;

            for effect in result.effects {
                if let Some(generated) = self.execute_effect(effect).await {
                    events_to_process.push(generated);
                }
            }
        }
    }

    /// Execute one effect. Gateway outcomes come back as events; purely
    /// outbound effects return nothing, and their transport failures are
    /// logged rather than fed into the state machine.
    #[allow(clippy::too_many_lines)]
    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::ParseReceipt { file_id } => {
                let url = match self.api.file_url(&file_id).await {
                    Ok(url) => url,
                    Err(e) => {
                        tracing::error!(chat = %self.chat, error = %e, "Failed to resolve photo file");
                        return Some(Event::ParseFailed);
                    }
                };
                match self.oracle.parse_receipt(&url).await {
                    Ok(record) => Some(Event::Parsed { record }),
                    Err(e) => {
                        tracing::error!(chat = %self.chat, kind = ?e.kind, error = %e, "Receipt extraction failed");
                        Some(Event::ParseFailed)
                    }
                }
            }

            Effect::ClassifyText { text } => {
                let today = Utc::now().date_naive();
                match self.oracle.classify(&text, today).await {
                    Ok(intent) => Some(Event::Classified { text, intent }),
                    Err(e) => {
                        tracing::error!(chat = %self.chat, kind = ?e.kind, error = %e, "Text classification failed");
                        Some(Event::ClassifyFailed)
                    }
                }
            }

            Effect::Revise { prior, instruction } => {
                match self.oracle.revise(&prior, &instruction).await {
                    Ok(record) => Some(Event::Revised { record }),
                    Err(e) => {
                        tracing::error!(chat = %self.chat, kind = ?e.kind, error = %e, "Correction failed");
                        Some(Event::ReviseFailed)
                    }
                }
            }

            Effect::AnswerQuery { question } => {
                let rows = match self.ledger.read_all().await {
                    Ok(rows) => rows,
                    Err(e) => {
                        tracing::error!(chat = %self.chat, error = %e, "Ledger read failed");
                        return Some(Event::AnswerFailed);
                    }
                };
                match self.oracle.answer(&question, &rows).await {
                    Ok(reply) => Some(Event::Answered { reply }),
                    Err(e) => {
                        tracing::error!(chat = %self.chat, kind = ?e.kind, error = %e, "Query answering failed");
                        Some(Event::AnswerFailed)
                    }
                }
            }

            Effect::Append { record } => match self.ledger.append(&record).await {
                Ok(()) => Some(Event::Saved),
                Err(e) => {
                    tracing::error!(chat = %self.chat, error = %e, "Ledger append failed");
                    Some(Event::SaveFailed)
                }
            },

            Effect::Notify { text } => {
                if let Err(e) = self.api.send_text(self.chat, &text).await {
                    tracing::warn!(chat = %self.chat, error = %e, "Failed to send notice");
                }
                None
            }

            Effect::PresentSummary { text } => {
                match self
                    .api
                    .send_markdown(self.chat, &text, Some(format::confirm_keyboard()))
                    .await
                {
                    Ok(message) => self.summary = Some(message),
                    Err(e) => {
                        tracing::warn!(chat = %self.chat, error = %e, "Failed to send summary");
                    }
                }
                None
            }

            Effect::ClearAffordance => {
                if let Some(message) = self.summary.take() {
                    if let Err(e) = self.api.clear_keyboard(self.chat, message).await {
                        tracing::warn!(chat = %self.chat, error = %e, "Failed to clear keyboard");
                    }
                }
                None
            }

            Effect::RefreshDashboard => {
                match self.dashboard.refresh(self.chat, self.pinned).await {
                    Ok(refresh) => {
                        self.pinned = Some(refresh.message);
                        tracing::info!(
                            chat = %self.chat,
                            message = %refresh.message,
                            created = refresh.created,
                            bytes = refresh.artifact.len(),
                            "Dashboard refreshed"
                        );
                    }
                    Err(e) => {
                        tracing::error!(chat = %self.chat, error = %e, "Dashboard refresh failed");
                        let notice = self.api.send_text(self.chat, DASHBOARD_FAILED_NOTICE).await;
                        if let Err(send_err) = notice {
                            tracing::warn!(chat = %self.chat, error = %send_err, "Failed to send notice");
                        }
                    }
                }
                None
            }
        }
    }
}
