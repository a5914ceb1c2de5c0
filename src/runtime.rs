//! Per-chat workers and inbound routing
//!
//! One worker task per chat, started on first contact and addressed by
//! chat id. Inbound transport updates are mapped onto state-machine
//! events here; each worker applies its events in arrival order.

mod worker;

#[cfg(test)]
pub mod testing;

use crate::dashboard::DashboardGateway;
use crate::format;
use crate::ledger::ExpenseLedger;
use crate::oracle::ExpenseOracle;
use crate::state_machine::Event;
use crate::transport::{ChatApi, ChatId, MessageId, Update};
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use worker::ChatWorker;

/// An inbound update routed to a chat worker.
#[derive(Debug)]
pub struct Inbound {
    pub chat: ChatId,
    pub event: Event,
    /// Callback id to acknowledge before the event is applied.
    pub ack: Option<String>,
}

/// Map a transport update onto a chat event. Updates carrying nothing
/// for the state machine (stickers, membership notices, unknown
/// callbacks) route nowhere.
pub fn route_update(update: Update) -> Option<Inbound> {
    if let Some(message) = update.message {
        let chat = ChatId(message.chat.id);
        if let Some(photo) = message.largest_photo() {
            return Some(Inbound {
                chat,
                event: Event::Photo {
                    file_id: photo.file_id.clone(),
                },
                ack: None,
            });
        }
        let text = message.text?;
        let event = if text.trim() == "/start" {
            Event::Start
        } else {
            Event::Text { text }
        };
        return Some(Inbound {
            chat,
            event,
            ack: None,
        });
    }

    let callback = update.callback_query?;
    let chat = ChatId(callback.message.as_ref()?.chat.id);
    let event = match callback.data.as_deref() {
        Some(format::CALLBACK_CONFIRM) => Event::Confirm,
        Some(format::CALLBACK_EDIT) => Event::Edit,
        _ => return None,
    };
    Some(Inbound {
        chat,
        event,
        ack: Some(callback.id),
    })
}

/// Handle to a running chat worker.
struct ChatHandle {
    event_tx: mpsc::Sender<Event>,
}

/// Routes events to per-chat workers, creating them on first contact.
pub struct ChatHub<O, L, C, D>
where
    O: ExpenseOracle + Clone + 'static,
    L: ExpenseLedger + Clone + 'static,
    C: ChatApi + Clone + 'static,
    D: DashboardGateway + Clone + 'static,
{
    oracle: O,
    ledger: L,
    api: C,
    dashboard: D,
    /// Dashboard message offered to each new worker for editing.
    seed_pinned: Option<MessageId>,
    workers: RwLock<HashMap<ChatId, ChatHandle>>,
}

impl<O, L, C, D> ChatHub<O, L, C, D>
where
    O: ExpenseOracle + Clone + 'static,
    L: ExpenseLedger + Clone + 'static,
    C: ChatApi + Clone + 'static,
    D: DashboardGateway + Clone + 'static,
{
    pub fn new(
        oracle: O,
        ledger: L,
        api: C,
        dashboard: D,
        seed_pinned: Option<MessageId>,
    ) -> Self {
        Self {
            oracle,
            ledger,
            api,
            dashboard,
            seed_pinned,
            workers: RwLock::new(HashMap::new()),
        }
    }

    /// Queue one event for its chat's worker, starting the worker on
    /// first contact. A worker that exited is replaced and the event
    /// redelivered.
    pub async fn dispatch(&self, chat: ChatId, event: Event) {
        let event_tx = self.sender_for(chat).await;
        if let Err(mpsc::error::SendError(event)) = event_tx.send(event).await {
            tracing::warn!(chat = %chat, "Chat worker gone, restarting");
            self.workers.write().await.remove(&chat);
            let event_tx = self.sender_for(chat).await;
            if event_tx.send(event).await.is_err() {
                tracing::error!(chat = %chat, "Dropping event for unreachable chat worker");
            }
        }
    }

    /// Existing worker's sender, or spawn a fresh worker for this chat.
    async fn sender_for(&self, chat: ChatId) -> mpsc::Sender<Event> {
        {
            let workers = self.workers.read().await;
            if let Some(handle) = workers.get(&chat) {
                return handle.event_tx.clone();
            }
        }

        let mut workers = self.workers.write().await;
        // a racing dispatch may have created the worker between locks
        if let Some(handle) = workers.get(&chat) {
            return handle.event_tx.clone();
        }

        tracing::info!(chat = %chat, "Creating chat worker");
        let (event_tx, event_rx) = mpsc::channel(32);
        let worker = ChatWorker::new(
            chat,
            self.oracle.clone(),
            self.ledger.clone(),
            self.api.clone(),
            self.dashboard.clone(),
            event_rx,
            self.seed_pinned,
        );
        tokio::spawn(worker.run());
        workers.insert(
            chat,
            ChatHandle {
                event_tx: event_tx.clone(),
            },
        );
        event_tx
    }
}
