//! Mock gateways and worker scenarios
//!
//! These mocks enable end-to-end worker testing without real I/O.

use super::worker::{ChatWorker, DASHBOARD_FAILED_NOTICE};
use crate::dashboard::{DashboardError, DashboardGateway, DashboardRefresh};
use crate::ledger::{ExpenseLedger, LedgerError};
use crate::oracle::{ExpenseOracle, OracleError};
use crate::schema::{ExpenseRecord, TextIntent};
use crate::state_machine::Event;
use crate::transport::{
    ChatApi, ChatId, InlineKeyboard, MediaKind, MediaUpload, MessageId, TransportError,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Chat id used by every harness worker.
pub const TEST_CHAT: ChatId = ChatId(42);

// ============================================================================
// Mock Oracle
// ============================================================================

/// Mock oracle that returns queued results and records calls.
#[derive(Default)]
pub struct MockOracle {
    parse_results: Mutex<VecDeque<Result<ExpenseRecord, OracleError>>>,
    classify_results: Mutex<VecDeque<Result<TextIntent, OracleError>>>,
    revise_results: Mutex<VecDeque<Result<ExpenseRecord, OracleError>>>,
    answer_results: Mutex<VecDeque<Result<String, OracleError>>>,
    /// Record of (prior, instruction) revision calls
    pub revise_calls: Mutex<Vec<(ExpenseRecord, String)>>,
    /// Record of (question, rows) answer calls
    pub answer_calls: Mutex<Vec<(String, Vec<Vec<String>>)>>,
}

#[allow(dead_code)]
impl MockOracle {
    pub fn queue_parse(&self, result: Result<ExpenseRecord, OracleError>) {
        self.parse_results.lock().unwrap().push_back(result);
    }

    pub fn queue_classify(&self, result: Result<TextIntent, OracleError>) {
        self.classify_results.lock().unwrap().push_back(result);
    }

    pub fn queue_revise(&self, result: Result<ExpenseRecord, OracleError>) {
        self.revise_results.lock().unwrap().push_back(result);
    }

    pub fn queue_answer(&self, result: Result<String, OracleError>) {
        self.answer_results.lock().unwrap().push_back(result);
    }
}

#[async_trait]
impl ExpenseOracle for MockOracle {
    async fn parse_receipt(&self, _image_url: &str) -> Result<ExpenseRecord, OracleError> {
        self.parse_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::unknown("no queued parse result")))
    }

    async fn revise(
        &self,
        prior: &ExpenseRecord,
        instruction: &str,
    ) -> Result<ExpenseRecord, OracleError> {
        self.revise_calls
            .lock()
            .unwrap()
            .push((prior.clone(), instruction.to_string()));
        self.revise_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::unknown("no queued revision")))
    }

    async fn classify(&self, _text: &str, _today: NaiveDate) -> Result<TextIntent, OracleError> {
        self.classify_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::unknown("no queued classification")))
    }

    async fn answer(&self, question: &str, rows: &[Vec<String>]) -> Result<String, OracleError> {
        self.answer_calls
            .lock()
            .unwrap()
            .push((question.to_string(), rows.to_vec()));
        self.answer_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::unknown("no queued answer")))
    }
}

// ============================================================================
// Mock Ledger
// ============================================================================

/// Mock ledger with scripted append outcomes and preset history rows.
#[derive(Default)]
pub struct MockLedger {
    append_results: Mutex<VecDeque<Result<(), LedgerError>>>,
    read_results: Mutex<VecDeque<Result<Vec<Vec<String>>, LedgerError>>>,
    rows: Mutex<Vec<Vec<String>>>,
    /// Record of successfully appended expenses
    pub appended: Mutex<Vec<ExpenseRecord>>,
}

#[allow(dead_code)]
impl MockLedger {
    /// Queue an append outcome; an empty queue means success.
    pub fn queue_append(&self, result: Result<(), LedgerError>) {
        self.append_results.lock().unwrap().push_back(result);
    }

    /// Queue a read outcome; an empty queue serves the preset rows.
    pub fn queue_read(&self, result: Result<Vec<Vec<String>>, LedgerError>) {
        self.read_results.lock().unwrap().push_back(result);
    }

    pub fn set_rows(&self, rows: Vec<Vec<String>>) {
        *self.rows.lock().unwrap() = rows;
    }
}

#[async_trait]
impl ExpenseLedger for MockLedger {
    async fn append(&self, record: &ExpenseRecord) -> Result<(), LedgerError> {
        let result = self
            .append_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.appended.lock().unwrap().push(record.clone());
        }
        result
    }

    async fn read_all(&self) -> Result<Vec<Vec<String>>, LedgerError> {
        self.read_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.rows.lock().unwrap().clone()))
    }
}

// ============================================================================
// Mock Chat Transport
// ============================================================================

/// Everything the worker asked the chat transport to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCall {
    Text {
        chat: ChatId,
        text: String,
    },
    Markdown {
        chat: ChatId,
        text: String,
        keyboard: bool,
    },
    ClearKeyboard {
        chat: ChatId,
        message: MessageId,
    },
    AnswerCallback {
        callback_id: String,
    },
    FileUrl {
        file_id: String,
    },
    SendMedia {
        chat: ChatId,
        kind: MediaKind,
        caption: String,
    },
    EditMedia {
        chat: ChatId,
        message: MessageId,
        kind: MediaKind,
        caption: String,
    },
    Pin {
        chat: ChatId,
        message: MessageId,
    },
}

/// Mock transport that records calls and mints message ids.
#[derive(Default)]
pub struct MockChat {
    /// Record of every transport call, in order
    pub calls: Mutex<Vec<ChatCall>>,
    next_message_id: Mutex<i64>,
    edit_media_results: Mutex<VecDeque<Result<(), TransportError>>>,
    send_media_results: Mutex<VecDeque<Result<MessageId, TransportError>>>,
}

#[allow(dead_code)]
impl MockChat {
    pub fn queue_edit_media(&self, result: Result<(), TransportError>) {
        self.edit_media_results.lock().unwrap().push_back(result);
    }

    pub fn queue_send_media(&self, result: Result<MessageId, TransportError>) {
        self.send_media_results.lock().unwrap().push_back(result);
    }

    /// Recorded calls, in order.
    pub fn recorded_calls(&self) -> Vec<ChatCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Plain texts sent through `send_text`, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                ChatCall::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn mint(&self) -> MessageId {
        let mut guard = self.next_message_id.lock().unwrap();
        *guard += 1;
        MessageId(*guard)
    }
}

#[async_trait]
impl ChatApi for MockChat {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId, TransportError> {
        self.calls.lock().unwrap().push(ChatCall::Text {
            chat,
            text: text.to_string(),
        });
        Ok(self.mint())
    }

    async fn send_markdown(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageId, TransportError> {
        self.calls.lock().unwrap().push(ChatCall::Markdown {
            chat,
            text: text.to_string(),
            keyboard: keyboard.is_some(),
        });
        Ok(self.mint())
    }

    async fn clear_keyboard(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(ChatCall::ClearKeyboard { chat, message });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(ChatCall::AnswerCallback {
            callback_id: callback_id.to_string(),
        });
        Ok(())
    }

    async fn file_url(&self, file_id: &str) -> Result<String, TransportError> {
        self.calls.lock().unwrap().push(ChatCall::FileUrl {
            file_id: file_id.to_string(),
        });
        Ok(format!("https://files.test/{file_id}"))
    }

    async fn send_media(
        &self,
        chat: ChatId,
        media: MediaUpload,
    ) -> Result<MessageId, TransportError> {
        self.calls.lock().unwrap().push(ChatCall::SendMedia {
            chat,
            kind: media.kind,
            caption: media.caption,
        });
        self.send_media_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.mint()))
    }

    async fn edit_media(
        &self,
        chat: ChatId,
        message: MessageId,
        media: MediaUpload,
    ) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(ChatCall::EditMedia {
            chat,
            message,
            kind: media.kind,
            caption: media.caption,
        });
        self.edit_media_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn pin_message(&self, chat: ChatId, message: MessageId) -> Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(ChatCall::Pin { chat, message });
        Ok(())
    }
}

// ============================================================================
// Mock Dashboard Gateway
// ============================================================================

/// Mock dashboard gateway with scripted refresh outcomes.
///
/// With nothing queued it behaves like a healthy gateway: it edits in
/// place when a message exists and otherwise reports a newly created
/// message `900`.
#[derive(Default)]
pub struct MockDashboard {
    results: Mutex<VecDeque<Result<DashboardRefresh, DashboardError>>>,
    /// Record of (chat, existing) refresh calls
    pub calls: Mutex<Vec<(ChatId, Option<MessageId>)>>,
}

#[allow(dead_code)]
impl MockDashboard {
    pub fn queue_refresh(&self, result: Result<DashboardRefresh, DashboardError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn recorded_calls(&self) -> Vec<(ChatId, Option<MessageId>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DashboardGateway for MockDashboard {
    async fn refresh(
        &self,
        chat: ChatId,
        existing: Option<MessageId>,
    ) -> Result<DashboardRefresh, DashboardError> {
        self.calls.lock().unwrap().push((chat, existing));
        self.results.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(DashboardRefresh {
                message: existing.unwrap_or(MessageId(900)),
                created: existing.is_none(),
                artifact: vec![1, 2, 3],
            })
        })
    }
}

// ============================================================================
// Worker Harness
// ============================================================================

/// Drives a real worker over mock gateways.
pub struct WorkerHarness {
    pub oracle: Arc<MockOracle>,
    pub ledger: Arc<MockLedger>,
    pub chat: Arc<MockChat>,
    pub dashboard: Arc<MockDashboard>,
    event_tx: Option<mpsc::Sender<Event>>,
    worker: Option<tokio::task::JoinHandle<()>>,
}

impl WorkerHarness {
    pub fn spawn() -> Self {
        Self::spawn_with_pinned(None)
    }

    /// Spawn a worker seeded with a remembered dashboard message.
    pub fn spawn_with_pinned(pinned: Option<MessageId>) -> Self {
        let oracle = Arc::new(MockOracle::default());
        let ledger = Arc::new(MockLedger::default());
        let chat = Arc::new(MockChat::default());
        let dashboard = Arc::new(MockDashboard::default());

        let (event_tx, event_rx) = mpsc::channel(32);
        let worker = ChatWorker::new(
            TEST_CHAT,
            oracle.clone(),
            ledger.clone(),
            chat.clone(),
            dashboard.clone(),
            event_rx,
            pinned,
        );
        let handle = tokio::spawn(worker.run());

        Self {
            oracle,
            ledger,
            chat,
            dashboard,
            event_tx: Some(event_tx),
            worker: Some(handle),
        }
    }

    pub async fn send(&self, event: Event) {
        self.event_tx
            .as_ref()
            .expect("worker already settled")
            .send(event)
            .await
            .expect("worker should accept events");
    }

    /// Close the event channel and wait for the worker to drain it.
    pub async fn settle(&mut self) {
        self.event_tx.take();
        if let Some(worker) = self.worker.take() {
            worker.await.expect("worker should exit cleanly");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::DashboardPublisher;
    use crate::schema::{Category, ExpenseItem};
    use crate::state_machine::transition::{
        ANSWER_FAILED_NOTICE, CLASSIFY_FAILED_NOTICE, EDIT_PROMPT, PARSE_FAILED_NOTICE,
        PROCESSING_NOTICE, SAVED_NOTICE, SAVE_FAILED_NOTICE,
    };
    use rust_decimal::Decimal;

    fn walmart() -> ExpenseRecord {
        ExpenseRecord {
            merchant: "Walmart".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            items: vec![ExpenseItem {
                name: "Milk".to_string(),
                quantity: 1,
                price: Decimal::new(350, 2),
            }],
            category: Category::Groceries,
            tax: Decimal::new(52, 2),
            total: Decimal::new(402, 2),
        }
    }

    #[tokio::test]
    async fn mock_chat_mints_distinct_message_ids() {
        let chat = MockChat::default();
        let first = chat.send_text(ChatId(1), "a").await.unwrap();
        let second = chat.send_text(ChatId(1), "b").await.unwrap();
        assert_ne!(first, second);
    }

    /// Scenario: photo in, record out, summary presented with keyboard.
    #[tokio::test]
    async fn receipt_flow_presents_a_summary_for_confirmation() {
        let mut harness = WorkerHarness::spawn();
        harness.oracle.queue_parse(Ok(walmart()));

        harness
            .send(Event::Photo {
                file_id: "photo-1".to_string(),
            })
            .await;
        harness.settle().await;

        let calls = harness.chat.recorded_calls();
        assert_eq!(
            calls[0],
            ChatCall::Text {
                chat: TEST_CHAT,
                text: PROCESSING_NOTICE.to_string(),
            }
        );
        assert_eq!(
            calls[1],
            ChatCall::FileUrl {
                file_id: "photo-1".to_string(),
            }
        );
        match &calls[2] {
            ChatCall::Markdown { text, keyboard, .. } => {
                assert!(text.contains("Walmart"));
                assert!(keyboard);
            }
            other => panic!("expected summary markdown, got {other:?}"),
        }
        assert_eq!(calls.len(), 3);
        assert!(harness.ledger.appended.lock().unwrap().is_empty());
    }

    /// Scenario: confirm appends, clears the keyboard, then refreshes.
    #[tokio::test]
    async fn confirm_saves_and_refreshes_the_dashboard() {
        let mut harness = WorkerHarness::spawn();
        harness.oracle.queue_parse(Ok(walmart()));

        harness
            .send(Event::Photo {
                file_id: "photo-1".to_string(),
            })
            .await;
        harness.send(Event::Confirm).await;
        harness.settle().await;

        assert_eq!(
            harness.ledger.appended.lock().unwrap().as_slice(),
            &[walmart()]
        );

        let calls = harness.chat.recorded_calls();
        let clear_position = calls
            .iter()
            .position(|call| matches!(call, ChatCall::ClearKeyboard { .. }))
            .expect("keyboard should be cleared");
        let saved_position = calls
            .iter()
            .position(|call| matches!(call, ChatCall::Text { text, .. } if text == SAVED_NOTICE))
            .expect("saved notice should be sent");
        assert!(clear_position < saved_position);

        assert_eq!(harness.dashboard.recorded_calls(), vec![(TEST_CHAT, None)]);
    }

    /// Scenario: append failure keeps the record pending for a retry.
    #[tokio::test]
    async fn failed_save_keeps_the_record_for_retry() {
        let mut harness = WorkerHarness::spawn();
        harness.oracle.queue_parse(Ok(walmart()));
        harness
            .ledger
            .queue_append(Err(LedgerError::Api("quota exhausted".to_string())));

        harness
            .send(Event::Photo {
                file_id: "photo-1".to_string(),
            })
            .await;
        harness.send(Event::Confirm).await;
        harness.send(Event::Confirm).await;
        harness.settle().await;

        // first attempt failed, the unscripted second one landed
        assert_eq!(
            harness.ledger.appended.lock().unwrap().as_slice(),
            &[walmart()]
        );

        let texts = harness.chat.sent_texts();
        assert!(texts.contains(&SAVE_FAILED_NOTICE.to_string()));
        assert!(texts.contains(&SAVED_NOTICE.to_string()));
        assert_eq!(harness.dashboard.recorded_calls().len(), 1);
    }

    /// Scenario: typed expense goes through classification, no photo path.
    #[tokio::test]
    async fn typed_expense_is_presented_for_confirmation() {
        let mut harness = WorkerHarness::spawn();
        harness
            .oracle
            .queue_classify(Ok(TextIntent::Expense(walmart())));

        harness
            .send(Event::Text {
                text: "Add Walmart $4".to_string(),
            })
            .await;
        harness.settle().await;

        let calls = harness.chat.recorded_calls();
        assert!(!calls
            .iter()
            .any(|call| matches!(call, ChatCall::FileUrl { .. })));
        match &calls[0] {
            ChatCall::Markdown { text, keyboard, .. } => {
                assert!(text.contains("Walmart"));
                assert!(keyboard);
            }
            other => panic!("expected summary markdown, got {other:?}"),
        }
    }

    /// Scenario: question routes to the ledger-backed answer path.
    #[tokio::test]
    async fn query_answers_over_ledger_rows() {
        let mut harness = WorkerHarness::spawn();
        let rows = vec![vec!["2026-01-15".to_string(), "Walmart".to_string()]];
        harness.ledger.set_rows(rows.clone());
        harness.oracle.queue_classify(Ok(TextIntent::Query));
        harness
            .oracle
            .queue_answer(Ok("You spent 4.02 at Walmart.".to_string()));

        harness
            .send(Event::Text {
                text: "how much did I spend?".to_string(),
            })
            .await;
        harness.settle().await;

        let answer_calls = harness.oracle.answer_calls.lock().unwrap().clone();
        assert_eq!(
            answer_calls,
            vec![("how much did I spend?".to_string(), rows)]
        );
        assert_eq!(
            harness.chat.sent_texts(),
            vec!["You spent 4.02 at Walmart.".to_string()]
        );
    }

    /// Scenario: ledger read failure degrades to the answer-failed notice.
    #[tokio::test]
    async fn ledger_read_failure_reports_the_answer_notice() {
        let mut harness = WorkerHarness::spawn();
        harness.oracle.queue_classify(Ok(TextIntent::Query));
        harness
            .ledger
            .queue_read(Err(LedgerError::Auth("token expired".to_string())));

        harness
            .send(Event::Text {
                text: "total?".to_string(),
            })
            .await;
        harness.settle().await;

        assert_eq!(
            harness.chat.sent_texts(),
            vec![ANSWER_FAILED_NOTICE.to_string()]
        );
        assert!(harness.oracle.answer_calls.lock().unwrap().is_empty());
    }

    /// Scenario: correction text revises the pending record in place.
    #[tokio::test]
    async fn correction_replaces_the_pending_record() {
        let mut harness = WorkerHarness::spawn();
        let mut corrected = walmart();
        corrected.total = Decimal::new(2000, 2);

        harness.oracle.queue_parse(Ok(walmart()));
        harness.oracle.queue_revise(Ok(corrected.clone()));

        harness
            .send(Event::Photo {
                file_id: "photo-1".to_string(),
            })
            .await;
        harness
            .send(Event::Text {
                text: "total should be 20".to_string(),
            })
            .await;
        harness.send(Event::Confirm).await;
        harness.settle().await;

        let revise_calls = harness.oracle.revise_calls.lock().unwrap().clone();
        assert_eq!(
            revise_calls,
            vec![(walmart(), "total should be 20".to_string())]
        );
        assert_eq!(
            harness.ledger.appended.lock().unwrap().as_slice(),
            &[corrected]
        );
    }

    /// Scenario: a bare "yes" confirms like the button.
    #[tokio::test]
    async fn yes_keyword_confirms_the_pending_record() {
        let mut harness = WorkerHarness::spawn();
        harness.oracle.queue_parse(Ok(walmart()));

        harness
            .send(Event::Photo {
                file_id: "photo-1".to_string(),
            })
            .await;
        harness
            .send(Event::Text {
                text: "Yes".to_string(),
            })
            .await;
        harness.settle().await;

        assert_eq!(harness.ledger.appended.lock().unwrap().len(), 1);
        assert!(harness.oracle.revise_calls.lock().unwrap().is_empty());
    }

    /// Scenario: the edit button prompts for a correction.
    #[tokio::test]
    async fn edit_button_prompts_for_a_correction() {
        let mut harness = WorkerHarness::spawn();
        harness.oracle.queue_parse(Ok(walmart()));

        harness
            .send(Event::Photo {
                file_id: "photo-1".to_string(),
            })
            .await;
        harness.send(Event::Edit).await;
        harness.settle().await;

        assert!(harness
            .chat
            .sent_texts()
            .contains(&EDIT_PROMPT.to_string()));
        assert!(harness.ledger.appended.lock().unwrap().is_empty());
    }

    /// Scenario: the created dashboard message is reused on later saves.
    #[tokio::test]
    async fn created_dashboard_message_is_reused_on_the_next_save() {
        let mut harness = WorkerHarness::spawn();
        harness.oracle.queue_parse(Ok(walmart()));
        harness.oracle.queue_parse(Ok(walmart()));

        harness
            .send(Event::Photo {
                file_id: "p1".to_string(),
            })
            .await;
        harness.send(Event::Confirm).await;
        harness
            .send(Event::Photo {
                file_id: "p2".to_string(),
            })
            .await;
        harness.send(Event::Confirm).await;
        harness.settle().await;

        assert_eq!(
            harness.dashboard.recorded_calls(),
            vec![(TEST_CHAT, None), (TEST_CHAT, Some(MessageId(900)))]
        );
    }

    /// Scenario: a configured dashboard message is offered for editing.
    #[tokio::test]
    async fn seeded_dashboard_message_is_offered_for_editing() {
        let mut harness = WorkerHarness::spawn_with_pinned(Some(MessageId(55)));
        harness.oracle.queue_parse(Ok(walmart()));

        harness
            .send(Event::Photo {
                file_id: "p1".to_string(),
            })
            .await;
        harness.send(Event::Confirm).await;
        harness.settle().await;

        assert_eq!(
            harness.dashboard.recorded_calls(),
            vec![(TEST_CHAT, Some(MessageId(55)))]
        );
    }

    /// Scenario: dashboard failure is reported without unsaving anything.
    #[tokio::test]
    async fn dashboard_failure_reports_but_keeps_the_save() {
        let mut harness = WorkerHarness::spawn();
        harness.oracle.queue_parse(Ok(walmart()));
        harness.dashboard.queue_refresh(Err(DashboardError::Publish(
            "every rung failed".to_string(),
        )));

        harness
            .send(Event::Photo {
                file_id: "p1".to_string(),
            })
            .await;
        harness.send(Event::Confirm).await;
        harness.settle().await;

        assert_eq!(harness.ledger.appended.lock().unwrap().len(), 1);
        let texts = harness.chat.sent_texts();
        assert!(texts.contains(&SAVED_NOTICE.to_string()));
        assert!(texts.contains(&DASHBOARD_FAILED_NOTICE.to_string()));
    }

    /// Scenario: parse failure reports and leaves the worker reusable.
    #[tokio::test]
    async fn parse_failure_reports_and_recovers() {
        let mut harness = WorkerHarness::spawn();
        harness
            .oracle
            .queue_parse(Err(OracleError::server_error("upstream 500")));
        harness.oracle.queue_classify(Ok(TextIntent::Query));
        harness.oracle.queue_answer(Ok("Nothing yet.".to_string()));

        harness
            .send(Event::Photo {
                file_id: "p1".to_string(),
            })
            .await;
        harness
            .send(Event::Text {
                text: "list expenses".to_string(),
            })
            .await;
        harness.settle().await;

        let texts = harness.chat.sent_texts();
        assert!(texts.contains(&PARSE_FAILED_NOTICE.to_string()));
        assert!(texts.contains(&"Nothing yet.".to_string()));
    }

    /// Scenario: unclassifiable text gets the guidance notice.
    #[tokio::test]
    async fn classify_failure_sends_guidance() {
        let mut harness = WorkerHarness::spawn();
        harness
            .oracle
            .queue_classify(Err(OracleError::rate_limit("slow down")));

        harness
            .send(Event::Text {
                text: "???".to_string(),
            })
            .await;
        harness.settle().await;

        assert_eq!(
            harness.chat.sent_texts(),
            vec![CLASSIFY_FAILED_NOTICE.to_string()]
        );
    }

    /// Scenario: stale button presses with nothing pending are ignored.
    #[tokio::test]
    async fn stale_buttons_do_nothing() {
        let mut harness = WorkerHarness::spawn();
        harness.send(Event::Confirm).await;
        harness.send(Event::Edit).await;
        harness.settle().await;

        assert!(harness.chat.recorded_calls().is_empty());
        assert!(harness.ledger.appended.lock().unwrap().is_empty());
    }

    // ========================================================================
    // Publish Ladder
    // ========================================================================

    fn publisher(chat: &Arc<MockChat>) -> DashboardPublisher<Arc<MockChat>> {
        DashboardPublisher::new(chat.clone(), "http://renderer.test/latest")
    }

    /// Ladder: a healthy photo edit wins immediately.
    #[tokio::test]
    async fn publish_edits_the_existing_message_as_a_photo_first() {
        let chat = Arc::new(MockChat::default());
        let refresh = publisher(&chat)
            .publish(TEST_CHAT, Some(MessageId(7)), vec![9, 9], "spend.pdf")
            .await
            .unwrap();

        assert_eq!(refresh.message, MessageId(7));
        assert!(!refresh.created);
        assert_eq!(refresh.artifact, vec![9, 9]);

        let calls = chat.recorded_calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            ChatCall::EditMedia {
                message,
                kind,
                caption,
                ..
            } => {
                assert_eq!(*message, MessageId(7));
                assert_eq!(*kind, MediaKind::Photo);
                assert!(caption.starts_with("📊 Dashboard (Updated "));
            }
            other => panic!("expected photo edit, got {other:?}"),
        }
    }

    /// Ladder: photo edit fails, document edit at the same ref succeeds.
    #[tokio::test]
    async fn publish_falls_back_to_a_document_edit() {
        let chat = Arc::new(MockChat::default());
        chat.queue_edit_media(Err(TransportError::Rejected(
            "IMAGE_PROCESS_FAILED".to_string(),
        )));

        let refresh = publisher(&chat)
            .publish(TEST_CHAT, Some(MessageId(7)), vec![9], "spend.pdf")
            .await
            .unwrap();

        assert_eq!(refresh.message, MessageId(7));
        assert!(!refresh.created);

        let kinds: Vec<MediaKind> = chat
            .recorded_calls()
            .iter()
            .filter_map(|call| match call {
                ChatCall::EditMedia { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![MediaKind::Photo, MediaKind::Document]);
    }

    /// Ladder: both edits fail, a fresh message is created and pinned.
    #[tokio::test]
    async fn publish_creates_and_pins_when_both_edits_fail() {
        let chat = Arc::new(MockChat::default());
        chat.queue_edit_media(Err(TransportError::Rejected("photo edit".to_string())));
        chat.queue_edit_media(Err(TransportError::Rejected("document edit".to_string())));

        let refresh = publisher(&chat)
            .publish(TEST_CHAT, Some(MessageId(7)), vec![9], "spend.pdf")
            .await
            .unwrap();

        assert!(refresh.created);

        let calls = chat.recorded_calls();
        match &calls[2] {
            ChatCall::SendMedia { kind, caption, .. } => {
                assert_eq!(*kind, MediaKind::Document);
                assert_eq!(caption, "📊 Dashboard");
            }
            other => panic!("expected send, got {other:?}"),
        }
        assert_eq!(
            calls[3],
            ChatCall::Pin {
                chat: TEST_CHAT,
                message: refresh.message,
            }
        );
    }

    /// Ladder: no prior message goes straight to create-and-pin.
    #[tokio::test]
    async fn publish_without_a_prior_message_creates_directly() {
        let chat = Arc::new(MockChat::default());
        let refresh = publisher(&chat)
            .publish(TEST_CHAT, None, vec![9], "spend.pdf")
            .await
            .unwrap();

        assert!(refresh.created);
        let calls = chat.recorded_calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], ChatCall::SendMedia { .. }));
        assert!(matches!(calls[1], ChatCall::Pin { .. }));
    }

    /// Ladder: every rung failing surfaces a publish error.
    #[tokio::test]
    async fn publish_fails_when_every_rung_fails() {
        let chat = Arc::new(MockChat::default());
        chat.queue_edit_media(Err(TransportError::Rejected("photo edit".to_string())));
        chat.queue_edit_media(Err(TransportError::Rejected("document edit".to_string())));
        chat.queue_send_media(Err(TransportError::Request(
            "connect refused".to_string(),
        )));

        let result = publisher(&chat)
            .publish(TEST_CHAT, Some(MessageId(7)), vec![9], "spend.pdf")
            .await;

        assert!(matches!(result, Err(DashboardError::Publish(_))));
    }
}
