//! Chat transport abstraction
//!
//! The [`ChatApi`] trait is the seam between the conversation runtime
//! and the real chat service. Workers and the dashboard publisher only
//! see this trait, so tests run against mocks with no network.

mod telegram;

pub use telegram::{CallbackQuery, ChatRef, IncomingMessage, PhotoSize, TelegramApi, Update};

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Chat identifier as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identifier, unique within a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inline keyboard attached to an outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn single_row(buttons: Vec<InlineButton>) -> Self {
        Self {
            inline_keyboard: vec![buttons],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    text: String,
    callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// How uploaded bytes should be presented in the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Document,
}

/// Media payload for send/edit, uploaded as multipart bytes
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub kind: MediaKind,
    pub bytes: Vec<u8>,
    pub filename: String,
    pub caption: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a usable response
    #[error("transport request failed: {0}")]
    Request(String),
    /// The chat service rejected the call
    #[error("chat API rejected the call: {0}")]
    Rejected(String),
    /// The response did not match the expected shape
    #[error("malformed chat API response: {0}")]
    Malformed(String),
}

/// Outbound chat operations used by the runtime
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send a plain-text notice.
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId, TransportError>;

    /// Send a `MarkdownV2` message, optionally with an inline keyboard.
    async fn send_markdown(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageId, TransportError>;

    /// Remove the inline keyboard from a previously sent message.
    async fn clear_keyboard(&self, chat: ChatId, message: MessageId)
        -> Result<(), TransportError>;

    /// Dismiss the progress indicator on a pressed button.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError>;

    /// Resolve a photo reference to a fetchable URL.
    async fn file_url(&self, file_id: &str) -> Result<String, TransportError>;

    /// Send a media message, returning its id.
    async fn send_media(&self, chat: ChatId, media: MediaUpload)
        -> Result<MessageId, TransportError>;

    /// Replace the media of an existing message.
    async fn edit_media(
        &self,
        chat: ChatId,
        message: MessageId,
        media: MediaUpload,
    ) -> Result<(), TransportError>;

    /// Pin a message without notifying the chat.
    async fn pin_message(&self, chat: ChatId, message: MessageId) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: ChatApi + ?Sized> ChatApi for Arc<T> {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId, TransportError> {
        (**self).send_text(chat, text).await
    }

    async fn send_markdown(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageId, TransportError> {
        (**self).send_markdown(chat, text, keyboard).await
    }

    async fn clear_keyboard(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> Result<(), TransportError> {
        (**self).clear_keyboard(chat, message).await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        (**self).answer_callback(callback_id).await
    }

    async fn file_url(&self, file_id: &str) -> Result<String, TransportError> {
        (**self).file_url(file_id).await
    }

    async fn send_media(
        &self,
        chat: ChatId,
        media: MediaUpload,
    ) -> Result<MessageId, TransportError> {
        (**self).send_media(chat, media).await
    }

    async fn edit_media(
        &self,
        chat: ChatId,
        message: MessageId,
        media: MediaUpload,
    ) -> Result<(), TransportError> {
        (**self).edit_media(chat, message, media).await
    }

    async fn pin_message(&self, chat: ChatId, message: MessageId) -> Result<(), TransportError> {
        (**self).pin_message(chat, message).await
    }
}
