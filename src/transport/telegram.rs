//! Telegram Bot API client
//!
//! Thin JSON/multipart client over the Bot API. Every response arrives
//! in the standard `{ok, result, description}` envelope; media uploads
//! go out as multipart forms with an `attach://` descriptor.

use super::{ChatApi, ChatId, InlineKeyboard, MediaKind, MediaUpload, MessageId, TransportError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";
const LONG_POLL_SECS: u64 = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Multipart field name referenced by `attach://` descriptors.
const ATTACH_NAME: &str = "artifact";

pub struct TelegramApi {
    client: Client,
    token: String,
}

impl TelegramApi {
    pub fn new(token: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, token }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.token)
    }

    /// Long-poll for updates after `offset`. The per-request timeout is
    /// widened past the server-side hold so the poll itself never trips
    /// the client deadline.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        let payload = json!({
            "offset": offset,
            "timeout": LONG_POLL_SECS,
            "allowed_updates": ["message", "callback_query"],
        });
        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(LONG_POLL_SECS + 10))
            .json(&payload)
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("getUpdates: {e}")))?;
        read_envelope("getUpdates", response).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("{method}: {e}")))?;
        read_envelope(method, response).await
    }

    async fn call_multipart<T: DeserializeOwned>(
        &self,
        method: &str,
        form: Form,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("{method}: {e}")))?;
        read_envelope(method, response).await
    }
}

#[async_trait]
impl ChatApi for TelegramApi {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId, TransportError> {
        let payload = json!({"chat_id": chat.0, "text": text});
        let message: SentMessage = self.call("sendMessage", &payload).await?;
        Ok(MessageId(message.message_id))
    }

    async fn send_markdown(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageId, TransportError> {
        let mut payload = json!({
            "chat_id": chat.0,
            "text": text,
            "parse_mode": "MarkdownV2",
        });
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = serde_json::to_value(keyboard)
                .map_err(|e| TransportError::Malformed(format!("sendMessage: {e}")))?;
        }
        let message: SentMessage = self.call("sendMessage", &payload).await?;
        Ok(MessageId(message.message_id))
    }

    async fn clear_keyboard(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> Result<(), TransportError> {
        let payload = json!({
            "chat_id": chat.0,
            "message_id": message.0,
            "reply_markup": {"inline_keyboard": []},
        });
        let _: serde_json::Value = self.call("editMessageReplyMarkup", &payload).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        let payload = json!({"callback_query_id": callback_id});
        let _: bool = self.call("answerCallbackQuery", &payload).await?;
        Ok(())
    }

    async fn file_url(&self, file_id: &str) -> Result<String, TransportError> {
        let payload = json!({"file_id": file_id});
        let file: FileInfo = self.call("getFile", &payload).await?;
        let path = file
            .file_path
            .ok_or_else(|| TransportError::Malformed("getFile: missing file_path".to_string()))?;
        Ok(download_url(&self.token, &path))
    }

    async fn send_media(
        &self,
        chat: ChatId,
        media: MediaUpload,
    ) -> Result<MessageId, TransportError> {
        let (method, field) = match media.kind {
            MediaKind::Photo => ("sendPhoto", "photo"),
            MediaKind::Document => ("sendDocument", "document"),
        };
        let part = Part::bytes(media.bytes).file_name(media.filename);
        let form = Form::new()
            .text("chat_id", chat.0.to_string())
            .text("caption", media.caption)
            .part(field, part);
        let message: SentMessage = self.call_multipart(method, form).await?;
        Ok(MessageId(message.message_id))
    }

    async fn edit_media(
        &self,
        chat: ChatId,
        message: MessageId,
        media: MediaUpload,
    ) -> Result<(), TransportError> {
        let descriptor = input_media_descriptor(&media);
        let part = Part::bytes(media.bytes).file_name(media.filename);
        let form = Form::new()
            .text("chat_id", chat.0.to_string())
            .text("message_id", message.0.to_string())
            .text("media", descriptor.to_string())
            .part(ATTACH_NAME, part);
        let _: serde_json::Value = self.call_multipart("editMessageMedia", form).await?;
        Ok(())
    }

    async fn pin_message(&self, chat: ChatId, message: MessageId) -> Result<(), TransportError> {
        let payload = json!({
            "chat_id": chat.0,
            "message_id": message.0,
            "disable_notification": true,
        });
        let _: bool = self.call("pinChatMessage", &payload).await?;
        Ok(())
    }
}

fn download_url(token: &str, file_path: &str) -> String {
    format!("{API_BASE}/file/bot{token}/{file_path}")
}

/// `InputMedia` descriptor pointing at the multipart part by name.
fn input_media_descriptor(media: &MediaUpload) -> serde_json::Value {
    let kind = match media.kind {
        MediaKind::Photo => "photo",
        MediaKind::Document => "document",
    };
    json!({
        "type": kind,
        "media": format!("attach://{ATTACH_NAME}"),
        "caption": media.caption.as_str(),
    })
}

async fn read_envelope<T: DeserializeOwned>(
    method: &str,
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| TransportError::Request(format!("{method}: {e}")))?;
    decode_envelope(method, status, &body)
}

fn decode_envelope<T: DeserializeOwned>(
    method: &str,
    status: StatusCode,
    body: &str,
) -> Result<T, TransportError> {
    let envelope: ApiEnvelope<T> = serde_json::from_str(body)
        .map_err(|e| TransportError::Malformed(format!("{method}: {e}")))?;
    if envelope.ok {
        envelope
            .result
            .ok_or_else(|| TransportError::Malformed(format!("{method}: envelope has no result")))
    } else {
        let description = envelope
            .description
            .unwrap_or_else(|| format!("HTTP {status}"));
        Err(TransportError::Rejected(format!("{method}: {description}")))
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    file_path: Option<String>,
}

/// One long-poll update
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: ChatRef,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
}

impl IncomingMessage {
    /// Photo renditions arrive smallest first; the last is full size.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo.as_ref().and_then(|sizes| sizes.last())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRef {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}
