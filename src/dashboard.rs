//! Pinned dashboard refresh
//!
//! A rendered spending chart lives in one pinned chat message. Every
//! refresh fetches the current artifact from the renderer endpoint and
//! walks a fixed ladder of publish attempts: edit the existing message
//! as a photo, edit it as a document, then create and pin a fresh one.
//! The first rung that lands wins.

use crate::transport::{ChatApi, ChatId, MediaKind, MediaUpload, MessageId, TransportError};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CREATE_CAPTION: &str = "📊 Dashboard";
const FALLBACK_FILENAME: &str = "dashboard";

/// Errors from a dashboard refresh.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The renderer endpoint or the artifact download was unreachable
    #[error("dashboard fetch failed: {0}")]
    Fetch(String),
    /// The endpoint answered with something other than an artifact pointer
    #[error("dashboard descriptor invalid: {0}")]
    Descriptor(String),
    /// Every publish attempt failed
    #[error("dashboard publish failed: {0}")]
    Publish(String),
}

/// Outcome of a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardRefresh {
    /// Message now carrying the dashboard.
    pub message: MessageId,
    /// True when a fresh message was created and pinned instead of
    /// edited in place.
    pub created: bool,
    /// The published artifact.
    pub artifact: Vec<u8>,
}

/// Create-or-update semantics over the pinned dashboard message.
#[async_trait]
pub trait DashboardGateway: Send + Sync {
    /// Fetch a freshly rendered artifact and land it in the chat,
    /// editing `existing` in place when possible.
    async fn refresh(
        &self,
        chat: ChatId,
        existing: Option<MessageId>,
    ) -> Result<DashboardRefresh, DashboardError>;
}

#[async_trait]
impl<T: DashboardGateway + ?Sized> DashboardGateway for Arc<T> {
    async fn refresh(
        &self,
        chat: ChatId,
        existing: Option<MessageId>,
    ) -> Result<DashboardRefresh, DashboardError> {
        (**self).refresh(chat, existing).await
    }
}

/// One rung of the publish ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    EditAsPhoto(MessageId),
    EditAsDocument(MessageId),
    CreateAndPin,
}

/// Publish attempts in order. Without a prior message there is nothing
/// to edit, so creation is the only rung.
fn plan(existing: Option<MessageId>) -> Vec<Attempt> {
    match existing {
        Some(message) => vec![
            Attempt::EditAsPhoto(message),
            Attempt::EditAsDocument(message),
            Attempt::CreateAndPin,
        ],
        None => vec![Attempt::CreateAndPin],
    }
}

/// What the renderer endpoint returns: a pointer to the current artifact.
#[derive(Debug, Deserialize)]
struct ArtifactDescriptor {
    url: String,
}

fn updated_caption(today: NaiveDate) -> String {
    format!("📊 Dashboard (Updated {today})")
}

/// Derive an upload filename from the artifact URL: last path segment,
/// query and fragment stripped.
fn artifact_filename(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_FILENAME)
        .to_string()
}

fn media_upload(kind: MediaKind, artifact: &[u8], filename: &str, caption: String) -> MediaUpload {
    MediaUpload {
        kind,
        bytes: artifact.to_vec(),
        filename: filename.to_string(),
        caption,
    }
}

/// Production gateway: fetches the artifact over HTTP and publishes it
/// through the chat transport.
pub struct DashboardPublisher<C> {
    api: C,
    client: Client,
    endpoint: String,
}

impl<C: ChatApi> DashboardPublisher<C> {
    pub fn new(api: C, endpoint: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            api,
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Ask the renderer where the current artifact lives.
    async fn fetch_descriptor(&self) -> Result<ArtifactDescriptor, DashboardError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| DashboardError::Fetch(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DashboardError::Fetch(e.to_string()))?;
        if !status.is_success() {
            return Err(DashboardError::Fetch(format!("HTTP {status}: {body}")));
        }
        serde_json::from_str(&body).map_err(|e| DashboardError::Descriptor(e.to_string()))
    }

    /// Download the rendered artifact the descriptor points at.
    async fn fetch_artifact(
        &self,
        descriptor: &ArtifactDescriptor,
    ) -> Result<Vec<u8>, DashboardError> {
        let response = self
            .client
            .get(&descriptor.url)
            .send()
            .await
            .map_err(|e| DashboardError::Fetch(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::Fetch(format!("artifact HTTP {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DashboardError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Walk the ladder until one rung lands the artifact in the chat.
    pub(crate) async fn publish(
        &self,
        chat: ChatId,
        existing: Option<MessageId>,
        artifact: Vec<u8>,
        filename: &str,
    ) -> Result<DashboardRefresh, DashboardError> {
        let mut last_failure = None;
        for attempt in plan(existing) {
            match self.run_attempt(chat, attempt, &artifact, filename).await {
                Ok((message, created)) => {
                    return Ok(DashboardRefresh {
                        message,
                        created,
                        artifact,
                    });
                }
                Err(e) => {
                    tracing::warn!(?attempt, error = %e, "Dashboard publish attempt failed");
                    last_failure = Some(e.to_string());
                }
            }
        }
        Err(DashboardError::Publish(last_failure.unwrap_or_else(
            || "no publish attempts planned".to_string(),
        )))
    }

    async fn run_attempt(
        &self,
        chat: ChatId,
        attempt: Attempt,
        artifact: &[u8],
        filename: &str,
    ) -> Result<(MessageId, bool), TransportError> {
        match attempt {
            Attempt::EditAsPhoto(message) => {
                let caption = updated_caption(Utc::now().date_naive());
                let upload = media_upload(MediaKind::Photo, artifact, filename, caption);
                self.api.edit_media(chat, message, upload).await?;
                Ok((message, false))
            }
            Attempt::EditAsDocument(message) => {
                let caption = updated_caption(Utc::now().date_naive());
                let upload = media_upload(MediaKind::Document, artifact, filename, caption);
                self.api.edit_media(chat, message, upload).await?;
                Ok((message, false))
            }
            Attempt::CreateAndPin => {
                let upload = media_upload(
                    MediaKind::Document,
                    artifact,
                    filename,
                    CREATE_CAPTION.to_string(),
                );
                let message = self.api.send_media(chat, upload).await?;
                self.api.pin_message(chat, message).await?;
                Ok((message, true))
            }
        }
    }
}

#[async_trait]
impl<C: ChatApi> DashboardGateway for DashboardPublisher<C> {
    async fn refresh(
        &self,
        chat: ChatId,
        existing: Option<MessageId>,
    ) -> Result<DashboardRefresh, DashboardError> {
        let descriptor = self.fetch_descriptor().await?;
        let artifact = self.fetch_artifact(&descriptor).await?;
        let filename = artifact_filename(&descriptor.url);
        self.publish(chat, existing, artifact, &filename).await
    }
}
