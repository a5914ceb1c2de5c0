//! `OpenAI` chat-completions oracle
//!
//! All structured operations use strict `json_schema` response format so
//! the completion is constrained to the expense schema server-side. The
//! returned record is still validated locally before it reaches the
//! state machine.

use super::error::OracleError;
use super::prompts;
use super::ExpenseOracle;
use crate::schema::{classification_json_schema, expense_json_schema, ExpenseRecord, TextIntent};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const MODEL: &str = "gpt-4o";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Oracle backed by the `OpenAI` chat completions API
pub struct OpenAiOracle {
    client: Client,
    api_key: String,
}

impl OpenAiOracle {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, api_key }
    }

    /// Send a request and return the completion content.
    async fn send(&self, request: &ChatRequest) -> Result<String, OracleError> {
        let response = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    OracleError::network(format!("Connection failed: {e}"))
                } else {
                    OracleError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OracleError::network(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(error_for_status(status, &body));
        }

        let completion: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            OracleError::unknown(format!("Failed to parse completion: {e} - body: {body}"))
        })?;

        extract_content(completion)
    }

    /// Send a schema-constrained request and deserialize the completion.
    async fn structured<T: DeserializeOwned>(
        &self,
        schema_name: &str,
        schema: Value,
        messages: Vec<ChatMessage>,
        temperature: Option<f32>,
    ) -> Result<T, OracleError> {
        let request = ChatRequest {
            model: MODEL.to_string(),
            messages,
            temperature,
            response_format: Some(ResponseFormat {
                r#type: "json_schema".to_string(),
                json_schema: JsonSchemaSpec {
                    name: schema_name.to_string(),
                    strict: true,
                    schema,
                },
            }),
        };

        let content = self.send(&request).await?;
        serde_json::from_str(&content).map_err(|e| {
            OracleError::schema(format!("Completion violated the {schema_name} schema: {e}"))
        })
    }
}

#[async_trait]
impl ExpenseOracle for OpenAiOracle {
    async fn parse_receipt(&self, image_url: &str) -> Result<ExpenseRecord, OracleError> {
        let record: ExpenseRecord = self
            .structured(
                "expense_record",
                expense_json_schema(),
                receipt_messages(image_url),
                Some(0.0),
            )
            .await?;
        validated(record)
    }

    async fn revise(
        &self,
        prior: &ExpenseRecord,
        instruction: &str,
    ) -> Result<ExpenseRecord, OracleError> {
        let record: ExpenseRecord = self
            .structured(
                "expense_record",
                expense_json_schema(),
                revision_messages(prior, instruction)?,
                None,
            )
            .await?;
        validated(record)
    }

    async fn classify(&self, text: &str, today: NaiveDate) -> Result<TextIntent, OracleError> {
        let wire: ClassificationWire = self
            .structured(
                "expense_or_query",
                classification_json_schema(),
                classification_messages(text, today),
                None,
            )
            .await?;
        intent_from_wire(wire)
    }

    async fn answer(&self, question: &str, rows: &[Vec<String>]) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: MODEL.to_string(),
            messages: answer_messages(question, rows)?,
            temperature: None,
            response_format: None,
        };
        self.send(&request).await
    }
}

fn receipt_messages(image_url: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(prompts::RECEIPT_SYSTEM_PROMPT),
        ChatMessage {
            role: "user".to_string(),
            content: ChatContent::Parts(vec![
                ContentPart::Text {
                    text: prompts::RECEIPT_USER_PROMPT.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.to_string(),
                    },
                },
            ]),
        },
    ]
}

fn revision_messages(
    prior: &ExpenseRecord,
    instruction: &str,
) -> Result<Vec<ChatMessage>, OracleError> {
    let current_json = serde_json::to_string_pretty(prior)
        .map_err(|e| OracleError::unknown(format!("Failed to serialize record: {e}")))?;
    Ok(vec![
        ChatMessage::system(prompts::correction_system_prompt(&current_json)),
        ChatMessage::user(instruction),
    ])
}

fn classification_messages(text: &str, today: NaiveDate) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(prompts::classification_system_prompt(today)),
        ChatMessage::user(text),
    ]
}

fn answer_messages(question: &str, rows: &[Vec<String>]) -> Result<Vec<ChatMessage>, OracleError> {
    let rows_json = serde_json::to_string(rows)
        .map_err(|e| OracleError::unknown(format!("Failed to serialize ledger rows: {e}")))?;
    Ok(vec![
        ChatMessage::system(prompts::answer_system_prompt(&rows_json)),
        ChatMessage::user(question),
    ])
}

/// Run a freshly deserialized record through local validation.
fn validated(record: ExpenseRecord) -> Result<ExpenseRecord, OracleError> {
    record
        .validate()
        .map_err(|e| OracleError::schema(format!("Record failed validation: {e}")))?;
    Ok(record)
}

/// An "expense" verdict without an extracted record falls through to the
/// query path rather than failing the turn.
fn intent_from_wire(wire: ClassificationWire) -> Result<TextIntent, OracleError> {
    match (wire.kind, wire.data) {
        (ClassificationKind::Expense, Some(record)) => Ok(TextIntent::Expense(validated(record)?)),
        _ => Ok(TextIntent::Query),
    }
}

/// The kind comes from the status; the body only contributes the
/// message (raw when it is not the usual error envelope).
fn error_for_status(status: reqwest::StatusCode, body: &str) -> OracleError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map_or_else(|_| body.to_string(), |response| response.error.message);
    match status.as_u16() {
        401 | 403 => OracleError::auth(format!("Authentication failed: {message}")),
        429 => OracleError::rate_limit(format!("Rate limit exceeded: {message}")),
        400 => OracleError::invalid_request(format!("Invalid request: {message}")),
        500..=599 => OracleError::server_error(format!("Server error: {message}")),
        _ => OracleError::unknown(format!("HTTP {status}: {message}")),
    }
}

fn extract_content(response: ChatResponse) -> Result<String, OracleError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| OracleError::unknown("No choices in completion"))?;

    if let Some(refusal) = choice.message.refusal {
        return Err(OracleError::invalid_request(format!(
            "Model refused: {refusal}"
        )));
    }

    choice
        .message
        .content
        .filter(|content| !content.is_empty())
        .ok_or_else(|| OracleError::unknown("Empty completion content"))
}

// Request wire format

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: ChatContent,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: ChatContent::Text(content.into()),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: ChatContent::Text(content.into()),
        }
    }
}

/// Plain text for most messages, typed parts for image messages
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
    json_schema: JsonSchemaSpec,
}

#[derive(Debug, Serialize)]
struct JsonSchemaSpec {
    name: String,
    strict: bool,
    schema: Value,
}

// Response wire format

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Wire shape of the free-text routing verdict
#[derive(Debug, Deserialize)]
struct ClassificationWire {
    #[serde(rename = "type")]
    kind: ClassificationKind,
    data: Option<ExpenseRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ClassificationKind {
    Expense,
    Query,
}
