//! Google Sheets ledger implementation
//!
//! One spreadsheet, first sheet tab. Confirmed expenses append as rows
//! in `A:F`; cell `H1` carries the date of the most recent append so
//! the dashboard renderer can show freshness.

use super::auth::{ServiceAccountKey, TokenProvider};
use super::{ExpenseLedger, LedgerError};
use crate::schema::{ExpenseItem, ExpenseRecord};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::OnceCell;

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const EXPENSE_RANGE: &str = "A:F";
const LAST_APPEND_CELL: &str = "H1";
const DEFAULT_SHEET: &str = "Sheet1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SheetsLedger {
    client: Client,
    tokens: TokenProvider,
    spreadsheet_id: String,
    sheet_name: OnceCell<String>,
}

impl SheetsLedger {
    pub fn new(spreadsheet_id: String, key: ServiceAccountKey) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        let tokens = TokenProvider::new(client.clone(), key);

        Self {
            client,
            tokens,
            spreadsheet_id,
            sheet_name: OnceCell::new(),
        }
    }

    /// Target sheet tab, resolved once from spreadsheet metadata.
    async fn sheet_name(&self) -> Result<&str, LedgerError> {
        self.sheet_name
            .get_or_try_init(|| self.resolve_sheet_name())
            .await
            .map(String::as_str)
    }

    async fn resolve_sheet_name(&self) -> Result<String, LedgerError> {
        let url = format!("{SHEETS_BASE}/{}", self.spreadsheet_id);
        let metadata: SpreadsheetMetadata = self.get_json(&url).await?;
        Ok(first_sheet_title(metadata))
    }

    /// Freshness marker consumed by the dashboard renderer.
    async fn write_last_append_date(&self, sheet: &str) -> Result<(), LedgerError> {
        let range = format!("{sheet}!{LAST_APPEND_CELL}");
        let url = format!(
            "{SHEETS_BASE}/{}/values/{range}?valueInputOption=USER_ENTERED",
            self.spreadsheet_id
        );
        let today = Utc::now().date_naive();
        let payload = json!({"values": [[today.to_string()]]});
        let _: serde_json::Value = self.put_json(&url, &payload).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, LedgerError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| LedgerError::Request(e.to_string()))?;
        decode(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<T, LedgerError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(|e| LedgerError::Request(e.to_string()))?;
        decode(response).await
    }

    async fn put_json<T: DeserializeOwned>(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<T, LedgerError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(|e| LedgerError::Request(e.to_string()))?;
        decode(response).await
    }
}

#[async_trait]
impl ExpenseLedger for SheetsLedger {
    async fn append(&self, record: &ExpenseRecord) -> Result<(), LedgerError> {
        let sheet = self.sheet_name().await?;
        let range = format!("{sheet}!{EXPENSE_RANGE}");
        let url = format!(
            "{SHEETS_BASE}/{}/values/{range}:append?valueInputOption=USER_ENTERED",
            self.spreadsheet_id
        );
        let payload = json!({"values": [expense_row(record)]});
        let _: serde_json::Value = self.post_json(&url, &payload).await?;

        // the row is durable at this point; a freshness-marker failure
        // must not resurface as an append failure
        if let Err(e) = self.write_last_append_date(sheet).await {
            tracing::warn!(error = %e, "Failed to update last-append cell");
        }
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<Vec<String>>, LedgerError> {
        let sheet = self.sheet_name().await?;
        let range = format!("{sheet}!{EXPENSE_RANGE}");
        let url = format!("{SHEETS_BASE}/{}/values/{range}", self.spreadsheet_id);
        let values: ValueRange = self.get_json(&url).await?;
        Ok(values.values)
    }
}

/// One spreadsheet row: `[date, merchant, items, category, tax, total]`.
fn expense_row(record: &ExpenseRecord) -> Vec<String> {
    vec![
        record.date.to_string(),
        record.merchant.clone(),
        serialize_items(&record.items),
        record.category.as_str().to_string(),
        record.tax.to_string(),
        record.total.to_string(),
    ]
}

/// `"{name} ({quantity}x{price})"` joined with commas.
fn serialize_items(items: &[ExpenseItem]) -> String {
    items
        .iter()
        .map(|item| format!("{} ({}x{})", item.name, item.quantity, item.price))
        .collect::<Vec<_>>()
        .join(", ")
}

fn first_sheet_title(metadata: SpreadsheetMetadata) -> String {
    metadata
        .sheets
        .into_iter()
        .next()
        .and_then(|sheet| sheet.properties)
        .map(|properties| properties.title)
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_SHEET.to_string())
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, LedgerError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| LedgerError::Request(e.to_string()))?;
    if !status.is_success() {
        return Err(api_error(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| LedgerError::Malformed(format!("{e} - body: {body}")))
}

fn api_error(status: StatusCode, body: &str) -> LedgerError {
    #[derive(Debug, Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(Debug, Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .map_or_else(|_| body.to_string(), |parsed| parsed.error.message);
    match status.as_u16() {
        401 | 403 => LedgerError::Auth(format!("{status}: {message}")),
        _ => LedgerError::Api(format!("{status}: {message}")),
    }
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: Option<SheetProperties>,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}
