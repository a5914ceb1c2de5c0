//! Startup configuration
//!
//! Every setting comes from the environment and is validated before any
//! connection is opened, so a bad deployment fails immediately instead
//! of at the first message.

use crate::transport::MessageId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Validated startup settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub openai_api_key: String,
    pub spreadsheet_id: String,
    pub service_account_path: PathBuf,
    pub dashboard_endpoint: String,
    /// Dashboard message to edit on the first refresh, if one survives
    /// from a previous run.
    pub dashboard_message: Option<MessageId>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Tests inject closures over maps
    /// instead of mutating the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let require = |name: &'static str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::Missing(name)),
        };

        let bot_token = require("TELEGRAM_BOT_TOKEN")?;
        let openai_api_key = require("OPENAI_API_KEY")?;
        let spreadsheet_id = require("GOOGLE_SHEET_ID")?;
        let service_account_path = PathBuf::from(require("GOOGLE_SERVICE_ACCOUNT_PATH")?);

        let dashboard_endpoint = require("DASHBOARD_ENDPOINT")?;
        reqwest::Url::parse(&dashboard_endpoint).map_err(|e| ConfigError::Invalid {
            name: "DASHBOARD_ENDPOINT",
            reason: e.to_string(),
        })?;

        // Blank counts the same as unset here
        let dashboard_message = lookup("DASHBOARD_MESSAGE_ID")
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                raw.trim()
                    .parse::<i64>()
                    .map(MessageId)
                    .map_err(|e| ConfigError::Invalid {
                        name: "DASHBOARD_MESSAGE_ID",
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        Ok(Self {
            bot_token,
            openai_api_key,
            spreadsheet_id,
            service_account_path,
            dashboard_endpoint,
            dashboard_message,
        })
    }
}
