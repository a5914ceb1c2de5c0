//! Expense tracking chat bot
//!
//! Long-polls the Telegram Bot API, turns receipt photos and free text
//! into structured expense records via OpenAI, and appends confirmed
//! records to a Google Sheets ledger with a pinned dashboard chart.

mod config;
mod dashboard;
mod format;
mod ledger;
mod oracle;
mod runtime;
mod schema;
mod state_machine;
mod transport;

use config::Config;
use dashboard::DashboardPublisher;
use ledger::{ServiceAccountKey, SheetsLedger};
use oracle::OpenAiOracle;
use runtime::{route_update, ChatHub};
use std::sync::Arc;
use std::time::Duration;
use transport::{ChatApi, TelegramApi};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pause before retrying after a failed update poll.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgerbot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration is validated before anything connects, including
    // the service-account key file
    let config = Config::from_env()?;
    let key = ServiceAccountKey::from_file(&config.service_account_path)?;

    tracing::info!(
        sheet = %config.spreadsheet_id,
        dashboard = %config.dashboard_endpoint,
        "Configuration loaded"
    );

    // Gateways
    let api = Arc::new(TelegramApi::new(config.bot_token));
    let oracle = Arc::new(OpenAiOracle::new(config.openai_api_key));
    let ledger = Arc::new(SheetsLedger::new(config.spreadsheet_id, key));
    let dashboard = Arc::new(DashboardPublisher::new(
        api.clone(),
        config.dashboard_endpoint,
    ));

    let hub = ChatHub::new(
        oracle,
        ledger,
        api.clone(),
        dashboard,
        config.dashboard_message,
    );

    tracing::info!("Starting update loop");

    let mut offset = 0i64;
    loop {
        match api.get_updates(offset).await {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(inbound) = route_update(update) else {
                        continue;
                    };
                    // Acknowledge button presses before acting on them,
                    // so the client spinner clears even if the effect
                    // takes a while
                    if let Some(callback_id) = &inbound.ack {
                        if let Err(e) = api.answer_callback(callback_id).await {
                            tracing::warn!(error = %e, "Failed to answer callback");
                        }
                    }
                    hub.dispatch(inbound.chat, inbound.event).await;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch updates");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
            }
        }
    }
}
