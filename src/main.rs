//! zions-sync
//!
//! Entry point. Loads configuration, initialises structured logging,
//! logs in to the portal, and logs every account with its recent
//! transactions.

use anyhow::Result;
use chrono::{Duration, Local};
use tracing::{error, info};

use zions_connector::browser::HttpBrowser;
use zions_connector::config;
use zions_connector::institutions::zions_bank::ZionsBank;
use zions_connector::institutions::Institution;
use zions_connector::session::Session;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    let bank = ZionsBank::new(cfg.portal.clone(), cfg.credentials.resolve());
    let mut session = Session::new(HttpBrowser::new(&cfg.http)?);

    info!(
        institution = bank.name(),
        history_days = cfg.sync.history_days,
        "Starting sync"
    );

    let accounts = bank.fetch_accounts(&mut session).await?;
    let end = Local::now().date_naive();
    let start = end - Duration::days(i64::from(cfg.sync.history_days));

    let mut failures = 0usize;
    for account in &accounts {
        info!(account = %account, "Account");

        match bank
            .fetch_transactions(&mut session, &account.id, start, end)
            .await
        {
            Ok(transactions) => {
                for txn in &transactions {
                    info!(account = %account.id, "{txn}");
                }
                info!(
                    account = %account.id,
                    count = transactions.len(),
                    "Transactions"
                );
            }
            Err(e) => {
                error!(account = %account.id, error = %e, "Transaction fetch failed");
                failures += 1;
            }
        }
    }

    // Register pages may have refreshed balances.
    for account in session.accounts() {
        info!(
            account = %account.id,
            current = ?account.current_balance,
            available = ?account.available_balance,
            prior_day = ?account.prior_day_balance,
            "Final balances"
        );
    }

    info!(
        accounts = accounts.len(),
        failures,
        "Sync complete"
    );

    if failures > 0 {
        anyhow::bail!("{failures} account(s) failed to sync");
    }
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("zions_connector=info,zions_sync=info"));

    let json_logging = std::env::var("ZIONS_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
