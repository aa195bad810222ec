//! Zions Bank integration.
//!
//! The portal has no API: login replays the web sign-on pages, balances
//! come from the JSON feed behind the dashboard, and transactions are
//! scraped from the register view.
//!
//! Login: www.zionsbank.com (username) → securentry.zionsbank.com
//! (device check, challenge question, password) → banking.zionsbank.com.

pub mod auth;
pub mod statements;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use super::Institution;
use crate::config::PortalConfig;
use crate::session::Session;
use crate::types::{Account, Credentials, Transaction};

pub use auth::{AuthOutcome, SessionAuthenticator};
pub use statements::StatementScraper;

/// Zions Bank connector.
pub struct ZionsBank {
    portal: PortalConfig,
    credentials: Credentials,
}

impl ZionsBank {
    pub const NAME: &'static str = "Zions Bank";
    pub const ID: &'static str = "zions_bank";

    pub fn new(portal: PortalConfig, credentials: Credentials) -> Self {
        Self {
            portal,
            credentials,
        }
    }

    /// Log in if the session has expired. Safe to call on a live session.
    pub async fn ensure_authenticated(&self, session: &mut Session) -> Result<AuthOutcome> {
        SessionAuthenticator::new(&self.portal, &self.credentials)
            .ensure_authenticated(session)
            .await
    }

    fn scraper(&self) -> StatementScraper<'_> {
        StatementScraper::new(&self.portal, Self::ID)
    }
}

#[async_trait]
impl Institution for ZionsBank {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn id(&self) -> &str {
        Self::ID
    }

    /// Returns every account; the portal has no single-account view, so
    /// `account_id` does not filter.
    async fn fetch_account(&self, session: &mut Session, account_id: &str) -> Result<Vec<Account>> {
        debug!(account_id, "Single account requested, fetching all");
        self.fetch_accounts(session).await
    }

    async fn fetch_accounts(&self, session: &mut Session) -> Result<Vec<Account>> {
        self.ensure_authenticated(session).await?;
        self.scraper().fetch_accounts(session).await
    }

    async fn fetch_transactions(
        &self,
        session: &mut Session,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        self.ensure_authenticated(session).await?;
        self.scraper()
            .fetch_transactions(session, account_id, start, end)
            .await
    }
}
