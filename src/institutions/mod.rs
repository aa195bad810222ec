//! Institution integrations.
//!
//! Defines the `Institution` trait consumed by an institution registry and
//! provides the implementation for:
//! - Zions Bank — scraped web portal

pub mod zions_bank;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::session::Session;
use crate::types::{Account, Transaction};

/// Abstraction over a financial institution.
///
/// Every operation takes the caller's session and re-checks that it is
/// logged in before touching account data.
#[async_trait]
pub trait Institution: Send + Sync {
    /// Display name.
    fn name(&self) -> &str;

    /// Stable identifier used by registries.
    fn id(&self) -> &str;

    /// Fetch accounts for the given id. Portals that cannot look up one
    /// account return everything they know.
    async fn fetch_account(&self, session: &mut Session, account_id: &str) -> Result<Vec<Account>>;

    /// Fetch all accounts with current balances.
    async fn fetch_accounts(&self, session: &mut Session) -> Result<Vec<Account>>;

    /// Fetch transactions for an account between two dates (inclusive).
    ///
    /// Balances the portal reports alongside the transactions update the
    /// account held in `session`; read them back through
    /// `Session::accounts()`. Vectors returned by earlier `fetch_accounts`
    /// calls are snapshots and keep their old values.
    async fn fetch_transactions(
        &self,
        session: &mut Session,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>>;
}
