//! Client-side browsing state for one portal login.
//!
//! A `Session` is owned by the caller and passed by `&mut` into every
//! operation, so one session never has two requests in flight. Use one
//! session per concurrent caller.

use anyhow::{Context, Result};
use tracing::debug;

use crate::browser::{Browser, Form, FormMethod, Link, Page};
use crate::types::{Account, ConnectorError};

/// Cookies (inside the browser), the current page, and the most recently
/// fetched account set.
pub struct Session {
    browser: Box<dyn Browser>,
    current: Option<Page>,
    accounts: Vec<Account>,
}

impl Session {
    pub fn new(browser: impl Browser + 'static) -> Self {
        Self {
            browser: Box::new(browser),
            current: None,
            accounts: Vec::new(),
        }
    }

    /// The last page loaded through this session.
    pub fn current_page(&self) -> Option<&Page> {
        self.current.as_ref()
    }

    /// Accounts from the last account-list fetch, including any balance
    /// updates reported by later transaction fetches.
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub(crate) fn account_mut(&mut self, id: &str) -> Result<&mut Account> {
        self.accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| ConnectorError::AccountNotFound(id.to_string()).into())
    }

    pub(crate) fn replace_accounts(&mut self, accounts: Vec<Account>) {
        self.accounts = accounts;
    }

    // -- Navigation --------------------------------------------------------

    pub async fn get(&mut self, url: &str) -> Result<Page> {
        let page = self.browser.get(url).await?;
        Ok(self.visit(page))
    }

    pub async fn post(&mut self, url: &str, fields: &[(String, String)]) -> Result<Page> {
        let page = self.browser.post(url, fields).await?;
        Ok(self.visit(page))
    }

    /// Submit a form, pressing the named submit control if given.
    pub async fn submit(&mut self, form: &Form, button: Option<&str>) -> Result<Page> {
        let fields = form.submission(button)?;
        debug!(
            action = %form.action,
            method = ?form.method,
            fields = fields.len(),
            "Submitting form"
        );
        match form.method {
            FormMethod::Post => self.post(form.action.as_str(), &fields).await,
            FormMethod::Get => {
                let mut url = form.action.clone();
                url.query_pairs_mut().clear().extend_pairs(fields.iter());
                self.get(url.as_str()).await
            }
        }
    }

    pub async fn click(&mut self, link: &Link) -> Result<Page> {
        debug!(url = %link.url, text = %link.text, "Following link");
        self.get(link.url.as_str())
            .await
            .with_context(|| format!("Failed to follow link {:?}", link.text))
    }

    fn visit(&mut self, page: Page) -> Page {
        self.current = Some(page.clone());
        page
    }
}
