//! reqwest-backed `Browser`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

use super::{Browser, Page};
use crate::config::HttpConfig;

/// Browser over a reqwest client with an in-memory cookie store.
pub struct HttpBrowser {
    http: Client,
}

impl HttpBrowser {
    pub fn new(cfg: &HttpConfig) -> Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client for portal")?;

        Ok(Self { http })
    }

    async fn into_page(resp: Response, what: &str) -> Result<Page> {
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{what} error {status}: {body}");
        }

        let url = resp.url().clone();
        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read {what} response body"))?;

        debug!(url = %url, bytes = body.len(), "Page received");
        Ok(Page::new(url, body))
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn get(&mut self, url: &str) -> Result<Page> {
        debug!(url, "GET");
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        Self::into_page(resp, "GET").await
    }

    async fn post(&mut self, url: &str, fields: &[(String, String)]) -> Result<Page> {
        debug!(url, fields = fields.len(), "POST");
        let resp = self
            .http
            .post(url)
            .form(fields)
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;
        Self::into_page(resp, "POST").await
    }
}
