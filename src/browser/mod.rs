//! Browsing client used to drive the portal.
//!
//! Defines the `Browser` trait (cookie-backed GET/POST returning parsed
//! pages) and provides:
//! - `HttpBrowser` — reqwest client with a cookie jar
//! - `Page`, `Form`, `Link` — DOM helpers for fetched documents

pub mod http;
pub mod page;

use anyhow::Result;
use async_trait::async_trait;

pub use http::HttpBrowser;
pub use page::{Form, FormMethod, Link, Page};

/// Abstraction over a stateful browsing client.
///
/// Implementors keep their own cookie jar; every call sees the cookies set
/// by the calls before it. Non-success HTTP statuses are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Browser: Send {
    /// Fetch a URL.
    async fn get(&mut self, url: &str) -> Result<Page>;

    /// Submit url-encoded form fields, in order.
    async fn post(&mut self, url: &str, fields: &[(String, String)]) -> Result<Page>;
}
