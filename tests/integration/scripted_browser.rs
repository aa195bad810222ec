//! Scripted browser for integration testing.
//!
//! Provides a deterministic `Browser` that serves canned pages by method
//! and URL and records every request, all in-memory with no network.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Url;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use zions_connector::browser::{Browser, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

/// One request the connector made.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub fields: Vec<(String, String)>,
}

impl Request {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct Response {
    final_url: String,
    body: String,
}

#[derive(Default)]
struct Script {
    routes: HashMap<(Method, String), VecDeque<Response>>,
    requests: Vec<Request>,
}

/// Serves queued responses per (method, URL). The last queued response
/// for a route repeats once the queue is down to one.
///
/// Clones share state, so a test keeps one handle to inspect requests
/// after moving the other into a `Session`.
#[derive(Clone, Default)]
pub struct ScriptedBrowser {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_get(&self, url: &str, body: &str) -> &Self {
        self.route(Method::Get, url, url, body)
    }

    /// GET that ends up at a different URL (server-side redirect).
    pub fn on_get_redirect(&self, url: &str, final_url: &str, body: &str) -> &Self {
        self.route(Method::Get, url, final_url, body)
    }

    pub fn on_post(&self, url: &str, body: &str) -> &Self {
        self.route(Method::Post, url, url, body)
    }

    fn route(&self, method: Method, url: &str, final_url: &str, body: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .routes
            .entry((method, url.to_string()))
            .or_default()
            .push_back(Response {
                final_url: final_url.to_string(),
                body: body.to_string(),
            });
        self
    }

    /// Every request made so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn posts(&self) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::Post)
            .collect()
    }

    pub fn requested(&self, method: Method, url: &str) -> bool {
        self.requests()
            .iter()
            .any(|r| r.method == method && r.url == url)
    }

    fn serve(&self, method: Method, url: &str, fields: &[(String, String)]) -> Result<Page> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(Request {
            method,
            url: url.to_string(),
            fields: fields.to_vec(),
        });

        let queue = script
            .routes
            .get_mut(&(method, url.to_string()))
            .ok_or_else(|| anyhow!("No scripted response for {method:?} {url}"))?;
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
        .ok_or_else(|| anyhow!("Scripted responses exhausted for {method:?} {url}"))?;

        Ok(Page::new(Url::parse(&response.final_url)?, response.body))
    }
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn get(&mut self, url: &str) -> Result<Page> {
        self.serve(Method::Get, url, &[])
    }

    async fn post(&mut self, url: &str, fields: &[(String, String)]) -> Result<Page> {
        self.serve(Method::Post, url, fields)
    }
}
