//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Portal URLs default to the production portal. The username and
//! password are referenced by env-var name in the config and resolved at
//! runtime via `std::env::var`.

use anyhow::{Context, Result};
use reqwest::Url;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use crate::types::{ConnectorError, Credentials};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Every URL the login flow and the scrapers touch.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PortalConfig {
    /// Probed to decide whether the session is still alive.
    pub dashboard_url: String,
    /// Public page carrying the `logonForm`.
    pub login_url: String,
    /// Host that serves the device-verification bounce.
    pub device_fingerprint_host: String,
    /// Where a completed login lands.
    pub authenticated_landing_url: String,
    /// Fetched when the login lands anywhere else.
    pub fallback_accounts_url: String,
    pub balances_url: String,
    pub register_url: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            dashboard_url: "https://banking.zionsbank.com/ibuir/".into(),
            login_url: "https://www.zionsbank.com".into(),
            device_fingerprint_host: "https://securentry.zionsbank.com".into(),
            authenticated_landing_url:
                "https://banking.zionsbank.com/ibuir/displayUserInterface.htm".into(),
            fallback_accounts_url:
                "https://banking.zionsbank.com/zfnb/userServlet/app/bank/user/viewaccountsbysubtype/viewAccount"
                    .into(),
            balances_url: "https://banking.zionsbank.com/ibuir/displayAccountBalance.htm".into(),
            register_url:
                "https://banking.zionsbank.com/zfnb/userServlet/app/bank/user/register_view_main"
                    .into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/535.19 (KHTML, like Gecko) Chrome/18.0.1025.162 Safari/535.19".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CredentialsConfig {
    pub username_env: String,
    pub password_env: String,
    /// Challenge question text → answer.
    pub challenge_answers: HashMap<String, String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username_env: "ZIONS_USERNAME".into(),
            password_env: "ZIONS_PASSWORD".into(),
            challenge_answers: HashMap::new(),
        }
    }
}

impl CredentialsConfig {
    /// Build credentials, reading username and password from the
    /// environment. Unset variables leave the field empty; the login flow
    /// reports which one is missing.
    pub fn resolve(&self) -> Credentials {
        Credentials {
            username: std::env::var(&self.username_env).ok().filter(|s| !s.is_empty()),
            password: std::env::var(&self.password_env)
                .ok()
                .filter(|s| !s.is_empty())
                .map(SecretString::new),
            challenge_answers: self
                .challenge_answers
                .iter()
                .map(|(q, a)| (q.clone(), SecretString::new(a.clone())))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// How many days of transaction history the sync binary pulls.
    pub history_days: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { history_days: 30 }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unusable values before any request is made.
    pub fn validate(&self) -> Result<()> {
        let p = &self.portal;
        for (key, url) in [
            ("dashboard_url", &p.dashboard_url),
            ("login_url", &p.login_url),
            ("device_fingerprint_host", &p.device_fingerprint_host),
            ("authenticated_landing_url", &p.authenticated_landing_url),
            ("fallback_accounts_url", &p.fallback_accounts_url),
            ("balances_url", &p.balances_url),
            ("register_url", &p.register_url),
        ] {
            Url::parse(url).map_err(|e| {
                ConnectorError::Config(format!("portal.{key} is not a valid URL ({e}): {url}"))
            })?;
        }
        if self.http.timeout_secs == 0 {
            return Err(ConnectorError::Config("http.timeout_secs must be positive".into()).into());
        }
        if self.sync.history_days == 0 {
            return Err(ConnectorError::Config("sync.history_days must be positive".into()).into());
        }
        Ok(())
    }
}
