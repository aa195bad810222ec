//! Shared types for the connector.
//!
//! Account and transaction records, caller credentials, and the error
//! taxonomy. Institution, browser and scraping modules depend on these
//! without depending on each other.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Kind of account as reported by the balances feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Deposit,
    Credit,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Deposit => write!(f, "deposit"),
            AccountType::Credit => write!(f, "credit"),
        }
    }
}

/// A bank account snapshot.
///
/// Balances are point-in-time values. `None` means the portal did not
/// report the field, which is not the same as a zero balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    /// Stable id of the institution this account belongs to.
    pub institution: String,
    pub name: String,
    pub account_number: String,
    pub current_balance: Option<Decimal>,
    /// Deposit accounts only.
    pub available_balance: Option<Decimal>,
    /// Only reported by the transaction register view.
    pub prior_day_balance: Option<Decimal>,
    /// Credit accounts only.
    pub balance_due: Option<Decimal>,
    pub account_type: AccountType,
}

impl Account {
    /// An account with only its identity set.
    pub fn new(id: impl Into<String>, institution: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            id: id.into(),
            institution: institution.into(),
            name: String::new(),
            account_number: String::new(),
            current_balance: None,
            available_balance: None,
            prior_day_balance: None,
            balance_due: None,
            account_type,
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let balance = self
            .current_balance
            .map(|b| format!("${b:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        write!(
            f,
            "[{}] {} ({}) {} balance: {}",
            self.account_type, self.name, self.account_number, self.id, balance
        )
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// Settlement status as reported by the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Posted,
    Pending,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Posted => write!(f, "posted"),
            TransactionStatus::Pending => write!(f, "pending"),
        }
    }
}

/// A single register entry. No identity is carried across fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub posted_at: NaiveDate,
    pub payee: String,
    pub status: TransactionStatus,
    /// Negative for debits, positive for credits.
    pub amount: Option<Decimal>,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let amount = self
            .amount
            .map(|a| format!("{a:.2}"))
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{} {:<40} {:>12} ({})",
            self.posted_at, self.payee, amount, self.status
        )
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Login credentials for the portal.
///
/// Password and challenge answers are kept behind `SecretString` so they
/// never show up in `Debug` output or logs.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Challenge question text → answer.
    pub challenge_answers: HashMap<String, SecretString>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(SecretString::new(password.into())),
            challenge_answers: HashMap::new(),
        }
    }

    /// Add an answer for a challenge question.
    pub fn with_answer(mut self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.challenge_answers
            .insert(question.into(), SecretString::new(answer.into()));
        self
    }

    pub fn answer_for(&self, question: &str) -> Option<&SecretString> {
        self.challenge_answers.get(question)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the connector.
///
/// Operations return `anyhow::Result`; callers that need to branch on the
/// failure kind downcast to this type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectorError {
    /// Missing or rejected credentials. The message names the exact
    /// question or answer involved so configuration can be fixed.
    #[error("{0}")]
    InformationMissing(String),

    /// The portal's page sequence diverged from every known branch.
    #[error("Unknown portal state: {0}")]
    ProtocolDrift(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid currency value: {0:?}")]
    InvalidCurrency(String),

    #[error("Invalid date: {0:?}")]
    InvalidDate(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
