//! Account balances (JSON) and transaction register (HTML) scraping.
//!
//! Both requests assume the session is already authenticated; the
//! institution facade runs the login check first.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Selector};
use serde::Deserialize;
use tracing::{debug, info};

use crate::browser::page::selector;
use crate::config::PortalConfig;
use crate::parse::{format_portal_date, parse_currency, parse_portal_date, printable_ascii, unescape_html};
use crate::session::Session;
use crate::types::{Account, AccountType, ConnectorError, Transaction, TransactionStatus};

/// Cells a register row must have to be read as a transaction.
const TRANSACTION_CELLS: usize = 7;

/// Substring of the status cell for settled entries.
const POSTED_MARKER: &str = "Posted";

// ---------------------------------------------------------------------------
// Balances feed types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalancesResponse {
    account_balance: AccountBalance,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountBalance {
    #[serde(default)]
    deposit_account_list: Vec<DepositEntry>,
    #[serde(default)]
    credit_account_list: Vec<CreditEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositEntry {
    account_id: String,
    name: String,
    number: String,
    current_amt: String,
    available_amt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreditEntry {
    account_id: String,
    name: String,
    number: String,
    balance_due_amt: String,
}

/// Map the balances feed to accounts, deposit accounts first, each list
/// in feed order.
pub fn parse_account_balances(json: &str, institution: &str) -> Result<Vec<Account>> {
    let feed: BalancesResponse =
        serde_json::from_str(json).context("Failed to parse account balances response")?;
    let lists = feed.account_balance;

    let mut accounts =
        Vec::with_capacity(lists.deposit_account_list.len() + lists.credit_account_list.len());

    for entry in lists.deposit_account_list {
        let mut account = Account::new(entry.account_id, institution, AccountType::Deposit);
        account.name = unescape_html(&entry.name);
        account.account_number = entry.number;
        account.current_balance = Some(parse_currency(&entry.current_amt)?);
        account.available_balance = Some(parse_currency(&entry.available_amt)?);
        accounts.push(account);
    }

    for entry in lists.credit_account_list {
        let mut account = Account::new(entry.account_id, institution, AccountType::Credit);
        account.name = unescape_html(&entry.name);
        account.account_number = entry.number;
        let due = parse_currency(&entry.balance_due_amt)?;
        account.balance_due = Some(due);
        account.current_balance = Some(due);
        accounts.push(account);
    }

    Ok(accounts)
}

// ---------------------------------------------------------------------------
// Register parsing
// ---------------------------------------------------------------------------

/// Visual style of a register row. Greyed rows are a rendering detail;
/// the status comes from the status cell either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowVariant {
    Normal,
    Greyed,
}

struct RegisterSelectors {
    row: Selector,
    summary: Selector,
    data: Selector,
    curr: Selector,
    data_grey: Selector,
    curr_grey: Selector,
    labels: BalanceLabels,
}

impl RegisterSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            row: selector("tr")?,
            summary: selector(".acct")?,
            data: selector(".data")?,
            curr: selector(".curr")?,
            data_grey: selector(".datagrey")?,
            curr_grey: selector(".currgrey")?,
            labels: BalanceLabels::new()?,
        })
    }

    fn cells(&self, variant: RowVariant) -> (&Selector, &Selector) {
        match variant {
            RowVariant::Normal => (&self.data, &self.curr),
            RowVariant::Greyed => (&self.data_grey, &self.curr_grey),
        }
    }
}

/// Balances embedded in a register summary row. Labels that are absent
/// stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceSummary {
    pub prior_day: Option<Decimal>,
    pub current: Option<Decimal>,
    pub available: Option<Decimal>,
}

impl BalanceSummary {
    fn apply(&self, account: &mut Account) {
        if let Some(v) = self.prior_day {
            account.prior_day_balance = Some(v);
        }
        if let Some(v) = self.current {
            account.current_balance = Some(v);
        }
        if let Some(v) = self.available {
            account.available_balance = Some(v);
        }
    }
}

/// Label patterns of the register summary cell, compiled once per page.
struct BalanceLabels {
    prior_day: Regex,
    current: Regex,
    available: Regex,
}

impl BalanceLabels {
    fn new() -> Result<Self> {
        let labelled = |label: &str| Regex::new(&format!(r"{label}:\s*([^<]+)"));
        Ok(Self {
            prior_day: labelled("Prior Day Balance")?,
            current: labelled("Current Balance")?,
            available: labelled("Available Balance")?,
        })
    }

    fn parse(&self, html: &str) -> Result<BalanceSummary> {
        let amount = |re: &Regex| -> Result<Option<Decimal>> {
            re.captures(html).map(|c| parse_currency(&c[1])).transpose()
        };
        Ok(BalanceSummary {
            prior_day: amount(&self.prior_day)?,
            current: amount(&self.current)?,
            available: amount(&self.available)?,
        })
    }
}

/// Extract labelled balances from a summary cell's inner HTML.
pub fn parse_balance_summary(html: &str) -> Result<BalanceSummary> {
    BalanceLabels::new()?.parse(html)
}

/// Normal cells (`.data` then `.curr`) if the row has any, otherwise the
/// greyed ones. Each cell is its trimmed inner HTML restricted to
/// printable ASCII; serialized non-breaking spaces count as blank.
fn row_cells(row: ElementRef<'_>, sel: &RegisterSelectors) -> Option<(RowVariant, Vec<String>)> {
    [RowVariant::Normal, RowVariant::Greyed]
        .into_iter()
        .map(|variant| {
            let (data, curr) = sel.cells(variant);
            let cells: Vec<String> = row
                .select(data)
                .chain(row.select(curr))
                .map(|cell| clean_cell(&cell.inner_html()))
                .collect();
            (variant, cells)
        })
        .find(|(_, cells)| !cells.is_empty())
}

/// The serializer writes U+00A0 back out as `&nbsp;`; restore it so the
/// printable-ASCII filter drops it.
fn clean_cell(inner_html: &str) -> String {
    printable_ascii(&inner_html.replace("&nbsp;", "\u{a0}"))
}

/// Build a transaction from the seven cells of a register row.
///
/// Layout: 0 date, 2 payee, 3 status, 4 debit, 5 credit. When both amount
/// cells are filled the credit wins.
pub fn transaction_from_cells(cells: &[String]) -> Result<Transaction> {
    anyhow::ensure!(
        cells.len() == TRANSACTION_CELLS,
        "Register row has {} cells, expected {TRANSACTION_CELLS}",
        cells.len()
    );
    let posted_at = parse_portal_date(&cells[0])?;
    let payee = unescape_html(&cells[2]);
    let status = if cells[3].contains(POSTED_MARKER) {
        TransactionStatus::Posted
    } else {
        TransactionStatus::Pending
    };

    let mut amount = None;
    if !cells[4].is_empty() {
        amount = Some(-parse_currency(&cells[4])?);
    }
    if !cells[5].is_empty() {
        amount = Some(parse_currency(&cells[5])?);
    }

    Ok(Transaction {
        posted_at,
        payee,
        status,
        amount,
    })
}

/// Walk every table row of a register page.
///
/// Summary rows overwrite balances on `account`; rows with exactly seven
/// cells become transactions; everything else is skipped.
pub fn parse_register(html: &str, account: &mut Account) -> Result<Vec<Transaction>> {
    let sel = RegisterSelectors::new()?;
    let doc = scraper::Html::parse_document(html);
    let mut transactions = Vec::new();

    for row in doc.select(&sel.row) {
        let summary: String = row.select(&sel.summary).map(|s| s.inner_html()).collect();
        if !summary.is_empty() {
            let balances = sel.labels.parse(&summary)?;
            debug!(account = %account.id, ?balances, "Register balance summary");
            balances.apply(account);
        }

        let Some((variant, cells)) = row_cells(row, &sel) else {
            continue;
        };
        if cells.len() != TRANSACTION_CELLS {
            debug!(cells = cells.len(), ?variant, "Skipping register row");
            continue;
        }
        transactions.push(transaction_from_cells(&cells)?);
    }

    Ok(transactions)
}

// ---------------------------------------------------------------------------
// Scraper
// ---------------------------------------------------------------------------

/// Issues the data requests for an authenticated session.
pub struct StatementScraper<'a> {
    portal: &'a PortalConfig,
    institution: &'a str,
}

impl<'a> StatementScraper<'a> {
    pub fn new(portal: &'a PortalConfig, institution: &'a str) -> Self {
        Self {
            portal,
            institution,
        }
    }

    /// Fetch every account with fresh balances. The result also becomes
    /// the session's known account set.
    pub async fn fetch_accounts(&self, session: &mut Session) -> Result<Vec<Account>> {
        let page = session.get(&self.portal.balances_url).await?;
        let accounts = parse_account_balances(page.body(), self.institution)?;

        info!(count = accounts.len(), "Accounts fetched");
        session.replace_accounts(accounts.clone());
        Ok(accounts)
    }

    /// Fetch register entries for one account between two dates.
    ///
    /// The account must come from an earlier `fetch_accounts` on this
    /// session; balances reported by the register page are written back to
    /// it.
    pub async fn fetch_transactions(
        &self,
        session: &mut Session,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        if session.account(account_id).is_none() {
            return Err(ConnectorError::AccountNotFound(account_id.to_string()).into());
        }

        let url = format!(
            "{}?reSort=false&actAcct={}",
            self.portal.register_url,
            urlencoding::encode(account_id)
        );
        let fields = search_fields(account_id, start, end);

        let page = session.post(&url, &fields).await?;
        let account = session.account_mut(account_id)?;
        let transactions = parse_register(page.body(), account)?;

        info!(
            account = account_id,
            count = transactions.len(),
            start = %start,
            end = %end,
            "Transactions fetched"
        );
        Ok(transactions)
    }
}

/// Form fields of the register date-range search.
fn search_fields(account_id: &str, start: NaiveDate, end: NaiveDate) -> Vec<(String, String)> {
    [
        ("actAcct", account_id.to_string()),
        ("dayRange.searchType", "dates".to_string()),
        ("dayRange.startDate", format_portal_date(start)),
        ("dayRange.endDate", format_portal_date(end)),
        ("submit_view.x", "11".to_string()),
        ("submit_view.y", "11".to_string()),
        ("submit_view", "view".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
