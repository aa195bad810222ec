//! Value parsing helpers for scraped portal data.
//!
//! Currency and date parsing never fall back to a default: a value that
//! does not parse is an error.

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::types::ConnectorError;

/// Date format used throughout the portal (`03/14/2024`).
pub const PORTAL_DATE_FORMAT: &str = "%m/%d/%Y";

/// Parse a portal currency string such as `$1,234.56`, `-$5.00` or `($5.00)`.
pub fn parse_currency(raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim();
    let (negative, body) = if let Some(inner) = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        (true, inner)
    } else if let Some(rest) = trimmed.strip_prefix('-') {
        (true, rest)
    } else {
        (false, trimmed)
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();

    // "-$5" and "$-5" both show up
    let (negative, cleaned) = match cleaned.strip_prefix('-') {
        Some(rest) => (!negative, rest.to_string()),
        None => (negative, cleaned),
    };

    if cleaned.is_empty() {
        return Err(ConnectorError::InvalidCurrency(raw.to_string()).into());
    }

    let value = Decimal::from_str(&cleaned)
        .map_err(|_| ConnectorError::InvalidCurrency(raw.to_string()))?;

    Ok(if negative { -value } else { value })
}

/// Parse a `MM/DD/YYYY` date.
pub fn parse_portal_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), PORTAL_DATE_FORMAT)
        .map_err(|_| ConnectorError::InvalidDate(raw.to_string()).into())
}

/// Format a date the way the portal's search forms expect it.
pub fn format_portal_date(date: NaiveDate) -> String {
    date.format(PORTAL_DATE_FORMAT).to_string()
}

/// Decode HTML entities (`A&amp;B` → `A&B`).
pub fn unescape_html(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

/// Trim and drop every character outside printable ASCII (space through `~`).
pub fn printable_ascii(s: &str) -> String {
    s.trim().chars().filter(|c| (' '..='~').contains(c)).collect()
}
