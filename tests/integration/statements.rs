//! Accounts and transactions through the `Institution` interface.

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use zions_connector::institutions::Institution;
use zions_connector::session::Session;
use zions_connector::types::{AccountType, ConnectorError, TransactionStatus};

use crate::fixtures::*;
use crate::scripted_browser::{Method, ScriptedBrowser};

fn january() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
}

#[tokio::test]
async fn test_fetch_accounts_maps_feed_in_order() {
    let browser = ScriptedBrowser::new();
    script_warm_session(&browser);
    browser.on_get(BALANCES, BALANCES_JSON);
    let mut session = Session::new(browser.clone());

    let accounts = bank(credentials()).fetch_accounts(&mut session).await.unwrap();

    let ids: Vec<_> = accounts.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, ["1", "3", "2"]);

    let checking = &accounts[0];
    assert_eq!(checking.account_type, AccountType::Deposit);
    assert_eq!(checking.name, "A&B");
    assert_eq!(checking.current_balance, Some(dec!(100.00)));
    assert_eq!(checking.available_balance, Some(dec!(90.00)));
    assert_eq!(accounts[1].current_balance, Some(dec!(2500.00)));

    let visa = &accounts[2];
    assert_eq!(visa.account_type, AccountType::Credit);
    assert_eq!(visa.name, "Visa <Rewards>");
    assert_eq!(visa.balance_due, Some(dec!(25.50)));
    assert!(visa.available_balance.is_none());
    assert!(accounts.iter().all(|a| a.institution == "zions_bank"));

    assert!(browser.posts().is_empty());
}

#[tokio::test]
async fn test_fetch_accounts_twice_is_idempotent() {
    let browser = ScriptedBrowser::new();
    script_warm_session(&browser);
    browser.on_get(BALANCES, BALANCES_JSON);
    let mut session = Session::new(browser.clone());
    let bank = bank(credentials());

    let mut first = bank.fetch_accounts(&mut session).await.unwrap();
    let second = bank.fetch_accounts(&mut session).await.unwrap();
    assert_eq!(first, second);

    // Independent values.
    first[0].current_balance = Some(dec!(0));
    assert_eq!(second[0].current_balance, Some(dec!(100.00)));
}

#[tokio::test]
async fn test_fetch_accounts_logs_in_first() {
    let browser = ScriptedBrowser::new();
    script_full_login(&browser);
    browser.on_get(BALANCES, BALANCES_JSON);
    let mut session = Session::new(browser.clone());

    let accounts = bank(credentials()).fetch_accounts(&mut session).await.unwrap();
    assert_eq!(accounts.len(), 3);

    let requests = browser.requests();
    let last = requests.last().unwrap();
    assert_eq!(last.method, Method::Get);
    assert_eq!(last.url, BALANCES);
    assert!(browser.requested(Method::Post, PASSWORD_POST));
}

#[tokio::test]
async fn test_fetch_accounts_login_failure_skips_balances() {
    let browser = ScriptedBrowser::new();
    browser
        .on_get(DASHBOARD, TIMED_OUT)
        .on_get(LOGIN, LOGIN_PAGE)
        .on_post(LOGON_POST, USERNAME_REJECTED)
        .on_get(BALANCES, BALANCES_JSON);
    let mut session = Session::new(browser.clone());

    assert!(bank(credentials()).fetch_accounts(&mut session).await.is_err());
    assert!(!browser.requested(Method::Get, BALANCES));
}

#[tokio::test]
async fn test_fetch_account_returns_every_account() {
    let browser = ScriptedBrowser::new();
    script_warm_session(&browser);
    browser.on_get(BALANCES, BALANCES_JSON);
    let mut session = Session::new(browser.clone());

    let accounts = bank(credentials())
        .fetch_account(&mut session, "2")
        .await
        .unwrap();
    assert_eq!(accounts.len(), 3);
}

#[tokio::test]
async fn test_fetch_transactions_parses_register_and_refreshes_balances() {
    let browser = ScriptedBrowser::new();
    script_warm_session(&browser);
    browser
        .on_get(BALANCES, BALANCES_JSON)
        .on_post(REGISTER_CHECKING, REGISTER_PAGE);
    let mut session = Session::new(browser.clone());
    let bank = bank(credentials());
    let (start, end) = january();

    let accounts = bank.fetch_accounts(&mut session).await.unwrap();
    let txns = bank
        .fetch_transactions(&mut session, "1", start, end)
        .await
        .unwrap();

    assert_eq!(txns.len(), 2);

    assert_eq!(txns[0].posted_at, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    assert_eq!(txns[0].payee, "PAYROLL");
    assert_eq!(txns[0].status, TransactionStatus::Posted);
    assert_eq!(txns[0].amount, Some(dec!(50.00)));

    assert_eq!(txns[1].payee, "GROCER & CO");
    assert_eq!(txns[1].status, TransactionStatus::Pending);
    assert_eq!(txns[1].amount, Some(dec!(-12.34)));

    let checking = session.account("1").unwrap();
    assert_eq!(checking.prior_day_balance, Some(dec!(110.00)));
    assert_eq!(checking.current_balance, Some(dec!(137.66)));
    // No "Available Balance" label on the page.
    assert_eq!(checking.available_balance, Some(dec!(90.00)));
    // Refreshes land on the session's copy only.
    assert_eq!(accounts[0].current_balance, Some(dec!(100.00)));

    let post = browser.posts().pop().unwrap();
    assert_eq!(post.url, REGISTER_CHECKING);
    assert_eq!(post.field("actAcct"), Some("1"));
    assert_eq!(post.field("dayRange.searchType"), Some("dates"));
    assert_eq!(post.field("dayRange.startDate"), Some("01/01/2024"));
    assert_eq!(post.field("dayRange.endDate"), Some("01/31/2024"));
    assert_eq!(post.field("submit_view"), Some("view"));
}

#[tokio::test]
async fn test_fetch_transactions_requires_known_account() {
    let browser = ScriptedBrowser::new();
    script_warm_session(&browser);
    browser.on_post(REGISTER_CHECKING, REGISTER_PAGE);
    let mut session = Session::new(browser.clone());
    let (start, end) = january();

    let err = bank(credentials())
        .fetch_transactions(&mut session, "1", start, end)
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<ConnectorError>(),
        Some(&ConnectorError::AccountNotFound("1".into()))
    );
    assert!(browser.posts().is_empty());
}

#[tokio::test]
async fn test_malformed_amount_propagates() {
    let browser = ScriptedBrowser::new();
    script_warm_session(&browser);
    let bad_row = r#"<table><tr>
        <td class="data">01/15/2024</td><td class="data"></td><td class="data">X</td><td class="data">Posted</td>
        <td class="curr">twelve</td><td class="curr"></td><td class="curr"></td>
    </tr></table>"#;
    browser
        .on_get(BALANCES, BALANCES_JSON)
        .on_post(REGISTER_CHECKING, bad_row);
    let mut session = Session::new(browser.clone());
    let bank = bank(credentials());
    let (start, end) = january();

    bank.fetch_accounts(&mut session).await.unwrap();
    let err = bank
        .fetch_transactions(&mut session, "1", start, end)
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<ConnectorError>(),
        Some(&ConnectorError::InvalidCurrency("twelve".into()))
    );
}
