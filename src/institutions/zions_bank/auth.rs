//! Portal login as an explicit state machine.
//!
//! The flow is linear with early exits:
//!
//! ```text
//! Probe ──(no timeout)──────────────────────────────────────────► Authenticated
//!   │
//!   ▼
//! CredentialCheck → SubmitUsername → FollowInterstitial → ChallengeBranch
//!                                                            │ (skipped when the page
//!                                                            ▼  asks for the password)
//!                                        SubmitPassword → FinalizeLogin → Authenticated
//! ```
//!
//! Every failure names the credential, question or answer involved so the
//! caller can fix configuration. Nothing is retried.

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::browser::Page;
use crate::browser::page::selector;
use crate::config::PortalConfig;
use crate::session::Session;
use crate::types::{ConnectorError, Credentials};

/// Marker the portal renders on any page requested with an expired session.
pub const SESSION_TIMEOUT_MARKER: &str = "SessionTimeOutException";

/// Shown instead of the challenge question when the device is recognised.
const PASSWORD_ONLY_MARKER: &str = "Site Validation and Password";

const LOGIN_FORM: &str = "logonForm";
const FINGERPRINT_FIELD: &str = "pm_fp";
const USERNAME_FIELD: &str = "publicCred1";
const PASSWORD_FIELD: &str = "privateCred1";
const ANSWER_FIELD: &str = "challengeEntry.answerText";
const SUBMIT_CONTROL: &str = "_eventId_submit";
/// Radio value meaning "do not remember this device".
const DO_NOT_REMEMBER: &str = "false";
const ERROR_PAGE_TITLE: &str = "Error Page";
const ERROR_COMPONENT: &str = "#errorComponent";

/// Browser fingerprint the portal's anti-bot check expects with the username.
const BROWSER_FINGERPRINT: &str = "version%3D1%26pm%5Ffpua%3Dmozilla%2F5%2E0%20%28windows%20nt%206%2E1%3B%20wow64%29%20applewebkit%2F535%2E19%20%28khtml%2C%20like%20gecko%29%20chrome%2F18%2E0%2E1025%2E162%20safari%2F535%2E19%7C5%2E0%20%28Windows%20NT%206%2E1%3B%20WOW64%29%20AppleWebKit%2F535%2E19%20%28KHTML%2C%20like%20Gecko%29%20Chrome%2F18%2E0%2E1025%2E162%20Safari%2F535%2E19%7CWin32%26pm%5Ffpsc%3D32%7C1920%7C1200%7C1200%26pm%5Ffpsw%3D%7Cqt1%7Cqt2%7Cqt3%7Cqt4%7Cqt5%7Cqt6%26pm%5Ffptz%3D%2D6%26pm%5Ffpln%3Dlang%3Den%2DUS%7Csyslang%3D%7Cuserlang%3D%26pm%5Ffpjv%3D1%26pm%5Ffpco%3D1";

const UNKNOWN_STATE: &str = "Unknown URL reached. Try logging in manually through a browser.";

/// Successful result of [`SessionAuthenticator::ensure_authenticated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The probe found a live session; nothing was submitted.
    AlreadyAuthenticated,
    /// A full login ran during this call.
    AuthenticatedThisCall,
}

/// Named states of the login flow. Steps that act on the previous
/// response carry that page.
#[derive(Debug)]
enum LoginStep {
    Probe,
    CredentialCheck,
    SubmitUsername,
    FollowInterstitial(Page),
    ChallengeBranch(Page),
    SubmitPassword(Page),
    FinalizeLogin(Page),
    Authenticated(AuthOutcome),
}

impl LoginStep {
    fn name(&self) -> &'static str {
        match self {
            LoginStep::Probe => "probe",
            LoginStep::CredentialCheck => "credential_check",
            LoginStep::SubmitUsername => "submit_username",
            LoginStep::FollowInterstitial(_) => "follow_interstitial",
            LoginStep::ChallengeBranch(_) => "challenge_branch",
            LoginStep::SubmitPassword(_) => "submit_password",
            LoginStep::FinalizeLogin(_) => "finalize_login",
            LoginStep::Authenticated(_) => "authenticated",
        }
    }
}

fn missing(message: impl Into<String>) -> anyhow::Error {
    ConnectorError::InformationMissing(message.into()).into()
}

fn drift(message: impl Into<String>) -> anyhow::Error {
    ConnectorError::ProtocolDrift(message.into()).into()
}

/// Drives the portal login for a session.
pub struct SessionAuthenticator<'a> {
    portal: &'a PortalConfig,
    credentials: &'a Credentials,
}

impl<'a> SessionAuthenticator<'a> {
    pub fn new(portal: &'a PortalConfig, credentials: &'a Credentials) -> Self {
        Self {
            portal,
            credentials,
        }
    }

    /// Make sure `session` can issue account and transaction requests.
    ///
    /// Always re-probes the server. On a live session this is a single GET
    /// and no form is submitted.
    pub async fn ensure_authenticated(&self, session: &mut Session) -> Result<AuthOutcome> {
        let mut step = LoginStep::Probe;
        loop {
            let name = step.name();
            debug!(step = name, "Login step");

            let next = match step {
                LoginStep::Probe => self.probe(session).await,
                LoginStep::CredentialCheck => self.check_credentials(),
                LoginStep::SubmitUsername => self.submit_username(session).await,
                LoginStep::FollowInterstitial(page) => self.follow_interstitial(session, page).await,
                LoginStep::ChallengeBranch(page) => self.answer_challenge(session, page).await,
                LoginStep::SubmitPassword(page) => self.submit_password(session, page).await,
                LoginStep::FinalizeLogin(page) => self.finalize_login(session, page).await,
                LoginStep::Authenticated(outcome) => {
                    if outcome == AuthOutcome::AuthenticatedThisCall {
                        info!("Portal login successful");
                    }
                    return Ok(outcome);
                }
            };

            step = match next {
                Ok(next) => next,
                Err(e) => {
                    warn!(step = name, "Portal login aborted");
                    return Err(e);
                }
            };
        }
    }

    // -- Steps -------------------------------------------------------------

    async fn probe(&self, session: &mut Session) -> Result<LoginStep> {
        let page = session.get(&self.portal.dashboard_url).await?;
        if page.contains(SESSION_TIMEOUT_MARKER) {
            info!("Portal session timed out, logging in");
            Ok(LoginStep::CredentialCheck)
        } else {
            Ok(LoginStep::Authenticated(AuthOutcome::AlreadyAuthenticated))
        }
    }

    fn check_credentials(&self) -> Result<LoginStep> {
        self.username()?;
        self.password()?;
        Ok(LoginStep::SubmitUsername)
    }

    async fn submit_username(&self, session: &mut Session) -> Result<LoginStep> {
        let username = self.username()?;
        let login_page = session.get(&self.portal.login_url).await?;
        let mut form = login_page
            .form_named(LOGIN_FORM)
            .ok_or_else(|| drift(format!("Login page has no form named {LOGIN_FORM:?}")))?;
        form.set(FINGERPRINT_FIELD, BROWSER_FINGERPRINT);
        form.set(USERNAME_FIELD, username);

        let page = session.submit(&form, None).await?;
        if page.title().as_deref() == Some(ERROR_PAGE_TITLE) {
            return Err(missing("Invalid username"));
        }
        Ok(LoginStep::FollowInterstitial(page))
    }

    async fn follow_interstitial(&self, session: &mut Session, page: Page) -> Result<LoginStep> {
        let link = page
            .first_link()
            .ok_or_else(|| drift("No link to follow after submitting the username"))?;
        let mut page = session.click(&link).await?;

        if let Some(path) = page.meta_refresh_target() {
            debug!(path = %path, "Following device verification bounce");
            let url = format!("{}{}", self.portal.device_fingerprint_host, path);
            page = session.get(&url).await?;
        }
        Ok(LoginStep::ChallengeBranch(page))
    }

    async fn answer_challenge(&self, session: &mut Session, page: Page) -> Result<LoginStep> {
        if page.contains(PASSWORD_ONLY_MARKER) {
            debug!("No challenge question presented");
            return Ok(LoginStep::SubmitPassword(page));
        }

        let question = challenge_question(&page)?;
        let answer = self
            .credentials
            .answer_for(&question)
            .ok_or_else(|| missing(format!("Please answer the question, \"{question}\"")))?;

        let mut form = page
            .first_form()
            .ok_or_else(|| drift("Challenge page has no form"))?;
        form.set(ANSWER_FIELD, answer.expose_secret().as_str());
        form.check_radio(DO_NOT_REMEMBER)?;

        let page = session.submit(&form, Some(SUBMIT_CONTROL)).await?;
        if page.has_element(ERROR_COMPONENT)? {
            return Err(missing(format!(
                "\"{}\" is not the correct answer to, \"{question}\"",
                answer.expose_secret()
            )));
        }
        Ok(LoginStep::SubmitPassword(page))
    }

    async fn submit_password(&self, session: &mut Session, page: Page) -> Result<LoginStep> {
        let password = self.password()?;
        let mut form = page
            .first_form()
            .ok_or_else(|| drift("Password page has no form"))?;
        form.set(PASSWORD_FIELD, password.expose_secret().as_str());

        let page = session.submit(&form, Some(SUBMIT_CONTROL)).await?;
        if page.has_element(ERROR_COMPONENT)? {
            return Err(missing("An invalid password was supplied"));
        }
        Ok(LoginStep::FinalizeLogin(page))
    }

    async fn finalize_login(&self, session: &mut Session, page: Page) -> Result<LoginStep> {
        let link = page
            .first_link()
            .ok_or_else(|| drift("No link to the banking site after the password"))?;
        let landing = session.click(&link).await?;

        if landing.url().as_str() != self.portal.authenticated_landing_url {
            debug!(url = %landing.url(), "Unexpected landing page, checking account listing");
            let listing = session.get(&self.portal.fallback_accounts_url).await?;
            if listing.contains(SESSION_TIMEOUT_MARKER) {
                return Err(drift(UNKNOWN_STATE));
            }
        }
        Ok(LoginStep::Authenticated(AuthOutcome::AuthenticatedThisCall))
    }

    // -- Credentials -------------------------------------------------------

    fn username(&self) -> Result<&str> {
        self.credentials
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| missing("Please supply a username"))
    }

    fn password(&self) -> Result<&SecretString> {
        self.credentials
            .password
            .as_ref()
            .filter(|p| !p.expose_secret().is_empty())
            .ok_or_else(|| missing("Please supply a password"))
    }
}

/// Text of the challenge question.
///
/// The portal renders the question as the `div` content of the third
/// `div.form_field` block. This is a positional contract with the page
/// layout and breaks if the portal adds or removes a field above it.
pub fn challenge_question(page: &Page) -> Result<String> {
    let fields = selector("div.form_field")?;
    let inner = selector("div")?;
    let doc = page.document();
    let field = doc
        .select(&fields)
        .nth(2)
        .ok_or_else(|| drift("Challenge question block not found"))?;
    let text: String = field.select(&inner).flat_map(|d| d.text()).collect();
    Ok(text.trim().to_string())
}
