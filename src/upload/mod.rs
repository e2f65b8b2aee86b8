/// Content-intake form automation
///
/// [`FormAutomator`] is the small set of page operations the orchestrator
/// needs. [`HttpFormSession`] implements it over plain HTTP with a cookie
/// jar, which is enough for the LinguaLeo forms.
pub mod http_form;

pub use http_form::HttpFormSession;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::SiteConfig;
use crate::error::{Result, SyncError};
use crate::state::Credentials;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element does nothing when clicked: {0}")]
    NotActionable(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("No page loaded")]
    NoPage,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error {status} for {url}")]
    Http { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl AutomationError {
    /// Connection-level failures (unreachable host, timeout)
    pub fn is_transport(&self) -> bool {
        matches!(self, AutomationError::Transport(_))
    }
}

impl From<reqwest::Error> for AutomationError {
    fn from(e: reqwest::Error) -> Self {
        match (e.status(), e.url()) {
            (Some(status), Some(url)) => AutomationError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            },
            _ => AutomationError::Transport(e.to_string()),
        }
    }
}

/// Page operations on one exclusive, authenticated session.
#[async_trait]
pub trait FormAutomator: Send {
    async fn navigate(&mut self, url: &str) -> std::result::Result<(), AutomationError>;

    /// Stage a value for the named field of the current page.
    /// For file fields the value is a local path.
    async fn fill_field(&mut self, name: &str, value: &str) -> std::result::Result<(), AutomationError>;

    /// Click the first element matching `selector`.
    /// Fails with [`AutomationError::ElementNotFound`] when nothing matches
    /// and [`AutomationError::NotActionable`] when the click would not
    /// change anything.
    async fn click(&mut self, selector: &str) -> std::result::Result<(), AutomationError>;

    /// Submit the form matching `selector` (or the form containing it).
    async fn submit(&mut self, selector: &str) -> std::result::Result<(), AutomationError>;

    fn current_url(&self) -> String;

    async fn refresh(&mut self) -> std::result::Result<(), AutomationError>;
}

/// Whether two URLs point at the same page, ignoring scheme, query,
/// fragment and a trailing slash.
pub fn same_page(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(a), Ok(b)) => {
            a.host_str() == b.host_str()
                && a.port() == b.port()
                && a.path().trim_end_matches('/') == b.path().trim_end_matches('/')
        }
        _ => a.trim_end_matches('/') == b.trim_end_matches('/'),
    }
}

/// Log in to the intake site.
///
/// Staying on the login page after submitting means the site rejected the
/// credentials.
pub async fn sign_in(
    automator: &mut dyn FormAutomator,
    site: &SiteConfig,
    credentials: &Credentials,
) -> Result<()> {
    let email = credentials.require("email")?;
    let password = credentials.require("password")?;
    let login_url = site.login_url();

    info!("🔐 Signing in...");
    automator.navigate(&login_url).await?;
    automator.fill_field(&site.email_field, email).await?;
    automator.fill_field(&site.password_field, password).await?;
    automator.submit(&site.login_form_selector).await?;

    if same_page(&automator.current_url(), &login_url) {
        return Err(SyncError::Credentials(
            "Invalid email and/or password".to_string(),
        ));
    }

    info!("✅ Signed in");
    Ok(())
}
