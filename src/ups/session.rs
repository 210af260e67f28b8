//! UPS Web Session Management
//!
//! The management card protects its status page with a form login. A session
//! is established in two steps:
//!
//! 1. `GET /logon` to obtain the hidden `formtoken` / `formtokenid` inputs
//! 2. `POST /j_security_check` with the credentials and both tokens
//!
//! The card answers the POST with a redirect and a session cookie. The shared
//! `reqwest::Client` keeps that cookie in its store and follows the redirect,
//! so every later request to `/status` is authenticated until the card expires
//! the session.

use crate::config::Config;
use crate::error::{ExporterError, Result};
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::debug;

pub const LOGON_PATH: &str = "/logon";
pub const LOGIN_PATH: &str = "/j_security_check";
pub const STATUS_PATH: &str = "/status";

/// Value of the submit button the login form sends along
const SUBMIT_MARKER: &str = "Log On";

/// Authenticated HTTP context against one UPS management card
pub struct SessionManager {
    client: Client,
    base_url: String,
    username: String,
    password: SecretString,
    authenticated: bool,
}

impl SessionManager {
    /// Build the process-wide HTTP client. Cookies persist across requests
    /// and redirects are followed with the same cookie store.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .user_agent(concat!("apc-ups-exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExporterError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            authenticated: false,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Forget the current session so the next cycle logs in again
    pub fn invalidate(&mut self) {
        self.authenticated = false;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Run the full login sequence. The session is marked authenticated only
    /// when the final response of the redirect chain is a success.
    pub async fn login(&mut self) -> Result<()> {
        let result = self.submit_login().await;
        self.authenticated = result.is_ok();
        result
    }

    async fn submit_login(&self) -> Result<()> {
        let logon_url = self.url(LOGON_PATH);
        debug!("Fetching login form from {}", logon_url);

        let page = self
            .client
            .get(&logon_url)
            .send()
            .await
            .map_err(|e| ExporterError::Auth(format!("GET {} failed: {}", logon_url, e)))?
            .text()
            .await
            .map_err(|e| ExporterError::Auth(format!("Unreadable login page: {}", e)))?;

        let tokens = FormTokens::from_page(&page);

        let login_url = self.url(LOGIN_PATH);
        debug!("Submitting credentials to {}", login_url);

        let form = [
            ("j_username", self.username.as_str()),
            ("j_password", self.password.expose_secret()),
            ("login", SUBMIT_MARKER),
            ("formtoken", tokens.token.as_str()),
            ("formtokenid", tokens.token_id.as_str()),
        ];

        let response = self
            .client
            .post(&login_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ExporterError::Auth(format!("POST {} failed: {}", login_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExporterError::Auth(format!(
                "login ended with HTTP {} at {}",
                status,
                response.url()
            )));
        }

        Ok(())
    }

    /// Fetch the raw status page.
    ///
    /// Network failures and non-200 answers are returned as retryable errors;
    /// a body that cannot be read is a [`ExporterError::Parse`].
    pub async fn fetch_status(&self) -> Result<String> {
        let status_url = self.url(STATUS_PATH);
        debug!("Fetching {}", status_url);

        let response = self.client.get(&status_url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ExporterError::Status {
                url: status_url,
                status,
            });
        }

        response
            .text()
            .await
            .map_err(|e| ExporterError::Parse(format!("Failed to read status page: {}", e)))
    }
}

/// Hidden inputs the login form must echo back. Missing inputs are sent empty.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FormTokens {
    pub token: String,
    pub token_id: String,
}

impl FormTokens {
    pub fn from_page(page: &str) -> Self {
        let document = Html::parse_document(page);
        Self {
            token: input_value(&document, "formtoken"),
            token_id: input_value(&document, "formtokenid"),
        }
    }
}

fn input_value(document: &Html, name: &str) -> String {
    Selector::parse(&format!("input[name=\"{}\"]", name))
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|input| input.value().attr("value"))
                .map(str::to_string)
        })
        .unwrap_or_default()
}
