//! OAuth 2.0 authorization-code flow against Asana.

use super::callback::CallbackServer;
use crate::core::AsanaError;
use anyhow::{Context, Result};
use colored::Colorize;
use reqwest::Url;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

pub const AUTHORIZE_URL: &str = "https://app.asana.com/-/oauth_authorize";
pub const TOKEN_URL: &str = "https://app.asana.com/-/oauth_token";
pub const REDIRECT_URI: &str = "http://localhost:8080/callback";
pub const CALLBACK_PORT: u16 = 8080;
pub const SCOPE: &str = "default";

pub const CLIENT_ID_ENV: &str = "ASANA_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "ASANA_CLIENT_SECRET";

/// How long `auth login` waits for the browser to come back.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Registered OAuth app credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthCredentials {
    pub fn from_env() -> Result<Self, AsanaError> {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        match (read(CLIENT_ID_ENV), read(CLIENT_SECRET_ENV)) {
            (Some(client_id), Some(client_secret)) => Ok(Self {
                client_id,
                client_secret,
            }),
            _ => Err(AsanaError::OAuth {
                message: format!(
                    "OAuth requires {CLIENT_ID_ENV} and {CLIENT_SECRET_ENV} environment variables. \
                     Create an OAuth app at: https://app.asana.com/0/my-apps"
                ),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Absolute expiry in epoch milliseconds.
    pub fn expires_at(&self, now_ms: i64) -> i64 {
        now_ms + self.expires_in * 1000
    }
}

/// Random value tying the callback to this login attempt.
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn authorize_url(credentials: &OAuthCredentials, state: &str) -> Result<Url> {
    Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", credentials.client_id.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("response_type", "code"),
            ("state", state),
            ("scope", SCOPE),
        ],
    )
    .context("Failed to build authorization URL")
}

/// Turns an authorization code into tokens.
pub trait CodeExchanger {
    fn exchange(&self, code: &str) -> impl Future<Output = Result<TokenResponse>> + Send;
}

/// Token endpoint client.
pub struct OAuthClient {
    http: reqwest::Client,
    credentials: OAuthCredentials,
    token_url: String,
}

impl OAuthClient {
    pub fn new(credentials: OAuthCredentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("asana-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            credentials,
            token_url: TOKEN_URL.to_string(),
        })
    }

    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        self.token_request(
            &[
                ("grant_type", "authorization_code"),
                ("client_id", &self.credentials.client_id),
                ("client_secret", &self.credentials.client_secret),
                ("redirect_uri", REDIRECT_URI),
                ("code", code),
            ],
            "Token exchange failed",
        )
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.token_request(
            &[
                ("grant_type", "refresh_token"),
                ("client_id", &self.credentials.client_id),
                ("client_secret", &self.credentials.client_secret),
                ("refresh_token", refresh_token),
            ],
            "Token refresh failed",
        )
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)], failure: &str) -> Result<TokenResponse> {
        debug!("POST {}", self.token_url);
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .with_context(|| format!("{failure}: could not reach {}", self.token_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AsanaError::OAuth {
                message: format!("{failure}: {body}"),
            }
            .into());
        }

        response.json().await.with_context(|| format!("{failure}: malformed token response"))
    }
}

impl CodeExchanger for OAuthClient {
    async fn exchange(&self, code: &str) -> Result<TokenResponse> {
        self.exchange_code(code).await
    }
}

/// Open `url` in the user's browser. Returns whether a launcher was started.
///
/// The launcher is awaited in the background so it never lingers as a zombie.
pub fn open_browser(url: &str) -> bool {
    let Some(program) = ["xdg-open", "open"].iter().find_map(|name| which::which(name).ok())
    else {
        return false;
    };

    let spawned = tokio::process::Command::new(&program)
        .arg(url)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn();

    match spawned {
        Ok(mut child) => {
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) => debug!("Browser launcher exited with {status}"),
                    Err(e) => debug!("Failed to wait for browser launcher: {e}"),
                }
            });
            true
        }
        Err(e) => {
            warn!("Failed to launch browser: {e}");
            false
        }
    }
}

/// Full interactive login: print the URL, open the browser and wait for the
/// redirect on the local callback listener.
pub async fn run_login_flow(credentials: OAuthCredentials) -> Result<TokenResponse> {
    let state = generate_state();
    let url = authorize_url(&credentials, &state)?;

    println!("{}", "Opening browser for authentication...".blue());
    println!("{}", format!("If the browser doesn't open, visit: {url}").bright_black());

    let server = CallbackServer::bind_loopback(CALLBACK_PORT, state).await?;
    println!("{}", "Waiting for authentication...".bright_black());

    if !open_browser(url.as_str()) {
        debug!("No browser launcher available");
    }

    let client = OAuthClient::new(credentials)?;
    server.run(&client, CALLBACK_TIMEOUT).await
}
