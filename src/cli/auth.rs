//! `asana auth`: log in with a personal access token or OAuth, log out, and
//! show the current user.

use super::common::{CommandContext, success_line, validate_optional_gid};
use crate::api::{AsanaClient, UserApi};
use crate::auth::{OAuthCredentials, Session, TokenResponse, now_millis, run_login_flow};
use crate::config::{AsanaConfig, AuthType, ConfigStore};
use crate::output::{OutputContext, Record, format_output};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tracing::info;

const PAT_DOCS: &str = "https://developers.asana.com/docs/personal-access-token";
const OAUTH_DOCS: &str = "https://developers.asana.com/docs/authentication";

#[derive(Args, Debug)]
pub struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Subcommand, Debug)]
enum AuthSubcommand {
    /// Login to Asana (OAuth or PAT)
    Login {
        /// Use Personal Access Token (PAT) instead of OAuth
        #[arg(long)]
        token: Option<String>,
        /// Default workspace GID
        #[arg(short, long)]
        workspace: Option<String>,
    },
    /// Remove stored credentials
    Logout,
    /// Display current authenticated user
    Whoami,
}

impl AuthCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        match self.command {
            AuthSubcommand::Login {
                token: Some(token),
                workspace,
            } => {
                validate_optional_gid(workspace.as_deref(), "workspace GID")?;
                println!("{}", "Authenticating with Personal Access Token...".blue());
                let client = AsanaClient::new(token.clone())?;
                println!("{}", login_with_pat(&client, &ctx.store, token, workspace).await?);
            }
            AuthSubcommand::Login {
                token: None,
                workspace,
            } => {
                validate_optional_gid(workspace.as_deref(), "workspace GID")?;
                println!("{}", "Starting OAuth authentication...".blue());
                println!(
                    "{}",
                    "  Make sure ASANA_CLIENT_ID and ASANA_CLIENT_SECRET are set".bright_black()
                );
                println!(
                    "{}",
                    "  Create OAuth app at: https://app.asana.com/0/my-apps".bright_black()
                );

                let credentials = OAuthCredentials::from_env()?;
                let token = run_login_flow(credentials).await?;
                println!(
                    "{}",
                    save_oauth_login(&ctx.store, token, workspace, now_millis()).await?
                );
            }
            AuthSubcommand::Logout => {
                println!("{}", logout(&ctx.store).await?);
            }
            AuthSubcommand::Whoami => {
                let session = Session::establish(&ctx.store).await?;
                let output =
                    whoami(session.client(), session.config(), now_millis(), &ctx.output).await?;
                println!("{output}");
            }
        }
        Ok(())
    }
}

/// Existing settings that survive a new login.
async fn previous_settings(store: &ConfigStore) -> AsanaConfig {
    store.load().await.ok().flatten().unwrap_or_default()
}

fn workspace_line(workspace: Option<&str>) -> Option<String> {
    workspace.map(|w| format!("  Default workspace: {w}").blue().to_string())
}

/// Validate `token` with `GET /users/me` and store it.
pub async fn login_with_pat<A: UserApi>(
    api: &A,
    store: &ConfigStore,
    token: String,
    workspace: Option<String>,
) -> Result<String> {
    let me = api.me().await.context("Failed to validate personal access token")?;
    info!("Authenticated as user {}", me.gid);

    let config = AsanaConfig {
        upgrade: previous_settings(store).await.upgrade,
        ..AsanaConfig::with_token(token, workspace.clone())
    };
    store.save(&config).await?;

    let mut lines = vec![
        success_line("Successfully authenticated with PAT"),
        format!("  Docs: {PAT_DOCS}").bright_black().to_string(),
    ];
    lines.extend(workspace_line(workspace.as_deref()));
    Ok(lines.join("\n"))
}

/// Store the tokens returned by the OAuth flow.
pub async fn save_oauth_login(
    store: &ConfigStore,
    token: TokenResponse,
    workspace: Option<String>,
    now_ms: i64,
) -> Result<String> {
    let config = AsanaConfig {
        expires_at: Some(token.expires_at(now_ms)),
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        auth_type: Some(AuthType::OAuth),
        workspace: workspace.clone(),
        upgrade: previous_settings(store).await.upgrade,
    };
    store.save(&config).await?;

    let mut lines = vec![
        success_line("Successfully authenticated with OAuth"),
        format!("  Docs: {OAUTH_DOCS}").bright_black().to_string(),
    ];
    lines.extend(workspace_line(workspace.as_deref()));
    Ok(lines.join("\n"))
}

pub async fn logout(store: &ConfigStore) -> Result<String> {
    store.clear().await?;
    Ok(success_line("Successfully logged out"))
}

/// Describe token lifetime relative to `now_ms`.
fn describe_expiry(expires_at: i64, now_ms: i64) -> String {
    let minutes = (expires_at - now_ms) / 1000 / 60;
    if minutes > 0 {
        format!("in {minutes} minutes")
    } else {
        "expired (will auto-refresh)".to_string()
    }
}

pub async fn whoami<A: UserApi>(
    api: &A,
    config: &AsanaConfig,
    now_ms: i64,
    output: &OutputContext,
) -> Result<String> {
    let user = api.me().await?;

    let user_record = Record::new()
        .maybe("name", user.name)
        .maybe("email", user.email)
        .field("gid", user.gid);

    let auth_type = config.auth_type();
    let expires = match (auth_type, config.expires_at) {
        (AuthType::OAuth, Some(expires_at)) => Some(describe_expiry(expires_at, now_ms)),
        _ => None,
    };
    let authentication = Record::new()
        .field("type", auth_type.describe())
        .maybe("expires", expires)
        .maybe("default_workspace", config.workspace.clone());

    let value = Record::new()
        .field("user", user_record)
        .field("authentication", authentication)
        .into_value();
    format_output(&value, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::User;
    use crate::core::AsanaError;
    use crate::output::OutputFormat;
    use crate::test_utils::RecordingApi;
    use serde_json::json;
    use tempfile::TempDir;

    fn sam() -> User {
        User {
            gid: "7".to_string(),
            name: Some("Sam".to_string()),
            email: Some("sam@example.com".to_string()),
            workspaces: None,
        }
    }

    fn store(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("config.toml"))
    }

    #[tokio::test]
    async fn test_pat_login_validates_then_saves() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let api = RecordingApi::new().with_user(sam());

        let out = login_with_pat(&api, &store, "1/abc".to_string(), Some("55".to_string()))
            .await
            .unwrap();

        assert_eq!(api.routes(), vec!["GET /users/me"]);
        assert!(out.contains("Successfully authenticated with PAT"));
        assert!(out.contains("Default workspace: 55"));

        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved, AsanaConfig::with_token("1/abc", Some("55".to_string())));
    }

    #[tokio::test]
    async fn test_rejected_pat_is_not_saved() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let api = RecordingApi::failing(AsanaError::Api {
            status: 401,
            message: "Not Authorized".to_string(),
            help: None,
        });

        let err = login_with_pat(&api, &store, "bad".to_string(), None).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AsanaError>(),
            Some(AsanaError::Api { status: 401, .. })
        ));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oauth_login_stores_expiry() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let token = TokenResponse {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_in: 3600,
            token_type: Some("bearer".to_string()),
        };

        save_oauth_login(&store, token, None, 1_000).await.unwrap();

        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved.auth_type, Some(AuthType::OAuth));
        assert_eq!(saved.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(saved.expires_at, Some(3_601_000));
    }

    #[tokio::test]
    async fn test_logout_removes_credentials() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(&AsanaConfig::with_token("1/abc", None)).await.unwrap();

        let out = logout(&store).await.unwrap();

        assert!(out.contains("Successfully logged out"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_whoami_reports_oauth_expiry() {
        let api = RecordingApi::new().with_user(sam());
        let config = AsanaConfig {
            auth_type: Some(AuthType::OAuth),
            expires_at: Some(31 * 60 * 1000),
            workspace: Some("55".to_string()),
            ..AsanaConfig::with_token("access", None)
        };

        let out = whoami(&api, &config, 0, &OutputContext::uncolored(OutputFormat::Json))
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            value,
            json!({
                "user": {"name": "Sam", "email": "sam@example.com", "gid": "7"},
                "authentication": {
                    "type": "OAuth 2.0",
                    "expires": "in 31 minutes",
                    "default_workspace": "55"
                }
            })
        );
    }

    #[test]
    fn test_describe_expiry() {
        assert_eq!(describe_expiry(120_000, 0), "in 2 minutes");
        assert_eq!(describe_expiry(30_000, 0), "expired (will auto-refresh)");
        assert_eq!(describe_expiry(0, 60_000), "expired (will auto-refresh)");
    }
}
