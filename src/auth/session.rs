use super::oauth::{OAuthClient, OAuthCredentials, TokenResponse};
use crate::api::AsanaClient;
use crate::config::{AsanaConfig, AuthType, ConfigStore};
use crate::core::AsanaError;
use anyhow::Result;
use tracing::{debug, info, warn};

/// OAuth tokens are refreshed when they expire within this window.
pub const REFRESH_MARGIN_MS: i64 = 5 * 60 * 1000;

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whether a stored OAuth token should be refreshed before use.
pub fn needs_refresh(config: &AsanaConfig, now_ms: i64) -> bool {
    config.auth_type() == AuthType::OAuth
        && config.refresh_token.is_some()
        && now_ms >= config.expires_at.unwrap_or(0) - REFRESH_MARGIN_MS
}

/// Fold a refreshed token into the stored config.
pub fn apply_token(config: &mut AsanaConfig, token: TokenResponse, now_ms: i64) {
    config.expires_at = Some(token.expires_at(now_ms));
    config.access_token = token.access_token;
    if token.refresh_token.is_some() {
        config.refresh_token = token.refresh_token;
    }
}

/// Authenticated API access for one CLI invocation.
pub struct Session {
    config: AsanaConfig,
    client: AsanaClient,
}

impl Session {
    /// Load credentials, refreshing an expiring OAuth token first.
    pub async fn establish(store: &ConfigStore) -> Result<Self> {
        let mut config = store
            .load_with_env()
            .await?
            .filter(|c| !c.access_token.is_empty())
            .ok_or(AsanaError::NotAuthenticated)?;

        if needs_refresh(&config, now_millis()) {
            info!("OAuth token expired or expiring soon, refreshing");
            refresh(&mut config).await?;
            store.save(&config).await?;
        }

        debug!("Using {} credentials", config.auth_type().describe());
        let client = AsanaClient::new(config.access_token.clone())?;
        Ok(Self {
            config,
            client,
        })
    }

    pub fn client(&self) -> &AsanaClient {
        &self.client
    }

    pub fn config(&self) -> &AsanaConfig {
        &self.config
    }

    pub fn default_workspace(&self) -> Option<&str> {
        self.config.workspace.as_deref()
    }
}

async fn refresh(config: &mut AsanaConfig) -> Result<()> {
    let Some(refresh_token) = config.refresh_token.clone() else {
        return Ok(());
    };

    let attempt = async {
        let client = OAuthClient::new(OAuthCredentials::from_env()?)?;
        client.refresh(&refresh_token).await
    };

    match attempt.await {
        Ok(token) => {
            apply_token(config, token, now_millis());
            Ok(())
        }
        Err(e) => {
            warn!("Failed to refresh token: {e:#}");
            Err(AsanaError::OAuth {
                message: "Token refresh failed. Please run \"asana auth login\" again.".to_string(),
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn oauth_config(expires_at: i64) -> AsanaConfig {
        AsanaConfig {
            refresh_token: Some("refresh".to_string()),
            auth_type: Some(AuthType::OAuth),
            expires_at: Some(expires_at),
            ..AsanaConfig::with_token("access", None)
        }
    }

    #[test]
    fn test_needs_refresh_within_margin() {
        let now = 10_000_000;
        assert!(needs_refresh(&oauth_config(now), now));
        assert!(needs_refresh(&oauth_config(now + REFRESH_MARGIN_MS - 1), now));
        assert!(needs_refresh(&oauth_config(now + REFRESH_MARGIN_MS), now));
        assert!(!needs_refresh(&oauth_config(now + REFRESH_MARGIN_MS + 1), now));
    }

    #[test]
    fn test_pat_and_tokenless_configs_never_refresh() {
        let pat = AsanaConfig::with_token("1/abc", None);
        assert!(!needs_refresh(&pat, i64::MAX));

        let mut no_refresh_token = oauth_config(0);
        no_refresh_token.refresh_token = None;
        assert!(!needs_refresh(&no_refresh_token, i64::MAX));
    }

    #[test]
    fn test_apply_token_keeps_refresh_token_when_absent() {
        let mut config = oauth_config(0);
        apply_token(
            &mut config,
            TokenResponse {
                access_token: "new".to_string(),
                refresh_token: None,
                expires_in: 3600,
                token_type: None,
            },
            1_000,
        );

        assert_eq!(config.access_token, "new");
        assert_eq!(config.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(config.expires_at, Some(3_601_000));
    }

    #[tokio::test]
    #[serial]
    async fn test_establish_without_credentials_is_not_authenticated() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("config.toml"));
        unsafe {
            std::env::remove_var(crate::config::ACCESS_TOKEN_ENV);
        }

        let err = Session::establish(&store).await.err().unwrap();
        assert_eq!(err.downcast_ref::<AsanaError>(), Some(&AsanaError::NotAuthenticated));
    }

    #[tokio::test]
    #[serial]
    async fn test_establish_uses_stored_workspace() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("config.toml"));
        store.save(&AsanaConfig::with_token("1/abc", Some("42".to_string()))).await.unwrap();

        let session = Session::establish(&store).await.unwrap();
        assert_eq!(session.default_workspace(), Some("42"));
        assert_eq!(session.config().access_token, "1/abc");
    }

    #[tokio::test]
    #[serial]
    async fn test_failed_refresh_asks_for_login() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("config.toml"));
        store.save(&oauth_config(0)).await.unwrap();
        unsafe {
            std::env::remove_var(super::super::oauth::CLIENT_ID_ENV);
            std::env::remove_var(super::super::oauth::CLIENT_SECRET_ENV);
        }

        let err = Session::establish(&store).await.err().unwrap();
        assert!(err.to_string().contains("Token refresh failed"));
    }
}
