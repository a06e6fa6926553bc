//! Persistent credentials and settings.
//!
//! A single TOML file, by default `~/.asana-cli/config.toml`:
//!
//! ```toml
//! access_token = "1/1234567890:abcdef"
//! refresh_token = "1/1234567890:refresh"
//! auth_type = "oauth"
//! workspace = "1200000000000000"
//! expires_at = 1767225600000
//!
//! [upgrade]
//! repository = "pleaseai/asana"
//! smoke_test_timeout_secs = 10
//! ```
//!
//! The file holds bearer tokens, so it is written with mode `0o600` on Unix.

use crate::upgrade::UpgradeConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "ASANA_CONFIG_PATH";

/// Environment variable supplying a token when the file has none.
pub const ACCESS_TOKEN_ENV: &str = "ASANA_ACCESS_TOKEN";

/// How the stored access token was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// Personal access token
    Pat,
    /// OAuth 2.0 authorization code flow
    OAuth,
}

impl AuthType {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Pat => "Personal Access Token",
            Self::OAuth => "OAuth 2.0",
        }
    }
}

/// Contents of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsanaConfig {
    #[serde(default)]
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<AuthType>,

    /// Default workspace GID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    /// Access token expiry in epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    #[serde(default)]
    pub upgrade: UpgradeConfig,
}

impl AsanaConfig {
    /// A personal-access-token config.
    pub fn with_token(access_token: impl Into<String>, workspace: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            auth_type: Some(AuthType::Pat),
            workspace,
            ..Self::default()
        }
    }

    pub fn auth_type(&self) -> AuthType {
        self.auth_type.unwrap_or(AuthType::Pat)
    }
}

/// Reads and writes the config file at a fixed path.
///
/// # Examples
///
/// ```rust,no_run
/// use asana_cli::config::{AsanaConfig, ConfigStore};
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = ConfigStore::from_env()?;
/// store.save(&AsanaConfig::with_token("1/123:abc", None)).await?;
///
/// let loaded = store.load().await?.expect("just saved");
/// assert_eq!(loaded.access_token, "1/123:abc");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Store at `ASANA_CONFIG_PATH`, or the default location.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) if !path.is_empty() => Ok(Self::new(path)),
            _ => Ok(Self::new(Self::default_path()?)),
        }
    }

    /// `~/.asana-cli/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(".asana-cli").join("config.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config file. `Ok(None)` when it does not exist.
    pub async fn load(&self) -> Result<Option<AsanaConfig>> {
        if !self.path.exists() {
            debug!("No config file at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read config from {}", self.path.display()))?;

        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", self.path.display()))?;
        Ok(Some(config))
    }

    /// Read the config file, falling back to `ASANA_ACCESS_TOKEN` for the token.
    ///
    /// `Ok(None)` when neither source provides a token.
    pub async fn load_with_env(&self) -> Result<Option<AsanaConfig>> {
        let stored = self.load().await?;
        let env_token = std::env::var(ACCESS_TOKEN_ENV).ok().filter(|t| !t.is_empty());
        Ok(merge_env_token(stored, env_token))
    }

    /// Write the config, creating the directory if needed.
    pub async fn save(&self, config: &AsanaConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(&self.path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", self.path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms).await.with_context(|| {
                format!("Failed to set secure permissions on {}", self.path.display())
            })?;
        }

        debug!("Saved config to {}", self.path.display());
        Ok(())
    }

    /// Delete the config file. Succeeds when there is none.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove config at {}", self.path.display())),
        }
    }
}

fn merge_env_token(stored: Option<AsanaConfig>, env_token: Option<String>) -> Option<AsanaConfig> {
    match (stored, env_token) {
        (Some(config), _) if !config.access_token.is_empty() => Some(config),
        (Some(mut config), Some(token)) => {
            config.access_token = token;
            config.auth_type = Some(AuthType::Pat);
            Some(config)
        }
        (None, Some(token)) => Some(AsanaConfig::with_token(token, None)),
        (_, None) => None,
    }
}
