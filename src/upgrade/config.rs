use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::release::DEFAULT_REPOSITORY;

/// Self-update settings, stored in the `[upgrade]` table of the config file.
///
/// ```toml
/// [upgrade]
/// repository = "pleaseai/asana"
/// smoke_test_timeout_secs = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeConfig {
    /// GitHub `owner/name` whose releases are installed.
    #[serde(default = "default_repository")]
    pub repository: String,

    /// How long the new binary gets to answer `--version`.
    #[serde(default = "default_smoke_test_timeout_secs")]
    pub smoke_test_timeout_secs: u64,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            smoke_test_timeout_secs: default_smoke_test_timeout_secs(),
        }
    }
}

fn default_repository() -> String {
    DEFAULT_REPOSITORY.to_string()
}

fn default_smoke_test_timeout_secs() -> u64 {
    10
}

impl UpgradeConfig {
    pub fn smoke_test_timeout(&self) -> Duration {
        Duration::from_secs(self.smoke_test_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UpgradeConfig::default();
        assert_eq!(config.repository, "pleaseai/asana");
        assert_eq!(config.smoke_test_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_table_fills_defaults() {
        let config: UpgradeConfig = toml::from_str("repository = \"fork/asana\"").unwrap();
        assert_eq!(config.repository, "fork/asana");
        assert_eq!(config.smoke_test_timeout_secs, 10);
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let config = UpgradeConfig {
            smoke_test_timeout_secs: 0,
            ..UpgradeConfig::default()
        };
        assert_eq!(config.smoke_test_timeout(), Duration::from_secs(1));
    }
}
