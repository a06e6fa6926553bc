//! Configuration management for the Asana CLI
//!
//! All persistent state lives in one TOML file managed by [`ConfigStore`]:
//! credentials written by `asana auth login`, the default workspace, and the
//! `[upgrade]` settings used by `asana self-update`.
//!
//! # Location
//!
//! 1. `--config <PATH>` on the command line
//! 2. `ASANA_CONFIG_PATH` environment variable
//! 3. `~/.asana-cli/config.toml`
//!
//! When the file carries no access token, `ASANA_ACCESS_TOKEN` is used instead.

mod store;

pub use store::{ACCESS_TOKEN_ENV, AsanaConfig, AuthType, CONFIG_PATH_ENV, ConfigStore};
