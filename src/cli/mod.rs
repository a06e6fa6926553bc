//! Command-line interface for the Asana CLI.
//!
//! Each command group lives in its own module with its own clap argument
//! structures. Commands that talk to Asana share one shape:
//!
//! 1. validate arguments locally (GIDs, dates, at least one update field)
//! 2. establish an authenticated [`Session`](crate::auth::Session), refreshing
//!    an expiring OAuth token first
//! 3. call the API through the [`api`](crate::api) traits
//! 4. render the result with the selected [`OutputFormat`]
//!
//! Steps 1, 3 and 4 are generic over the API traits so they run against
//! [`RecordingApi`](crate::test_utils::RecordingApi) in tests.
//!
//! # Available Commands
//!
//! - `auth` - log in (OAuth or personal access token), log out, show the current user
//! - `task` - create, list, show, update, move, complete and delete tasks
//! - `project` - create, list, show, update and delete projects
//! - `section` - list, create, rename and delete sections of a project
//! - `self-update` - check for and install a newer release of the binary
//!
//! # Global Options
//!
//! - `--format <toon|json|plain>` - output format (default `toon`)
//! - `--verbose` / `--quiet` - log level on stderr
//! - `--config <PATH>` - alternate configuration file
//! - `--no-progress` - disable the download progress bar
//!
//! ```bash
//! asana auth login --token 1/1234567890:abcdef -w 1200000000000
//! asana task list --format json
//! asana --verbose self-update --check
//! ```

mod auth;
pub mod common;
mod project;
mod section;
mod self_update;
mod task;

use crate::config::{CONFIG_PATH_ENV, ConfigStore};
use crate::output::{OutputContext, OutputFormat};
use crate::utils::progress::NO_PROGRESS_ENV;
use anyhow::Result;
use clap::{Parser, Subcommand};
use common::CommandContext;

/// Runtime settings derived from the global flags.
///
/// ```rust,ignore
/// let config = CliConfig {
///     log_level: "debug".to_string(),
///     no_progress: true,
///     config_path: None,
/// };
/// config.apply_to_env();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Sets `ASANA_NO_PROGRESS` so [`ProgressBar`](crate::utils::progress::ProgressBar)
    /// stays hidden.
    pub no_progress: bool,

    /// Sets `ASANA_CONFIG_PATH` so every [`ConfigStore::from_env`] call sees the
    /// same file.
    pub config_path: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            no_progress: false,
            config_path: None,
        }
    }
}

impl CliConfig {
    /// Export the settings to the process environment.
    ///
    /// Call once at startup, before any other thread exists.
    pub fn apply_to_env(&self) {
        if self.no_progress {
            // SAFETY: called from the main thread before the command spawns tasks
            unsafe { std::env::set_var(NO_PROGRESS_ENV, "1") };
        }

        if let Some(ref path) = self.config_path {
            // SAFETY: as above
            unsafe { std::env::set_var(CONFIG_PATH_ENV, path) };
        }
    }
}

/// Command-line interface for Asana task management.
#[derive(Parser, Debug)]
#[command(
    name = "asana",
    about = "Command-line interface for Asana task management",
    version,
    long_about = "Manage Asana tasks, projects and sections from the terminal. Output is rendered as TOON by default; use --format json or --format plain for other formats."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Toon)]
    format: OutputFormat,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    ///
    /// Overrides `ASANA_CONFIG_PATH` and the default `~/.asana-cli/config.toml`.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<String>,

    /// Disable progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authentication commands
    Auth(auth::AuthCommand),
    /// Task management commands
    Task(task::TaskCommand),
    /// Project management commands
    Project(project::ProjectCommand),
    /// Section management commands
    Section(section::SectionCommand),
    /// Update the CLI to the latest version
    SelfUpdate(self_update::SelfUpdateCommand),
}

impl Cli {
    /// Settings implied by the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };

        CliConfig {
            log_level: log_level.to_string(),
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Run the selected command with explicit settings.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.apply_to_env();

        let ctx = CommandContext::new(ConfigStore::from_env()?, OutputContext::new(self.format));

        match self.command {
            Commands::Auth(cmd) => cmd.execute(&ctx).await,
            Commands::Task(cmd) => cmd.execute(&ctx).await,
            Commands::Project(cmd) => cmd.execute(&ctx).await,
            Commands::Section(cmd) => cmd.execute(&ctx).await,
            Commands::SelfUpdate(cmd) => cmd.execute(&ctx).await,
        }
    }
}
