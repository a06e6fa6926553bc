//! `asana self-update`: replace the running binary with the latest release.
//!
//! The heavy lifting lives in [`crate::upgrade`]; this module wires the GitHub
//! release feed and the process smoke test into a [`SelfUpdater`] and turns its
//! progress events and outcome into terminal output.
//!
//! ```bash
//! # Only report whether a newer release exists
//! asana self-update --check
//!
//! # Download, verify and install it
//! asana self-update
//! ```

use super::common::CommandContext;
use crate::config::ConfigStore;
use crate::upgrade::{
    GitHubReleaseClient, ProcessSmokeTest, ReleaseClient, SelfUpdater, SmokeTester, UpdateEvent,
    UpdateMode, UpdateOutcome, UpgradeConfig,
};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::{debug, warn};

#[derive(Args, Debug)]
pub struct SelfUpdateCommand {
    /// Only check for updates without installing
    #[arg(long)]
    pub check: bool,
}

impl SelfUpdateCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let settings = upgrade_settings(&ctx.store).await;
        debug!("Release feed: {}", settings.repository);

        let client = GitHubReleaseClient::new(settings.repository.clone())?;
        let smoke = ProcessSmokeTest::new(settings.smoke_test_timeout());
        let updater = SelfUpdater::new(client, smoke)?.on_event(print_event);

        println!("{}", format!("Current version: v{}", updater.current_version()).blue());
        println!("{}", self.run(&updater).await?);
        Ok(())
    }

    /// Run the update and describe the result.
    pub async fn run<C: ReleaseClient, S: SmokeTester>(
        &self,
        updater: &SelfUpdater<C, S>,
    ) -> Result<String> {
        let mode = if self.check {
            UpdateMode::CheckOnly
        } else {
            UpdateMode::Install
        };
        let outcome = updater.run(mode).await?;
        Ok(describe_outcome(&outcome))
    }
}

/// Upgrade settings from the config file, or the defaults when the file is
/// missing or unreadable. A broken config must not block repairing the binary.
pub async fn upgrade_settings(store: &ConfigStore) -> UpgradeConfig {
    match store.load().await {
        Ok(config) => config.map(|config| config.upgrade).unwrap_or_default(),
        Err(e) => {
            warn!("Ignoring unreadable config {}: {e:#}", store.path().display());
            UpgradeConfig::default()
        }
    }
}

fn print_event(event: &UpdateEvent) {
    match event {
        UpdateEvent::RollingBack {
            ..
        } => eprintln!("{}", describe_event(event)),
        _ => println!("{}", describe_event(event)),
    }
}

pub fn describe_event(event: &UpdateEvent) -> String {
    match event {
        UpdateEvent::CheckingForUpdates => "Checking for updates...".blue().to_string(),
        UpdateEvent::Downloading {
            tag,
        } => format!("Downloading {tag}...").blue().to_string(),
        UpdateEvent::VerifyingChecksum => "Verifying checksum...".blue().to_string(),
        UpdateEvent::ChecksumVerified => "✓ Checksum verified".green().to_string(),
        UpdateEvent::ChecksumSkipped => {
            "⚠ No checksum available, skipping verification".yellow().to_string()
        }
        UpdateEvent::Installing {
            path,
        } => format!("Installing to {}...", path.display()).blue().to_string(),
        UpdateEvent::RollingBack {
            reason,
        } => {
            debug!("Rolling back: {reason}");
            "✗ New binary verification failed, rolling back...".red().to_string()
        }
    }
}

pub fn describe_outcome(outcome: &UpdateOutcome) -> String {
    match outcome {
        UpdateOutcome::ManagedInstall {
            ..
        } => [
            "⚠ Detected Homebrew installation".yellow().to_string(),
            "Please use Homebrew to update:".blue().to_string(),
            "  brew upgrade asana-cli".cyan().to_string(),
        ]
        .join("\n"),
        UpdateOutcome::UpToDate {
            ..
        } => "✓ You are already on the latest version".green().to_string(),
        UpdateOutcome::Available {
            latest,
            ..
        } => [
            format!("New version available: {latest}").yellow().to_string(),
            "\nTo update, run:".blue().to_string(),
            "  asana self-update".cyan().to_string(),
        ]
        .join("\n"),
        UpdateOutcome::Updated {
            previous,
            tag,
            reported_version,
            ..
        } => [
            format!("✓ Successfully updated to {tag}").green().to_string(),
            format!("  Previous version: v{previous}").bright_black().to_string(),
            format!("  New version: {reported_version}").bright_black().to_string(),
        ]
        .join("\n"),
    }
}
