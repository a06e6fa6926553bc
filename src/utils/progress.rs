//! Progress indicators for long-running operations.
//!
//! Wraps `indicatif` with the CLI's styling. Indicators are hidden when
//! `ASANA_NO_PROGRESS` is set (the `--no-progress` flag sets it) or when stderr
//! is not a terminal, so piped output and CI logs stay clean.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::io::IsTerminal;
use std::time::Duration;

/// Environment variable that disables all progress indicators.
pub const NO_PROGRESS_ENV: &str = "ASANA_NO_PROGRESS";

fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some() || !std::io::stderr().is_terminal()
}

/// A progress bar with consistent styling.
///
/// # Examples
///
/// ```rust
/// use asana_cli::utils::progress::ProgressBar;
///
/// let progress = ProgressBar::download(Some(2048));
/// progress.set_message("asana-linux-x64");
/// progress.inc(1024);
/// progress.inc(1024);
/// progress.finish_and_clear();
/// ```
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// A byte-counting bar for downloads. Without a known length it falls back to a
    /// spinner showing bytes received so far.
    pub fn download(total_bytes: Option<u64>) -> Self {
        if is_progress_disabled() {
            return Self::hidden();
        }

        let bar = match total_bytes {
            Some(len) => {
                let bar = IndicatifBar::new(len);
                bar.set_style(download_style());
                bar
            }
            None => {
                let bar = IndicatifBar::new_spinner();
                bar.set_style(spinner_style());
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
        };
        Self {
            inner: bar,
        }
    }

    /// A bar that draws nothing.
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn download_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{msg:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
        .progress_chars("━╸━")
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{spinner:.cyan} {msg} {bytes}")
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}
