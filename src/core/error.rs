//! Error handling for the Asana CLI
//!
//! This module provides the error taxonomy and user-facing error reporting for the
//! CLI. It is built around two types:
//! - [`AsanaError`] - Enumerated error types for every failure the CLI reports
//! - [`ErrorContext`] - Wrapper that adds details and an actionable suggestion
//!
//! # Error Categories
//!
//! - **Self-update**: [`AsanaError::UnsupportedPlatform`], [`AsanaError::FeedUnreachable`],
//!   [`AsanaError::ChecksumVerificationFailed`], [`AsanaError::RollbackFailed`], etc.
//! - **Authentication**: [`AsanaError::NotAuthenticated`], [`AsanaError::OAuth`]
//! - **API**: [`AsanaError::Api`], [`AsanaError::Network`]
//! - **Input**: [`AsanaError::InvalidArgument`], [`AsanaError::NoUpdateFields`]
//!
//! Every command returns `anyhow::Result`; typed errors travel inside the `anyhow::Error`
//! and are recovered by [`user_friendly_error`] at the process boundary.
//!
//! # Examples
//!
//! ```rust,no_run
//! use asana_cli::core::{AsanaError, user_friendly_error};
//!
//! let error = anyhow::Error::new(AsanaError::NotAuthenticated);
//! let ctx = user_friendly_error(error);
//! ctx.display(); // prints "error: ..." and a suggestion to stderr
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for the Asana CLI.
///
/// Variants carry owned strings so the error can be cloned into an [`ErrorContext`]
/// after being recovered from an `anyhow::Error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsanaError {
    /// The operating system is not one release binaries are published for.
    #[error("Unsupported platform: {os}")]
    UnsupportedPlatform {
        /// OS name as reported by the running process
        os: String,
    },

    /// The CPU architecture is not one release binaries are published for.
    #[error("Unsupported architecture: {arch}")]
    UnsupportedArchitecture {
        /// Architecture name as reported by the running process
        arch: String,
    },

    /// The release feed answered with a non-success status.
    #[error("Failed to fetch releases: {status}")]
    FeedUnreachable {
        /// HTTP status text
        status: String,
    },

    /// The latest release has no asset for the running platform.
    #[error("No binary found for platform: {platform}")]
    NoBinaryForPlatform {
        /// The computed platform key (e.g. `linux-x64`)
        platform: String,
    },

    /// The downloaded binary did not match its published checksum.
    #[error("Checksum verification failed for {asset}")]
    ChecksumVerificationFailed {
        /// Name of the downloaded asset
        asset: String,
    },

    /// An asset download answered with a non-success status.
    #[error("Failed to download {url}: {status}")]
    DownloadFailed {
        /// Asset URL
        url: String,
        /// HTTP status text
        status: String,
    },

    /// Writing the new binary over the live path failed after the backup was taken.
    #[error("Failed to replace binary at {path}: {reason}")]
    ReplacementFailed {
        /// The live executable path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// The freshly installed binary did not answer the version check.
    #[error("New binary verification failed: {reason}")]
    SmokeTestFailed {
        /// Exit status, stderr, or timeout description
        reason: String,
    },

    /// Restoring the previous binary failed. The live binary may be stale or missing.
    #[error("Rollback failed, manual intervention required: {reason}")]
    RollbackFailed {
        /// Where the previous binary can still be found
        backup_path: String,
        /// The error that triggered the rollback
        original: String,
        /// Why the restore itself failed
        reason: String,
    },

    /// No usable credentials were found.
    #[error("Asana access token not found")]
    NotAuthenticated,

    /// The OAuth flow failed or was rejected.
    #[error("OAuth error: {message}")]
    OAuth {
        /// Description of the failure
        message: String,
    },

    /// The Asana API answered with an error status.
    #[error("Asana API request failed (HTTP {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// First error message from the response body
        message: String,
        /// Optional help text from the response body
        help: Option<String>,
    },

    /// The API could not be reached at all.
    #[error("Network error: {operation}")]
    Network {
        /// What was being attempted
        operation: String,
        /// Underlying transport failure
        reason: String,
    },

    /// A command-line value failed validation.
    #[error("Invalid {field}: {reason}")]
    InvalidArgument {
        /// Human name of the offending field
        field: String,
        /// What was wrong with it
        reason: String,
    },

    /// An update command was given nothing to update.
    #[error("At least one field must be specified for update")]
    NoUpdateFields {
        /// Flags the command accepts
        available: String,
    },

    /// The configuration file could not be read or written.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the failure
        message: String,
    },

    /// Catch-all carrying a preformatted message.
    #[error("{message}")]
    Other {
        /// The message to show
        message: String,
    },
}

/// Error wrapper carrying user-facing details and a suggestion.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: AsanaError,
    /// Optional hint on how to resolve the error
    pub suggestion: Option<String>,
    /// Optional extra explanation
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: AsanaError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colour.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// Typed [`AsanaError`]s are recovered even when wrapped in `anyhow` context; the
/// context messages become the details line. Transport and I/O errors get generic
/// suggestions, and anything else is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(asana_error) = error.downcast_ref::<AsanaError>() {
        let mut ctx = create_error_context(asana_error.clone());
        let outer = error.to_string();
        if outer != asana_error.to_string() {
            ctx.details = Some(match ctx.details.take() {
                Some(details) => format!("{outer}. {details}"),
                None => outer,
            });
        }
        return ctx;
    }

    if let Some(reqwest_error) = error.downcast_ref::<reqwest::Error>() {
        if reqwest_error.is_connect() || reqwest_error.is_timeout() {
            return ErrorContext::new(AsanaError::Network {
                operation: error.to_string(),
                reason: reqwest_error.to_string(),
            })
            .with_suggestion("Check your internet connection and try again")
            .with_details("Could not connect to the remote service");
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(AsanaError::Other {
                    message: error.to_string(),
                })
                .with_suggestion("Check file ownership, or re-run with elevated permissions")
                .with_details("The CLI does not have permission to read or write a required file");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(AsanaError::Other {
                    message: error.to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(AsanaError::Other {
        message,
    })
}

fn create_error_context(error: AsanaError) -> ErrorContext {
    match &error {
        AsanaError::UnsupportedPlatform { .. } | AsanaError::UnsupportedArchitecture { .. } => {
            ErrorContext::new(error)
                .with_suggestion("Download a build for your system manually from the releases page")
                .with_details("Release binaries are published for darwin and linux on x64 and arm64")
        }

        AsanaError::FeedUnreachable { .. } => ErrorContext::new(error)
            .with_suggestion("Check your internet connection or try again later"),

        AsanaError::NoBinaryForPlatform { platform } => {
            let platform = platform.clone();
            ErrorContext::new(error).with_details(format!(
                "The latest release does not ship an asset for {platform}"
            ))
        }

        AsanaError::ChecksumVerificationFailed { .. } => ErrorContext::new(error)
            .with_suggestion("Retry the update; if it keeps failing, report it to the maintainers")
            .with_details("The downloaded file was discarded and the installed binary was not modified"),

        AsanaError::SmokeTestFailed { .. } | AsanaError::ReplacementFailed { .. } => {
            ErrorContext::new(error).with_details("The previous binary has been restored")
        }

        AsanaError::RollbackFailed { backup_path, original, .. } => {
            let suggestion = format!(
                "Restore the previous binary by hand by moving {backup_path} back into place"
            );
            let details = format!("The update failed with: {original}");
            ErrorContext::new(error).with_suggestion(suggestion).with_details(details)
        }

        AsanaError::NotAuthenticated => ErrorContext::new(error)
            .with_suggestion("Run \"asana auth login\" first, or set ASANA_ACCESS_TOKEN"),

        AsanaError::OAuth { .. } => ErrorContext::new(error).with_suggestion(
            "Set ASANA_CLIENT_ID and ASANA_CLIENT_SECRET, or log in with --token <PAT> instead",
        ),

        AsanaError::Api { status, help, .. } => {
            let (suggestion, details) = match status {
                401 => (
                    "Your access token may have expired. Run \"asana auth login\" to re-authenticate",
                    "Authentication failed",
                ),
                403 => (
                    "Ask a workspace admin for access to this resource",
                    "You do not have permission to perform this operation",
                ),
                404 => (
                    "Check the GID; the resource may have been deleted or you may not have access",
                    "Resource not found",
                ),
                429 => (
                    "Please wait a moment and try again",
                    "Rate limit exceeded",
                ),
                500..=599 => (
                    "The Asana service is experiencing issues. Please try again later",
                    "Asana server error",
                ),
                _ => ("Check the command arguments and try again", "Request rejected"),
            };
            let details = match help {
                Some(help) => format!("{details}. Help: {help}"),
                None => details.to_string(),
            };
            ErrorContext::new(error).with_suggestion(suggestion).with_details(details)
        }

        AsanaError::Network { .. } => ErrorContext::new(error)
            .with_suggestion("Could not connect to Asana API. Check your internet connection"),

        AsanaError::InvalidArgument { field, .. } => {
            let hint = if field.contains("date") || field.contains("due") || field.contains("start")
            {
                "Expected format: YYYY-MM-DD (e.g., 2025-10-30)"
            } else {
                "Expected a numeric ID"
            };
            ErrorContext::new(error).with_suggestion(hint)
        }

        AsanaError::NoUpdateFields { available } => {
            let available = available.clone();
            ErrorContext::new(error).with_suggestion(format!("Available options: {available}"))
        }

        _ => ErrorContext::new(error),
    }
}
