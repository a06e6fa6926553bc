//! Shared argument validation and command plumbing.

use crate::config::ConfigStore;
use crate::core::AsanaError;
use crate::output::OutputContext;
use anyhow::Result;
use colored::Colorize;
use regex::Regex;

/// What every command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub store: ConfigStore,
    pub output: OutputContext,
}

impl CommandContext {
    pub fn new(store: ConfigStore, output: OutputContext) -> Self {
        Self {
            store,
            output,
        }
    }
}

/// Asana GIDs are numeric strings.
pub fn validate_gid(value: &str, field: &str) -> Result<(), AsanaError> {
    let is_numeric = Regex::new(r"^\d+$").map(|re| re.is_match(value)).unwrap_or(false);
    if is_numeric {
        Ok(())
    } else {
        Err(AsanaError::InvalidArgument {
            field: field.to_string(),
            reason: format!("\"{value}\" is not a valid GID"),
        })
    }
}

/// Dates are `YYYY-MM-DD` and must exist on the calendar.
pub fn validate_date(value: &str, field: &str) -> Result<(), AsanaError> {
    let well_formed =
        Regex::new(r"^\d{4}-\d{2}-\d{2}$").map(|re| re.is_match(value)).unwrap_or(false);
    if well_formed && chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
        Ok(())
    } else {
        Err(AsanaError::InvalidArgument {
            field: field.to_string(),
            reason: format!("\"{value}\" is not a valid date"),
        })
    }
}

pub fn validate_optional_gid(value: Option<&str>, field: &str) -> Result<(), AsanaError> {
    value.map_or(Ok(()), |v| validate_gid(v, field))
}

pub fn validate_optional_date(value: Option<&str>, field: &str) -> Result<(), AsanaError> {
    value.map_or(Ok(()), |v| validate_date(v, field))
}

/// `-w` wins over the configured default workspace.
pub fn resolve_workspace(explicit: Option<&str>, default: Option<&str>) -> Option<String> {
    explicit.or(default).map(str::to_string)
}

pub fn require_workspace(explicit: Option<&str>, default: Option<&str>) -> Result<String> {
    resolve_workspace(explicit, default).ok_or_else(|| {
        AsanaError::Config {
            message: "Workspace is required. Set default workspace or use -w option.".to_string(),
        }
        .into()
    })
}

/// Line printed when a list endpoint returns nothing.
pub fn empty_list_message(kind: &str) -> String {
    format!("No {kind} found").yellow().to_string()
}

/// `✓ <message>` in green.
pub fn success_line(message: &str) -> String {
    format!("✓ {message}").green().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_gid() {
        assert!(validate_gid("1201234567890", "task GID").is_ok());

        let err = validate_gid("abc", "task GID").unwrap_err();
        assert_eq!(err.to_string(), "Invalid task GID: \"abc\" is not a valid GID");
        assert!(validate_gid("", "task GID").is_err());
        assert!(validate_gid("12 34", "task GID").is_err());
    }

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2025-10-30", "due date").is_ok());
        assert!(validate_date("2024-02-29", "due date").is_ok());

        assert!(validate_date("2025-02-30", "due date").is_err());
        assert!(validate_date("30/10/2025", "due date").is_err());
        assert!(validate_date("2025-1-5", "due date").is_err());
    }

    #[test]
    fn test_optional_validators_accept_none() {
        assert!(validate_optional_gid(None, "project GID").is_ok());
        assert!(validate_optional_date(None, "start date").is_ok());
        assert!(validate_optional_gid(Some("x"), "project GID").is_err());
    }

    #[test]
    fn test_workspace_resolution() {
        assert_eq!(resolve_workspace(Some("1"), Some("2")).as_deref(), Some("1"));
        assert_eq!(resolve_workspace(None, Some("2")).as_deref(), Some("2"));

        let err = require_workspace(None, None).unwrap_err();
        assert!(err.to_string().contains("Workspace is required"));
    }
}
