//! Core types shared across the CLI.
//!
//! Currently this is the error taxonomy and its user-facing rendering; see
//! [`error`] for details.

pub mod error;

pub use error::{AsanaError, ErrorContext, user_friendly_error};
