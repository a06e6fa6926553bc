//! Shared utilities.
//!
//! - [`progress`] - download progress bars and spinners

pub mod progress;

pub use progress::ProgressBar;
