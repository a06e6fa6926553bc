//! Asana CLI - command-line access to Asana tasks, projects and sections
//!
//! The crate backs the `asana` binary. It is split into a thin command layer and
//! library modules that can be driven and tested on their own.
//!
//! # Architecture Overview
//!
//! - Credentials (a personal access token, or OAuth tokens with an expiry) and the
//!   default workspace are stored in a TOML file, `~/.asana-cli/config.toml`.
//! - Every Asana command validates its arguments, establishes a [`auth::Session`]
//!   (refreshing an expiring OAuth token first), calls the REST API and renders
//!   the result as TOON, JSON or plain text.
//! - `asana self-update` replaces the running executable with the latest GitHub
//!   release, verifying its checksum and rolling back if the new binary fails to
//!   start.
//!
//! # Core Modules
//!
//! - [`api`] - REST client for the Asana API and the traits commands are written against
//! - [`auth`] - OAuth authorization code flow, loopback callback server, token refresh
//! - [`cli`] - clap command definitions and dispatch
//! - [`config`] - the persistent configuration file
//! - [`core`] - error types and user-facing error rendering
//! - [`output`] - TOON, JSON and plain renderers
//! - [`upgrade`] - the self-update engine
//! - [`utils`] - progress bars
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Authenticate with a personal access token and set a default workspace
//! asana auth login --token 1/1234567890:abcdef -w 1200000000000
//!
//! # Tasks
//! asana task create -n "Write release notes" --due 2025-11-01
//! asana task list -a me
//! asana task update 1201 --completed true
//!
//! # Projects and sections
//! asana project list --format json
//! asana section create 1300 -n "In review"
//!
//! # Keep the binary current
//! asana self-update --check
//! ```

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod core;
pub mod output;
pub mod upgrade;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
