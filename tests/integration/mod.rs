//! Integration test suite for the Asana CLI
//!
//! These tests exercise the public library API and the compiled `asana` binary
//! without touching the network.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: argument validation, exit codes and error rendering of the binary
//! - **self_update**: end-to-end self-update runs against an in-memory release feed

mod cli;
mod self_update;
