//! Test utilities for the Asana CLI
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration suite.
//!
//! - [`init_test_logging`] - one-time tracing setup routed through the test writer
//! - [`StaticReleaseClient`] - in-memory release feed for the self-updater
//! - [`StubSmokeTest`] - smoke tester with a fixed verdict
//! - [`RecordingApi`] - fake Asana API that records calls and returns canned records
//!
//! # Example
//!
//! ```rust,no_run
//! use asana_cli::test_utils::{StaticReleaseClient, StubSmokeTest};
//!
//! let client = StaticReleaseClient::new("v0.2.0")
//!     .with_asset("asana-linux-x64", b"#!/bin/sh\necho asana 0.2.0\n".to_vec())
//!     .with_checksum_for("asana-linux-x64");
//! let smoke = StubSmokeTest::passing("asana 0.2.0");
//! ```

mod fake_api;

pub use fake_api::{ApiCall, RecordingApi};

use crate::core::AsanaError;
use crate::upgrade::release::{AssetDescriptor, ReleaseClient, ReleaseDescriptor};
use crate::upgrade::smoke_test::SmokeTester;
use anyhow::Result;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has any effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=asana_cli=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_ansi(true)
            .try_init();
    });
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// A release feed served from memory.
///
/// Asset URLs have the form `https://releases.test/<tag>/<name>`. Every call is
/// recorded and can be inspected with [`StaticReleaseClient::calls`].
pub struct StaticReleaseClient {
    release: ReleaseDescriptor,
    feed_status: Option<String>,
    bodies: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl StaticReleaseClient {
    pub fn new(tag: &str) -> Self {
        Self {
            release: ReleaseDescriptor {
                tag_name: tag.to_string(),
                name: Some(tag.to_string()),
                prerelease: false,
                assets: Vec::new(),
            },
            feed_status: None,
            bodies: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Feed that answers every query with the given HTTP status.
    pub fn unreachable(status: &str) -> Self {
        let mut client = Self::new("v0.0.0");
        client.feed_status = Some(status.to_string());
        client
    }

    #[must_use]
    pub fn with_asset(mut self, name: &str, body: impl Into<Vec<u8>>) -> Self {
        let url = format!("https://releases.test/{}/{name}", self.release.tag_name);
        self.release.assets.push(AssetDescriptor {
            name: name.to_string(),
            browser_download_url: url.clone(),
        });
        self.bodies.insert(url, body.into());
        self
    }

    /// Publish a correct `sha256sum`-style checksum for an asset added earlier.
    #[must_use]
    pub fn with_checksum_for(self, name: &str) -> Self {
        let digest = self.body_of(name).map(sha256_hex).unwrap_or_default();
        self.with_asset(&format!("{name}.sha256"), format!("{digest}  {name}\n"))
    }

    /// Publish an explicit checksum body for an asset.
    #[must_use]
    pub fn with_checksum_text(self, name: &str, text: &str) -> Self {
        self.with_asset(&format!("{name}.sha256"), text.to_string())
    }

    fn body_of(&self, name: &str) -> Option<&[u8]> {
        let url = format!("https://releases.test/{}/{name}", self.release.tag_name);
        self.bodies.get(&url).map(Vec::as_slice)
    }

    /// Calls made so far: `latest`, `download <url>`, `fetch <url>`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn download_count(&self) -> usize {
        self.calls().iter().filter(|c| c.starts_with("download ")).count()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn body(&self, url: &str) -> Result<&Vec<u8>> {
        self.bodies.get(url).ok_or_else(|| {
            AsanaError::DownloadFailed {
                url: url.to_string(),
                status: "404 Not Found".to_string(),
            }
            .into()
        })
    }
}

impl ReleaseClient for StaticReleaseClient {
    async fn latest_release(&self) -> Result<ReleaseDescriptor> {
        self.record("latest".to_string());
        match &self.feed_status {
            Some(status) => Err(AsanaError::FeedUnreachable {
                status: status.clone(),
            }
            .into()),
            None => Ok(self.release.clone()),
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.record(format!("download {url}"));
        let body = self.body(url)?;
        tokio::fs::write(dest, body).await?;
        Ok(body.len() as u64)
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.record(format!("fetch {url}"));
        Ok(String::from_utf8_lossy(self.body(url)?).into_owned())
    }
}

/// A smoke tester that always returns the same verdict.
pub struct StubSmokeTest {
    verdict: Result<String, AsanaError>,
    runs: AtomicUsize,
}

impl StubSmokeTest {
    pub fn passing(version_output: &str) -> Self {
        Self {
            verdict: Ok(version_output.to_string()),
            runs: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            verdict: Err(AsanaError::SmokeTestFailed {
                reason: reason.to_string(),
            }),
            runs: AtomicUsize::new(0),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl SmokeTester for StubSmokeTest {
    async fn check(&self, _binary: &Path) -> Result<String, AsanaError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.verdict.clone()
    }
}

impl SmokeTester for &StubSmokeTest {
    async fn check(&self, binary: &Path) -> Result<String, AsanaError> {
        (**self).check(binary).await
    }
}

impl ReleaseClient for &StaticReleaseClient {
    async fn latest_release(&self) -> Result<ReleaseDescriptor> {
        (**self).latest_release().await
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        (**self).download(url, dest).await
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        (**self).fetch_text(url).await
    }
}
