//! Self-update for the `asana` binary.
//!
//! Installs the latest GitHub release of the CLI over the running executable,
//! verifying the download and rolling back if the new binary does not start.
//!
//! # Update Process Flow
//!
//! ```text
//! 1. Guard
//!    └── Homebrew installs are left to `brew upgrade asana-cli`
//!
//! 2. Version Check
//!    ├── Detect platform key (darwin|linux × x64|arm64)
//!    ├── Fetch latest release from GitHub
//!    └── Compare tag with the compiled-in version
//!
//! 3. Download
//!    ├── Select `asana-<platform>` and optional `.sha256` asset
//!    ├── Stream the binary into an `asana-update-*` temp dir
//!    └── Verify SHA-256 when a checksum is published
//!
//! 4. Install
//!    ├── Copy the live binary to `<path>.backup`
//!    ├── Write `<path>.new`, chmod 755, rename over the live path
//!    ├── Smoke test `<path> --version`
//!    └── Commit (drop backup) or roll back (restore backup)
//! ```
//!
//! # Module Structure
//!
//! - [`platform`]: platform key detection and package-manager guard
//! - [`version`]: lenient three-part version ordering
//! - [`release`]: release feed client and asset selection
//! - [`verification`]: SHA-256 checksum verification
//! - [`backup`]: `.backup` sibling management
//! - [`smoke_test`]: post-install smoke test
//! - [`transaction`]: replace-with-rollback state machine
//! - [`self_updater`]: orchestration
//! - [`config`]: `[upgrade]` settings
//!
//! # Limitations
//!
//! Two update runs against the same binary at the same time are not coordinated.

pub mod backup;
pub mod config;
pub mod platform;
pub mod release;
pub mod self_updater;
pub mod transaction;
pub mod verification;
pub mod version;


pub use config::UpgradeConfig;
pub use platform::PlatformKey;
pub use release::{
    AssetDescriptor, GitHubReleaseClient, ReleaseClient, ReleaseDescriptor, UpdatePlan,
};
pub use self_updater::{SelfUpdater, UpdateEvent, UpdateMode, UpdateOutcome};
pub use smoke_test::{ProcessSmokeTest, SmokeTester};
pub use verification::ChecksumVerifier;
pub use version::{VersionOrdinal, compare_versions};
