use crate::upgrade::platform::{PlatformKey, is_package_managed};
use crate::upgrade::release::{ReleaseClient, UpdatePlan};
use crate::upgrade::smoke_test::SmokeTester;
use crate::upgrade::transaction::BinaryReplacement;
use crate::upgrade::verification::ChecksumVerifier;
use crate::upgrade::version::is_newer;
use crate::core::AsanaError;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Name of the released binary; assets are named `<BINARY_NAME>-<platform>`.
pub const BINARY_NAME: &str = "asana";

/// Prefix of the scratch directory holding downloads.
const TEMP_DIR_PREFIX: &str = "asana-update-";

/// What the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Report whether a newer release exists.
    CheckOnly,
    /// Download and install a newer release if there is one.
    Install,
}

/// Result of a completed update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The binary belongs to a package manager and was left alone.
    ManagedInstall { path: PathBuf },
    /// The latest release is not newer than the running version.
    UpToDate { current: String },
    /// A newer release exists (check-only mode).
    Available { current: String, latest: String },
    /// The new release was installed and passed its smoke test.
    Updated {
        previous: String,
        tag: String,
        /// Output of `<binary> --version` from the new install
        reported_version: String,
        /// Whether a checksum was published and verified
        verified: bool,
    },
}

/// Progress notifications emitted while an update runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    CheckingForUpdates,
    Downloading { tag: String },
    VerifyingChecksum,
    ChecksumVerified,
    ChecksumSkipped,
    Installing { path: PathBuf },
    RollingBack { reason: String },
}

type EventSink = Box<dyn Fn(&UpdateEvent) + Send + Sync>;

/// Drives a self-update: platform detection, feed query, version comparison,
/// asset selection, download, checksum verification and installation.
///
/// Network access and the post-install smoke test are injected so the whole flow can
/// run against an in-memory release feed.
///
/// # Examples
///
/// ```rust,no_run
/// use asana_cli::upgrade::{GitHubReleaseClient, ProcessSmokeTest, SelfUpdater, UpdateMode};
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = GitHubReleaseClient::new("pleaseai/asana")?;
/// let updater = SelfUpdater::new(client, ProcessSmokeTest::default())?;
///
/// let outcome = updater.run(UpdateMode::CheckOnly).await?;
/// println!("{outcome:?}");
/// # Ok(())
/// # }
/// ```
pub struct SelfUpdater<C, S> {
    client: C,
    smoke: S,
    bin_name: String,
    current_version: String,
    live_path: PathBuf,
    platform: Option<PlatformKey>,
    temp_root: Option<PathBuf>,
    on_event: EventSink,
}

impl<C: ReleaseClient, S: SmokeTester> SelfUpdater<C, S> {
    /// Updater for the running executable at its compiled-in version.
    ///
    /// # Errors
    ///
    /// Fails when the path of the running executable cannot be determined.
    pub fn new(client: C, smoke: S) -> Result<Self> {
        let exe = std::env::current_exe().context("Failed to get current executable path")?;
        let live_path = exe.canonicalize().unwrap_or(exe);

        Ok(Self::for_path(client, smoke, live_path))
    }

    /// Updater for an arbitrary binary path.
    pub fn for_path(client: C, smoke: S, live_path: PathBuf) -> Self {
        Self {
            client,
            smoke,
            bin_name: BINARY_NAME.to_string(),
            current_version: env!("CARGO_PKG_VERSION").to_string(),
            live_path,
            platform: None,
            temp_root: None,
            on_event: Box::new(|_| {}),
        }
    }

    #[must_use]
    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = version.into();
        self
    }

    /// Skip detection and use this platform key.
    #[must_use]
    pub fn with_platform(mut self, platform: PlatformKey) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Create the download scratch directory under `root` instead of the system
    /// temp directory.
    #[must_use]
    pub fn with_temp_root(mut self, root: PathBuf) -> Self {
        self.temp_root = Some(root);
        self
    }

    #[must_use]
    pub fn on_event(mut self, sink: impl Fn(&UpdateEvent) + Send + Sync + 'static) -> Self {
        self.on_event = Box::new(sink);
        self
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn live_path(&self) -> &std::path::Path {
        &self.live_path
    }

    fn emit(&self, event: UpdateEvent) {
        (self.on_event)(&event);
    }

    /// Run the update.
    ///
    /// # Errors
    ///
    /// Any failure before installation leaves the live binary untouched. See
    /// [`BinaryReplacement::install`] for failures during installation.
    pub async fn run(&self, mode: UpdateMode) -> Result<UpdateOutcome> {
        if is_package_managed(&self.live_path) {
            info!("{:?} is managed by Homebrew, skipping self-update", self.live_path);
            return Ok(UpdateOutcome::ManagedInstall {
                path: self.live_path.clone(),
            });
        }

        let platform = match self.platform {
            Some(platform) => platform,
            None => PlatformKey::current()?,
        };
        debug!("Platform key: {platform}");

        self.emit(UpdateEvent::CheckingForUpdates);
        let release = self.client.latest_release().await?;

        if !is_newer(&self.current_version, &release.tag_name) {
            info!("Already on the latest version ({})", self.current_version);
            return Ok(UpdateOutcome::UpToDate {
                current: self.current_version.clone(),
            });
        }

        if mode == UpdateMode::CheckOnly {
            return Ok(UpdateOutcome::Available {
                current: self.current_version.clone(),
                latest: release.tag_name,
            });
        }

        let plan = UpdatePlan::select(&release, &self.bin_name, platform)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_DIR_PREFIX);
        let temp_dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .context("Failed to create temporary directory")?;

        let result = self.download_and_install(&plan, &release.tag_name, temp_dir.path()).await;

        if let Err(e) = temp_dir.close() {
            warn!("Failed to remove temporary directory: {e}");
        }

        let (reported_version, verified) = result?;
        Ok(UpdateOutcome::Updated {
            previous: self.current_version.clone(),
            tag: release.tag_name,
            reported_version,
            verified,
        })
    }

    async fn download_and_install(
        &self,
        plan: &UpdatePlan,
        tag: &str,
        scratch: &std::path::Path,
    ) -> Result<(String, bool)> {
        self.emit(UpdateEvent::Downloading {
            tag: tag.to_string(),
        });
        let staged = scratch.join(&plan.binary.name);
        let bytes = self.client.download(&plan.binary.browser_download_url, &staged).await?;
        debug!("Downloaded {} ({bytes} bytes)", plan.binary.name);

        let verified = match &plan.checksum {
            Some(checksum) => {
                self.emit(UpdateEvent::VerifyingChecksum);
                let matches = match self.client.fetch_text(&checksum.browser_download_url).await {
                    Ok(text) => ChecksumVerifier::matches(&staged, &text).await,
                    Err(e) => {
                        warn!("Failed to fetch checksum: {e:#}");
                        false
                    }
                };
                if !matches {
                    return Err(AsanaError::ChecksumVerificationFailed {
                        asset: plan.binary.name.clone(),
                    }
                    .into());
                }
                self.emit(UpdateEvent::ChecksumVerified);
                true
            }
            None => {
                warn!("No checksum published for {}, skipping verification", plan.binary.name);
                self.emit(UpdateEvent::ChecksumSkipped);
                false
            }
        };

        let mut replacement = BinaryReplacement::new(self.live_path.clone());
        let reported = replacement.install(&staged, &self.smoke, self.on_event.as_ref()).await?;
        info!("Updated {:?} to {tag}", self.live_path);

        Ok((reported, verified))
    }
}
