//! Swapping a verified binary into place with rollback.
//!
//! ```text
//! START ─▶ DOWNLOAD_OK ─▶ BACKUP_TAKEN ─▶ REPLACED ─▶ SMOKE_TESTED ─▶ COMMITTED
//!                              │              │
//!                              └──────────────┴──▶ ROLLED_BACK
//! ```
//!
//! The live path is written only by a same-directory rename of a fully written
//! `<path>.new`, so it holds either the old binary or the complete new one. The
//! `<path>.backup` copy exists from BACKUP_TAKEN until commit or rollback.

use crate::core::AsanaError;
use crate::upgrade::backup::{BackupManager, sibling_with_suffix};
use crate::upgrade::self_updater::UpdateEvent;
use crate::upgrade::smoke_test::SmokeTester;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Progress through a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Start,
    DownloadOk,
    BackupTaken,
    Replaced,
    SmokeTested,
    Committed,
    RolledBack,
}

/// Replaces one executable path. Single use.
pub struct BinaryReplacement {
    live_path: PathBuf,
    staging_path: PathBuf,
    backup: BackupManager,
    had_previous: bool,
    state: TransactionState,
}

impl BinaryReplacement {
    pub fn new(live_path: PathBuf) -> Self {
        Self {
            staging_path: sibling_with_suffix(&live_path, "new"),
            backup: BackupManager::new(live_path.clone()),
            live_path,
            had_previous: false,
            state: TransactionState::Start,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn backup_path(&self) -> &Path {
        self.backup.backup_path()
    }

    /// Install `staged` (already downloaded and verified) over the live path.
    ///
    /// Returns the smoke test output of the new binary.
    ///
    /// # Errors
    ///
    /// - Backup failure aborts with the live path untouched.
    /// - Replacement or smoke test failure restores the previous binary and returns
    ///   [`AsanaError::ReplacementFailed`] or [`AsanaError::SmokeTestFailed`].
    /// - [`AsanaError::RollbackFailed`] when the restore itself fails; the backup is
    ///   left on disk.
    pub async fn install<S: SmokeTester>(
        &mut self,
        staged: &Path,
        smoke: &S,
        notify: &(dyn Fn(&UpdateEvent) + Send + Sync),
    ) -> Result<String> {
        self.state = TransactionState::DownloadOk;

        self.had_previous = self.live_path.exists();
        if self.had_previous {
            self.backup.create_backup().await.context("Failed to back up the current binary")?;
        }
        self.state = TransactionState::BackupTaken;

        notify(&UpdateEvent::Installing {
            path: self.live_path.clone(),
        });

        if let Err(e) = self.replace(staged).await {
            let failure = AsanaError::ReplacementFailed {
                path: self.live_path.display().to_string(),
                reason: format!("{e:#}"),
            };
            return Err(self.rollback(failure, notify).await.into());
        }
        self.state = TransactionState::Replaced;
        info!("Installed new binary at {:?}", self.live_path);

        let output = match smoke.check(&self.live_path).await {
            Ok(output) => output,
            Err(failure) => return Err(self.rollback(failure, notify).await.into()),
        };
        self.state = TransactionState::SmokeTested;

        if let Err(e) = self.backup.cleanup_backup().await {
            warn!("Failed to remove backup at {:?}: {e:#}", self.backup.backup_path());
        }
        self.state = TransactionState::Committed;
        Ok(output)
    }

    async fn replace(&self, staged: &Path) -> Result<()> {
        debug!("Staging {:?} at {:?}", staged, self.staging_path);
        fs::copy(staged, &self.staging_path)
            .await
            .with_context(|| format!("Failed to copy new binary to {:?}", self.staging_path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.staging_path, std::fs::Permissions::from_mode(0o755))
                .await
                .context("Failed to mark new binary executable")?;
        }

        if let Err(e) = fs::rename(&self.staging_path, &self.live_path).await {
            if let Err(cleanup) = fs::remove_file(&self.staging_path).await {
                debug!("Failed to remove {:?}: {cleanup}", self.staging_path);
            }
            return Err(e).with_context(|| format!("Failed to move new binary to {:?}", self.live_path));
        }
        Ok(())
    }

    /// Undo the replacement. Returns the error to surface: the original failure if
    /// the restore worked, otherwise [`AsanaError::RollbackFailed`].
    async fn rollback(
        &mut self,
        original: AsanaError,
        notify: &(dyn Fn(&UpdateEvent) + Send + Sync),
    ) -> AsanaError {
        warn!("Rolling back update: {original}");
        notify(&UpdateEvent::RollingBack {
            reason: original.to_string(),
        });

        let restored = if self.had_previous {
            self.backup.restore_backup().await
        } else {
            remove_if_present(&self.live_path).await
        };

        match restored {
            Ok(()) => {
                self.state = TransactionState::RolledBack;
                original
            }
            Err(e) => {
                error!("Rollback failed, backup kept at {:?}: {e:#}", self.backup.backup_path());
                AsanaError::RollbackFailed {
                    backup_path: self.backup.backup_path().display().to_string(),
                    original: original.to_string(),
                    reason: format!("{e:#}"),
                }
            }
        }
    }
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove unverified binary {path:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FixedSmoke(Result<String, AsanaError>);

    impl SmokeTester for FixedSmoke {
        async fn check(&self, _binary: &Path) -> Result<String, AsanaError> {
            self.0.clone()
        }
    }

    fn pass() -> FixedSmoke {
        FixedSmoke(Ok("asana 0.2.0".to_string()))
    }

    fn fail() -> FixedSmoke {
        FixedSmoke(Err(AsanaError::SmokeTestFailed {
            reason: "exit status: 1".to_string(),
        }))
    }

    fn ignore(_: &UpdateEvent) {}

    async fn setup(live: Option<&[u8]>) -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let live_path = dir.path().join("asana");
        if let Some(content) = live {
            fs::write(&live_path, content).await.unwrap();
        }
        let staged = dir.path().join("staged");
        fs::write(&staged, b"new binary").await.unwrap();
        (dir, live_path, staged)
    }

    #[tokio::test]
    async fn test_commit_replaces_and_removes_backup() {
        let (_dir, live, staged) = setup(Some(b"old binary")).await;
        let mut tx = BinaryReplacement::new(live.clone());

        let output = tx.install(&staged, &pass(), &ignore).await.unwrap();

        assert_eq!(output, "asana 0.2.0");
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(fs::read(&live).await.unwrap(), b"new binary");
        assert!(!tx.backup_path().exists());
        assert!(!live.with_file_name("asana.new").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_installed_binary_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, live, staged) = setup(Some(b"old binary")).await;
        let mut tx = BinaryReplacement::new(live.clone());
        tx.install(&staged, &pass(), &ignore).await.unwrap();

        let mode = fs::metadata(&live).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[tokio::test]
    async fn test_smoke_failure_restores_previous_binary() {
        let (_dir, live, staged) = setup(Some(b"old binary")).await;
        let mut tx = BinaryReplacement::new(live.clone());
        let events = Mutex::new(Vec::new());
        let record = |event: &UpdateEvent| events.lock().unwrap().push(event.clone());

        let err = tx.install(&staged, &fail(), &record).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AsanaError>(),
            Some(AsanaError::SmokeTestFailed { .. })
        ));
        assert_eq!(tx.state(), TransactionState::RolledBack);
        assert_eq!(fs::read(&live).await.unwrap(), b"old binary");
        assert!(!tx.backup_path().exists());
        assert!(
            events
                .lock()
                .unwrap()
                .iter()
                .any(|e| matches!(e, UpdateEvent::RollingBack { .. }))
        );
    }

    #[tokio::test]
    async fn test_rollback_without_previous_binary_removes_new_file() {
        let (_dir, live, staged) = setup(None).await;
        let mut tx = BinaryReplacement::new(live.clone());

        tx.install(&staged, &fail(), &ignore).await.unwrap_err();

        assert_eq!(tx.state(), TransactionState::RolledBack);
        assert!(!live.exists());
    }

    #[tokio::test]
    async fn test_missing_staged_file_rolls_back_as_replacement_failure() {
        let (dir, live, _staged) = setup(Some(b"old binary")).await;
        let mut tx = BinaryReplacement::new(live.clone());

        let err = tx.install(&dir.path().join("nope"), &pass(), &ignore).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AsanaError>(),
            Some(AsanaError::ReplacementFailed { .. })
        ));
        assert_eq!(fs::read(&live).await.unwrap(), b"old binary");
        assert!(!tx.backup_path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_restore_reports_backup_location() {
        let (_dir, live, staged) = setup(Some(b"old binary")).await;
        let mut tx = BinaryReplacement::new(live.clone());

        struct DeletesBackup(PathBuf);
        impl SmokeTester for DeletesBackup {
            async fn check(&self, _binary: &Path) -> Result<String, AsanaError> {
                let _ = std::fs::remove_file(&self.0);
                Err(AsanaError::SmokeTestFailed {
                    reason: "crashed".to_string(),
                })
            }
        }

        let smoke = DeletesBackup(tx.backup_path().to_path_buf());
        let err = tx.install(&staged, &smoke, &ignore).await.unwrap_err();

        match err.downcast_ref::<AsanaError>() {
            Some(AsanaError::RollbackFailed { backup_path, original, .. }) => {
                assert!(backup_path.ends_with("asana.backup"));
                assert!(original.contains("crashed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
