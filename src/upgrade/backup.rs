use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Manages the `.backup` sibling of the live executable during an update.
///
/// The backup is a byte-for-byte copy of the running binary placed next to it
/// (`/usr/local/bin/asana` → `/usr/local/bin/asana.backup`). Keeping it in the same
/// directory means restoring is a same-filesystem rename.
///
/// # Examples
///
/// ```rust,no_run
/// use asana_cli::upgrade::backup::BackupManager;
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// let backup_manager = BackupManager::new(PathBuf::from("/usr/local/bin/asana"));
///
/// backup_manager.create_backup().await?;
///
/// // ... replace and smoke test the new binary ...
///
/// let upgrade_failed = false;
/// if upgrade_failed {
///     backup_manager.restore_backup().await?;
/// } else {
///     backup_manager.cleanup_backup().await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct BackupManager {
    /// Path to the live binary.
    original_path: PathBuf,
    /// Path where the backup is stored.
    backup_path: PathBuf,
}

impl BackupManager {
    /// Create a manager for the given executable; the backup path is derived by
    /// appending `.backup` to the file name.
    pub fn new(executable_path: PathBuf) -> Self {
        let backup_path = sibling_with_suffix(&executable_path, "backup");

        Self {
            original_path: executable_path,
            backup_path,
        }
    }

    /// Copy the live binary to the backup location, preserving permissions.
    ///
    /// A stale backup from an earlier attempt is replaced.
    ///
    /// # Errors
    ///
    /// Fails if the live binary does not exist or the copy cannot be written.
    pub async fn create_backup(&self) -> Result<()> {
        if !self.original_path.exists() {
            bail!("Original file does not exist: {:?}", self.original_path);
        }

        if self.backup_path.exists() {
            debug!("Removing old backup at {:?}", self.backup_path);
            fs::remove_file(&self.backup_path).await.context("Failed to remove old backup")?;
        }

        info!("Creating backup at {:?}", self.backup_path);
        fs::copy(&self.original_path, &self.backup_path)
            .await
            .context("Failed to create backup")?;

        #[cfg(unix)]
        {
            let metadata = fs::metadata(&self.original_path)
                .await
                .context("Failed to read original file metadata")?;
            fs::set_permissions(&self.backup_path, metadata.permissions())
                .await
                .context("Failed to set backup permissions")?;
        }

        info!("Backup created successfully");
        Ok(())
    }

    /// Move the backup back over the live path.
    ///
    /// After a successful restore the backup file no longer exists and the live
    /// binary is byte-identical to what was backed up.
    ///
    /// # Errors
    ///
    /// Fails if no backup exists or neither a rename nor a copy can put it back.
    /// The backup file is left in place whenever this returns an error.
    pub async fn restore_backup(&self) -> Result<()> {
        if !self.backup_path.exists() {
            bail!("No backup found at {:?}", self.backup_path);
        }

        warn!("Restoring from backup at {:?}", self.backup_path);

        if let Err(e) = fs::rename(&self.backup_path, &self.original_path).await {
            debug!("Rename restore failed ({e}), falling back to copy");
            fs::copy(&self.backup_path, &self.original_path)
                .await
                .context("Failed to restore backup")?;

            #[cfg(unix)]
            {
                let metadata = fs::metadata(&self.backup_path)
                    .await
                    .context("Failed to read backup metadata")?;
                fs::set_permissions(&self.original_path, metadata.permissions())
                    .await
                    .context("Failed to restore permissions")?;
            }

            fs::remove_file(&self.backup_path)
                .await
                .context("Failed to remove backup after restore")?;
        }

        info!("Successfully restored from backup");
        Ok(())
    }

    /// Remove the backup after a successful update. Succeeds when there is no backup.
    pub async fn cleanup_backup(&self) -> Result<()> {
        if self.backup_path.exists() {
            debug!("Cleaning up backup at {:?}", self.backup_path);
            fs::remove_file(&self.backup_path).await.context("Failed to remove backup")?;
        }
        Ok(())
    }

    pub fn backup_exists(&self) -> bool {
        self.backup_path.exists()
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }
}

/// `<dir>/<name>.<suffix>` for the given file path.
pub(crate) fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut sibling = path.to_path_buf();
    sibling.set_file_name(format!(
        "{}.{suffix}",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));
    sibling
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_path_is_sibling() {
        let manager = BackupManager::new(PathBuf::from("/usr/local/bin/asana"));
        assert_eq!(manager.backup_path(), Path::new("/usr/local/bin/asana.backup"));
    }

    #[tokio::test]
    async fn test_backup_restore_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let binary = temp_dir.path().join("asana");
        let original = b"original binary content";
        tokio::fs::write(&binary, original).await.unwrap();

        let manager = BackupManager::new(binary.clone());
        assert!(!manager.backup_exists());

        manager.create_backup().await.unwrap();
        assert!(manager.backup_exists());

        tokio::fs::write(&binary, b"broken new binary").await.unwrap();
        manager.restore_backup().await.unwrap();

        assert_eq!(tokio::fs::read(&binary).await.unwrap(), original);
        assert!(!manager.backup_exists());
    }

    #[tokio::test]
    async fn test_create_backup_replaces_stale_backup() {
        let temp_dir = TempDir::new().unwrap();
        let binary = temp_dir.path().join("asana");
        tokio::fs::write(&binary, b"current").await.unwrap();

        let manager = BackupManager::new(binary);
        tokio::fs::write(manager.backup_path(), b"stale").await.unwrap();

        manager.create_backup().await.unwrap();
        assert_eq!(tokio::fs::read(manager.backup_path()).await.unwrap(), b"current");
    }

    #[tokio::test]
    async fn test_create_backup_requires_original() {
        let temp_dir = TempDir::new().unwrap();
        let manager = BackupManager::new(temp_dir.path().join("missing"));

        let err = manager.create_backup().await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_restore_without_backup_fails() {
        let temp_dir = TempDir::new().unwrap();
        let manager = BackupManager::new(temp_dir.path().join("asana"));

        assert!(manager.restore_backup().await.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let binary = temp_dir.path().join("asana");
        tokio::fs::write(&binary, b"bin").await.unwrap();

        let manager = BackupManager::new(binary);
        manager.create_backup().await.unwrap();
        manager.cleanup_backup().await.unwrap();
        assert!(!manager.backup_exists());
        manager.cleanup_backup().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_backup_preserves_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let binary = temp_dir.path().join("asana");
        tokio::fs::write(&binary, b"bin").await.unwrap();
        tokio::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o750)).await.unwrap();

        let manager = BackupManager::new(binary);
        manager.create_backup().await.unwrap();

        let mode = tokio::fs::metadata(manager.backup_path()).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }
}
