use anyhow::Result;
use asana_cli::core::AsanaError;
use asana_cli::test_utils::{StaticReleaseClient, StubSmokeTest};
use asana_cli::upgrade::{PlatformKey, SelfUpdater, UpdateMode, UpdateOutcome};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;

const OLD_BINARY: &[u8] = b"#!/bin/sh\necho asana 0.1.0\n";
const NEW_BINARY: &[u8] = b"#!/bin/sh\necho asana 0.2.0\n";

fn darwin_arm64() -> PlatformKey {
    PlatformKey::detect("darwin", "arm64").unwrap()
}

async fn installed_binary(dir: &TempDir) -> Result<PathBuf> {
    let path = dir.path().join("asana");
    fs::write(&path, OLD_BINARY).await?;
    Ok(path)
}

/// A scratch root for download directories, so tests can see what is left behind.
async fn scratch_root(dir: &TempDir) -> Result<PathBuf> {
    let root = dir.path().join("scratch");
    fs::create_dir(&root).await?;
    Ok(root)
}

async fn leftover_download_dirs(root: &Path) -> Result<Vec<String>> {
    let mut entries = fs::read_dir(root).await?;
    let mut leftovers = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("asana-update-") {
            leftovers.push(name);
        }
    }
    Ok(leftovers)
}

/// A newer release with a valid checksum replaces the binary and leaves no
/// backup or staging files behind.
#[tokio::test]
async fn test_update_installs_verified_release() -> Result<()> {
    let dir = TempDir::new()?;
    let live = installed_binary(&dir).await?;
    let client = StaticReleaseClient::new("v0.2.0")
        .with_asset("asana-darwin-arm64", NEW_BINARY)
        .with_checksum_for("asana-darwin-arm64")
        .with_asset("asana-linux-x64", b"wrong platform".to_vec());
    let smoke = StubSmokeTest::passing("asana 0.2.0");
    let scratch = scratch_root(&dir).await?;

    let outcome = SelfUpdater::for_path(&client, &smoke, live.clone())
        .with_current_version("0.1.0")
        .with_platform(darwin_arm64())
        .with_temp_root(scratch.clone())
        .run(UpdateMode::Install)
        .await?;

    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            previous: "0.1.0".to_string(),
            tag: "v0.2.0".to_string(),
            reported_version: "asana 0.2.0".to_string(),
            verified: true,
        }
    );
    assert_eq!(fs::read(&live).await?, NEW_BINARY);
    assert!(!dir.path().join("asana.backup").exists());
    assert!(!dir.path().join("asana.new").exists());
    assert!(leftover_download_dirs(&scratch).await?.is_empty());
    assert_eq!(smoke.runs(), 1);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&live).await?.permissions().mode();
        assert_eq!(mode & 0o755, 0o755);
    }

    Ok(())
}

/// Tags compare with or without a leading `v`.
#[tokio::test]
async fn test_same_version_is_up_to_date() -> Result<()> {
    let dir = TempDir::new()?;
    let live = installed_binary(&dir).await?;
    let client = StaticReleaseClient::new("v0.2.0").with_asset("asana-darwin-arm64", NEW_BINARY);
    let smoke = StubSmokeTest::passing("asana 0.2.0");

    let outcome = SelfUpdater::for_path(&client, &smoke, live.clone())
        .with_current_version("0.2.0")
        .with_platform(darwin_arm64())
        .run(UpdateMode::Install)
        .await?;

    assert_eq!(
        outcome,
        UpdateOutcome::UpToDate {
            current: "0.2.0".to_string()
        }
    );
    assert_eq!(client.download_count(), 0);
    assert_eq!(fs::read(&live).await?, OLD_BINARY);
    Ok(())
}

#[tokio::test]
async fn test_release_without_platform_asset_fails() -> Result<()> {
    let dir = TempDir::new()?;
    let live = installed_binary(&dir).await?;
    let client = StaticReleaseClient::new("v0.2.0").with_asset("asana-linux-x64", NEW_BINARY);
    let smoke = StubSmokeTest::passing("asana 0.2.0");

    let err = SelfUpdater::for_path(&client, &smoke, live.clone())
        .with_current_version("0.1.0")
        .with_platform(darwin_arm64())
        .run(UpdateMode::Install)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AsanaError>(),
        Some(AsanaError::NoBinaryForPlatform { .. })
    ));
    assert!(err.to_string().contains("darwin-arm64"));
    assert_eq!(client.download_count(), 0);
    assert_eq!(fs::read(&live).await?, OLD_BINARY);
    Ok(())
}

#[tokio::test]
async fn test_checksum_mismatch_leaves_binary_untouched() -> Result<()> {
    let dir = TempDir::new()?;
    let live = installed_binary(&dir).await?;
    let bogus = format!("{}  asana-darwin-arm64\n", "0".repeat(64));
    let client = StaticReleaseClient::new("v0.2.0")
        .with_asset("asana-darwin-arm64", NEW_BINARY)
        .with_checksum_text("asana-darwin-arm64", &bogus);
    let smoke = StubSmokeTest::passing("asana 0.2.0");
    let scratch = scratch_root(&dir).await?;

    let err = SelfUpdater::for_path(&client, &smoke, live.clone())
        .with_current_version("0.1.0")
        .with_platform(darwin_arm64())
        .with_temp_root(scratch.clone())
        .run(UpdateMode::Install)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AsanaError>(),
        Some(AsanaError::ChecksumVerificationFailed { .. })
    ));
    assert_eq!(fs::read(&live).await?, OLD_BINARY);
    assert!(!dir.path().join("asana.backup").exists());
    assert!(leftover_download_dirs(&scratch).await?.is_empty());
    assert_eq!(client.download_count(), 1);
    assert_eq!(smoke.runs(), 0);
    Ok(())
}

/// A new binary that fails its smoke test is rolled back byte for byte.
#[tokio::test]
async fn test_smoke_failure_restores_previous_binary() -> Result<()> {
    let dir = TempDir::new()?;
    let live = installed_binary(&dir).await?;
    let client = StaticReleaseClient::new("v0.2.0")
        .with_asset("asana-darwin-arm64", NEW_BINARY)
        .with_checksum_for("asana-darwin-arm64");
    let smoke = StubSmokeTest::failing("exited with status 1");
    let scratch = scratch_root(&dir).await?;

    let err = SelfUpdater::for_path(&client, &smoke, live.clone())
        .with_current_version("0.1.0")
        .with_platform(darwin_arm64())
        .with_temp_root(scratch.clone())
        .run(UpdateMode::Install)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AsanaError>(),
        Some(AsanaError::SmokeTestFailed { .. })
    ));
    assert_eq!(fs::read(&live).await?, OLD_BINARY);
    assert!(!dir.path().join("asana.backup").exists());
    assert!(!dir.path().join("asana.new").exists());
    assert!(leftover_download_dirs(&scratch).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_feed_reports_status() -> Result<()> {
    let dir = TempDir::new()?;
    let live = installed_binary(&dir).await?;
    let client = StaticReleaseClient::unreachable("503 Service Unavailable");
    let smoke = StubSmokeTest::passing("asana 0.2.0");

    let err = SelfUpdater::for_path(&client, &smoke, live.clone())
        .with_current_version("0.1.0")
        .with_platform(darwin_arm64())
        .run(UpdateMode::CheckOnly)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Failed to fetch releases: 503 Service Unavailable");
    assert_eq!(fs::read(&live).await?, OLD_BINARY);
    Ok(())
}
