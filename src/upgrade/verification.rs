use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

/// Verifies downloaded release binaries against published SHA-256 checksums.
///
/// A checksum asset is a small text file whose first whitespace-delimited token is
/// the hex digest of the binary, as produced by `sha256sum`:
///
/// ```text
/// 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08  asana-linux-x64
/// ```
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Compute the lowercase hex SHA-256 digest of a file.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use asana_cli::upgrade::verification::ChecksumVerifier;
    /// use std::path::Path;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let digest = ChecksumVerifier::compute_sha256(Path::new("/tmp/asana-linux-x64")).await?;
    /// println!("SHA256: {digest}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn compute_sha256(file_path: &Path) -> Result<String> {
        debug!("Computing SHA256 checksum for: {:?}", file_path);

        let contents = fs::read(file_path)
            .await
            .with_context(|| format!("Failed to read file: {file_path:?}"))?;

        let mut hasher = Sha256::new();
        hasher.update(&contents);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Extract the expected digest from checksum file content.
    ///
    /// Returns `None` when the content is blank.
    #[must_use]
    pub fn expected_digest(checksum_text: &str) -> Option<&str> {
        checksum_text.split_whitespace().next()
    }

    /// Check a file against checksum file content.
    ///
    /// Hex digests are compared case-insensitively. Any failure along the way
    /// (blank checksum text, unreadable file) counts as a mismatch, so this never
    /// errors.
    pub async fn matches(file_path: &Path, checksum_text: &str) -> bool {
        let Some(expected) = Self::expected_digest(checksum_text) else {
            warn!("Checksum file is empty");
            return false;
        };

        let actual = match Self::compute_sha256(file_path).await {
            Ok(actual) => actual,
            Err(e) => {
                warn!("Failed to hash {:?}: {e:#}", file_path);
                return false;
            }
        };

        if actual.eq_ignore_ascii_case(expected) {
            info!("Checksum verification successful");
            true
        } else {
            warn!("Checksum mismatch\n  Expected: {expected}\n  Actual:   {actual}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HELLO_DIGEST: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

    fn file_with(content: &[u8]) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content).unwrap();
        temp_file
    }

    #[tokio::test]
    async fn test_compute_sha256() {
        let temp_file = file_with(b"Hello, World!");

        let checksum = ChecksumVerifier::compute_sha256(temp_file.path()).await.unwrap();
        assert_eq!(checksum, HELLO_DIGEST);
    }

    #[test]
    fn test_expected_digest_takes_first_token() {
        assert_eq!(
            ChecksumVerifier::expected_digest("abc123  asana-linux-x64\n"),
            Some("abc123")
        );
        assert_eq!(ChecksumVerifier::expected_digest("  abc123\n"), Some("abc123"));
        assert_eq!(ChecksumVerifier::expected_digest("   \n"), None);
    }

    #[tokio::test]
    async fn test_matches_sha256sum_format() {
        let temp_file = file_with(b"Hello, World!");
        let text = format!("{HELLO_DIGEST}  asana-linux-x64\n");

        assert!(ChecksumVerifier::matches(temp_file.path(), &text).await);
    }

    #[tokio::test]
    async fn test_matches_case_insensitive() {
        let temp_file = file_with(b"Hello, World!");

        assert!(ChecksumVerifier::matches(temp_file.path(), &HELLO_DIGEST.to_uppercase()).await);
    }

    #[tokio::test]
    async fn test_single_byte_mutation_fails() {
        let temp_file = file_with(b"Hello, World?");

        assert!(!ChecksumVerifier::matches(temp_file.path(), HELLO_DIGEST).await);
    }

    #[tokio::test]
    async fn test_blank_checksum_fails() {
        let temp_file = file_with(b"Hello, World!");

        assert!(!ChecksumVerifier::matches(temp_file.path(), "").await);
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();

        assert!(!ChecksumVerifier::matches(&dir.path().join("missing"), HELLO_DIGEST).await);
    }
}
