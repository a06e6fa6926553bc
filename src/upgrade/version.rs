//! Lenient release version ordering.
//!
//! Release tags are compared as `(major, minor, patch)` triples. A leading `v` is
//! ignored, missing components count as zero, and components that are not plain
//! integers also count as zero. Anything after the third component is ignored, so
//! pre-release suffixes do not affect ordering.

use std::cmp::Ordering;
use std::fmt;

/// Three-part numeric version used to decide whether an update is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct VersionOrdinal {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl VersionOrdinal {
    /// Parse a version string. Never fails.
    ///
    /// ```rust
    /// use asana_cli::upgrade::VersionOrdinal;
    ///
    /// let v = VersionOrdinal::parse("v1.2");
    /// assert_eq!((v.major, v.minor, v.patch), (1, 2, 0));
    /// ```
    #[must_use]
    pub fn parse(version: &str) -> Self {
        let trimmed = version.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let mut parts = trimmed.split('.').map(|part| part.parse::<u64>().unwrap_or(0));

        Self {
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
        }
    }
}

impl fmt::Display for VersionOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Order two version strings by their [`VersionOrdinal`].
///
/// Returns [`Ordering::Less`] when `current` is older than `latest`.
#[must_use]
pub fn compare_versions(current: &str, latest: &str) -> Ordering {
    VersionOrdinal::parse(current).cmp(&VersionOrdinal::parse(latest))
}

/// Whether `latest` is strictly newer than `current`.
#[must_use]
pub fn is_newer(current: &str, latest: &str) -> bool {
    compare_versions(current, latest) == Ordering::Less
}
