//! Platform detection for release asset selection.
//!
//! Release binaries are published as `<binary>-<os>-<arch>`, where the OS is one of
//! `darwin` or `linux` and the architecture is one of `x64` or `arm64`. This module maps
//! the names Rust reports for the running process onto that vocabulary.

use crate::core::AsanaError;
use std::fmt;
use std::path::Path;

/// Normalized operating system name used in asset names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOs {
    Darwin,
    Linux,
}

/// Normalized CPU architecture name used in asset names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseArch {
    X64,
    Arm64,
}

/// The `{os}-{arch}` key identifying which release asset fits this machine.
///
/// # Examples
///
/// ```rust
/// use asana_cli::upgrade::PlatformKey;
///
/// let key = PlatformKey::detect("macos", "aarch64").unwrap();
/// assert_eq!(key.to_string(), "darwin-arm64");
///
/// assert!(PlatformKey::detect("windows", "x86_64").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformKey {
    pub os: ReleaseOs,
    pub arch: ReleaseArch,
}

impl PlatformKey {
    /// Map an OS/architecture pair onto a platform key.
    ///
    /// Accepts both the Rust (`macos`, `x86_64`, `aarch64`) and Node-style (`darwin`,
    /// `x64`, `arm64`) spellings.
    ///
    /// # Errors
    ///
    /// Returns [`AsanaError::UnsupportedPlatform`] for any OS other than macOS or Linux,
    /// and [`AsanaError::UnsupportedArchitecture`] for any architecture other than
    /// x86-64 or ARM64. The OS is checked first.
    pub fn detect(os: &str, arch: &str) -> Result<Self, AsanaError> {
        let os = match os {
            "darwin" | "macos" => ReleaseOs::Darwin,
            "linux" => ReleaseOs::Linux,
            other => {
                return Err(AsanaError::UnsupportedPlatform {
                    os: other.to_string(),
                });
            }
        };

        let arch = match arch {
            "x64" | "x86_64" => ReleaseArch::X64,
            "arm64" | "aarch64" => ReleaseArch::Arm64,
            other => {
                return Err(AsanaError::UnsupportedArchitecture {
                    arch: other.to_string(),
                });
            }
        };

        Ok(Self {
            os,
            arch,
        })
    }

    /// Platform key of the running process.
    pub fn current() -> Result<Self, AsanaError> {
        Self::detect(std::env::consts::OS, std::env::consts::ARCH)
    }
}

impl fmt::Display for ReleaseOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Darwin => "darwin",
            Self::Linux => "linux",
        })
    }
}

impl fmt::Display for ReleaseArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::X64 => "x64",
            Self::Arm64 => "arm64",
        })
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// Whether the executable lives inside a Homebrew prefix.
///
/// Such installs must be updated through `brew` so the package manager's
/// bookkeeping stays consistent.
pub fn is_package_managed(exe_path: &Path) -> bool {
    let path = exe_path.to_string_lossy();
    path.contains("/Cellar/") || path.contains("/opt/homebrew/")
}
