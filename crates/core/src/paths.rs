//! Conventional install and cache locations.
//!
//! | Platform | Bin Dir (root) | Bin Dir (user) | Cache Dir |
//! |----------|----------------|----------------|-----------|
//! | **Linux** | `/usr/local/bin` | `~/.local/bin` | `~/.cache/devfetch` (XDG_CACHE_HOME) |
//! | **macOS** | `/usr/local/bin` | `~/.local/bin` | `~/Library/Caches/devfetch` |
//!
//! Overrides come from the manifest or CLI flags, never from this module.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// System-wide binary directory used when running as root.
pub const SYSTEM_BIN_DIR: &str = "/usr/local/bin";

/// Whether the current process runs with root privileges.
#[must_use]
#[allow(unsafe_code)]
pub fn is_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Get the default binary install directory.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined for a
/// non-root user.
pub fn default_bin_dir() -> Result<PathBuf> {
    if is_root() {
        return Ok(PathBuf::from(SYSTEM_BIN_DIR));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| Error::configuration("Could not determine home directory"))?;

    Ok(home.join(".local").join("bin"))
}

/// Get the cache directory for devfetch.
///
/// # Errors
///
/// Returns an error if the cache directory cannot be determined.
pub fn default_cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir()
        .ok_or_else(|| Error::configuration("Could not determine cache directory"))?;

    Ok(base.join("devfetch"))
}

/// Staging directory for in-flight downloads of one tool.
#[must_use]
pub fn downloads_dir(cache_dir: &Path, tool: &str) -> PathBuf {
    cache_dir.join("downloads").join(tool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_dir_ends_with_devfetch() {
        if let Ok(dir) = default_cache_dir() {
            assert!(dir.ends_with("devfetch"));
        }
    }

    #[test]
    fn test_default_bin_dir() {
        if let Ok(dir) = default_bin_dir() {
            if is_root() {
                assert_eq!(dir, PathBuf::from(SYSTEM_BIN_DIR));
            } else {
                assert!(dir.ends_with(".local/bin"));
            }
        }
    }

    #[test]
    fn test_downloads_dir() {
        let dir = downloads_dir(Path::new("/cache/devfetch"), "helm");
        assert_eq!(dir, PathBuf::from("/cache/devfetch/downloads/helm"));
    }
}
