//! Values produced while installing a tool.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How a version was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSource {
    /// Pinned in the tool spec.
    Explicit,
    /// Read from the release index.
    Index,
    /// The index lookup failed and the configured fallback was used.
    Fallback,
}

/// Apply a tag prefix convention to a version string.
///
/// `normalize_version("1.2.3", "v")` and `normalize_version("v1.2.3", "v")`
/// both give `v1.2.3`.
#[must_use]
pub fn normalize_version(raw: &str, prefix: &str) -> String {
    let trimmed = raw.trim();
    if prefix.is_empty() || trimmed.starts_with(prefix) {
        trimmed.to_string()
    } else {
        format!("{prefix}{trimmed}")
    }
}

/// Output of version resolution. Computed once per install attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    /// Version string as returned by the index (or as configured).
    pub raw: String,
    /// Version with the prefix convention applied.
    pub normalized: String,
    /// Prefix that was applied during normalization.
    pub prefix: String,
    /// Where the version came from.
    pub source: VersionSource,
}

impl ResolvedVersion {
    /// Normalize a raw version string.
    ///
    /// Surrounding whitespace is trimmed. A non-empty `prefix` is prepended
    /// when missing and never doubled.
    #[must_use]
    pub fn normalize(raw: &str, prefix: &str, source: VersionSource) -> Self {
        Self {
            raw: raw.to_string(),
            normalized: normalize_version(raw, prefix),
            prefix: prefix.to_string(),
            source,
        }
    }

    /// Version without its prefix, e.g. `1.2.3` for `v1.2.3`.
    #[must_use]
    pub fn bare(&self) -> &str {
        let stripped = if self.prefix.is_empty() {
            self.normalized.as_str()
        } else {
            self.normalized
                .strip_prefix(self.prefix.as_str())
                .unwrap_or(&self.normalized)
        };
        // A leading `v` before a digit is a tag convention, not part of the version
        match stripped.strip_prefix(['v', 'V']) {
            Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
            _ => stripped,
        }
    }

    /// Whether the configured fallback literal was used.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == VersionSource::Fallback
    }
}

impl std::fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.normalized)
    }
}

/// Result of a single download attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The body was fully written.
    Success,
    /// Connection, timeout, or body read failure.
    NetworkError {
        /// Error reported by the HTTP client.
        message: String,
    },
    /// The server answered with a non-success status.
    HttpError {
        /// Response status code.
        status: u16,
    },
}

impl AttemptOutcome {
    /// Whether the attempt succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::NetworkError { message } => write!(f, "network error: {message}"),
            Self::HttpError { status } => write!(f, "HTTP {status}"),
        }
    }
}

/// Ephemeral record of one download try.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    /// What happened.
    pub outcome: AttemptOutcome,
    /// Time spent on the request itself.
    pub elapsed: Duration,
    /// Backoff slept before the next attempt, if one followed.
    pub delay_before_next: Option<Duration>,
}

/// All attempts made for one download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchReport {
    /// Attempts in order.
    pub attempts: Vec<FetchAttempt>,
}

impl FetchReport {
    /// Total backoff slept between attempts.
    #[must_use]
    pub fn total_backoff(&self) -> Duration {
        self.attempts
            .iter()
            .filter_map(|a| a.delay_before_next)
            .sum()
    }

    /// Number of attempts made.
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX)
    }
}

/// Result of checksum verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChecksumOutcome {
    /// No checksum source configured.
    Skipped,
    /// A source was configured but could not be read.
    Unavailable { reason: String },
    /// The artifact matched.
    Verified { sha256: String },
}

impl ChecksumOutcome {
    /// Only an actual match counts as verified.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

/// End state of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledArtifact {
    /// Tool name.
    pub name: String,
    /// Installed file.
    pub path: PathBuf,
    /// Permission bits applied.
    pub mode: u32,
    /// Whether the checksum was verified (never true when skipped).
    pub verified: bool,
    /// Version that was installed.
    pub version: ResolvedVersion,
    /// Detailed verification outcome.
    pub checksum: ChecksumOutcome,
    /// SHA-256 of the installed file.
    pub sha256: String,
}
