//! Error types for devfetch operations.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Pipeline step in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Turning a version constraint into a concrete version.
    Resolve,
    /// Downloading the artifact.
    Fetch,
    /// Checking artifact integrity.
    Verify,
    /// Extracting and placing the artifact.
    Install,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve => write!(f, "resolve"),
            Self::Fetch => write!(f, "fetch"),
            Self::Verify => write!(f, "verify"),
            Self::Install => write!(f, "install"),
        }
    }
}

/// Coarse classification of an [`Error`], used by callers that need to
/// decide between retrying a whole install and aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Release index lookup failed with no fallback.
    VersionResolution,
    /// All download attempts failed.
    FetchExhausted,
    /// Downloaded artifact did not match its published checksum.
    ChecksumMismatch,
    /// Extraction or placement failed.
    Install,
    /// System package manager failed.
    PackageManager,
    /// Invalid manifest or arguments.
    Configuration,
    /// Filesystem error outside of a pipeline step.
    Io,
}

/// Main error type for devfetch operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The release index could not be queried or parsed.
    #[error("Version resolution failed for {index}: {message}")]
    #[diagnostic(
        code(devfetch::resolve),
        help("Unauthenticated release APIs are rate limited; set GITHUB_TOKEN or configure a fallback version")
    )]
    VersionResolution {
        /// Release index URL.
        index: String,
        /// What went wrong.
        message: String,
    },

    /// Every download attempt failed.
    #[error("Download of {url} failed after {attempts} attempt(s): {last_error}")]
    #[diagnostic(
        code(devfetch::fetch),
        help("Check network connectivity and that an artifact exists for this platform")
    )]
    FetchExhausted {
        /// Artifact URL.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last_error: String,
    },

    /// Artifact hash differs from the published checksum.
    #[error("Checksum mismatch for {artifact}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(devfetch::checksum),
        help("The artifact was discarded and nothing was installed; do not retry without investigating")
    )]
    ChecksumMismatch {
        /// Artifact file name.
        artifact: String,
        /// Hash published by the checksum source.
        expected: String,
        /// Hash computed from the download.
        actual: String,
    },

    /// Extraction or atomic placement failed.
    #[error("Install failed: {message}")]
    #[diagnostic(code(devfetch::install))]
    Install {
        /// What went wrong.
        message: String,
        /// Optional help text.
        #[help]
        help: Option<String>,
    },

    /// A system package manager invocation failed.
    #[error("Package manager error: {message}")]
    #[diagnostic(code(devfetch::package_manager))]
    PackageManager {
        /// What went wrong.
        message: String,
    },

    /// Invalid manifest, tool spec, or argument.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(devfetch::config))]
    Configuration {
        /// What went wrong.
        message: String,
        /// Optional help text.
        #[help]
        help: Option<String>,
    },

    /// Filesystem error.
    #[error("I/O {operation} failed{}: {source}", path.as_ref().map_or(String::new(), |p| format!(" on {}", p.display())))]
    #[diagnostic(
        code(devfetch::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available.
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "rename").
        operation: String,
    },

    /// A failure attributed to one tool and one pipeline step.
    #[error("{tool}: {step} step failed: {cause}")]
    #[diagnostic(code(devfetch::step))]
    Step {
        /// Tool name.
        tool: String,
        /// Step that failed.
        step: Step,
        /// The underlying failure.
        cause: Box<Error>,
    },
}

impl Error {
    /// Create a version resolution error.
    #[must_use]
    pub fn version_resolution(index: impl Into<String>, message: impl Into<String>) -> Self {
        Self::VersionResolution {
            index: index.into(),
            message: message.into(),
        }
    }

    /// Create a fetch exhausted error.
    #[must_use]
    pub fn fetch_exhausted(url: impl Into<String>, attempts: u32, last_error: impl Into<String>) -> Self {
        Self::FetchExhausted {
            url: url.into(),
            attempts,
            last_error: last_error.into(),
        }
    }

    /// Create a checksum mismatch error.
    #[must_use]
    pub fn checksum_mismatch(
        artifact: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ChecksumMismatch {
            artifact: artifact.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an install error.
    #[must_use]
    pub fn install(message: impl Into<String>) -> Self {
        Self::Install {
            message: message.into(),
            help: None,
        }
    }

    /// Create an install error with help text.
    #[must_use]
    pub fn install_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Install {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a package manager error.
    #[must_use]
    pub fn package_manager(message: impl Into<String>) -> Self {
        Self::PackageManager {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text.
    #[must_use]
    pub fn configuration_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an I/O error with path context.
    #[must_use]
    pub fn io(source: std::io::Error, path: impl AsRef<Path>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Attribute this error to a tool and pipeline step.
    ///
    /// Already-attributed errors are returned unchanged.
    #[must_use]
    pub fn at_step(self, tool: impl Into<String>, step: Step) -> Self {
        match self {
            Self::Step { .. } => self,
            other => Self::Step {
                tool: tool.into(),
                step,
                cause: Box::new(other),
            },
        }
    }

    /// Root classification of this error, looking through step attribution.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::VersionResolution { .. } => ErrorKind::VersionResolution,
            Self::FetchExhausted { .. } => ErrorKind::FetchExhausted,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::Install { .. } => ErrorKind::Install,
            Self::PackageManager { .. } => ErrorKind::PackageManager,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Io { .. } => ErrorKind::Io,
            Self::Step { cause, .. } => cause.kind(),
        }
    }

    /// The step this error was attributed to, if any.
    #[must_use]
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Step { step, .. } => Some(*step),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            path: None,
            operation: "filesystem".to_string(),
        }
    }
}

/// Result type alias for devfetch operations.
pub type Result<T> = std::result::Result<T, Error>;
