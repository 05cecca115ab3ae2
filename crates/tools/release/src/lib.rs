//! Release-feed tool installer for devfetch.
//!
//! Installs a tool described by a [`ToolSpec`](devfetch_core::tools::ToolSpec)
//! in four steps:
//!
//! 1. [`VersionResolver`] - turn `latest` into a concrete version (single bounded request)
//! 2. [`Fetcher`] - download with exponential backoff into a staged temp file
//! 3. [`ChecksumVerifier`] - verify, skip, or warn when the checksum source is unreachable
//! 4. [`place`] - extract if needed and atomically rename into the install path
//!
//! [`ToolInstaller`] composes the steps and [`install_all`] runs several
//! installs concurrently.
//!
//! # Example
//!
//! ```ignore
//! use devfetch_core::tools::ToolSpec;
//! use devfetch_tools_release::{InstallOptions, ToolInstaller};
//!
//! let spec = ToolSpec::new(
//!     "bazelisk",
//!     "https://github.com/bazelbuild/bazelisk/releases/download/{tag}/bazelisk-{os}-{arch}",
//!     "/usr/local/bin/bazelisk",
//! )
//! .with_release_index("https://api.github.com/repos/bazelbuild/bazelisk/releases/latest")
//! .with_fallback_version("v1.20.0");
//!
//! let installer = ToolInstaller::new(InstallOptions::new(cache_dir))?;
//! let installed = installer.install(&spec).await?;
//! ```

mod batch;
mod checksum;
mod extract;
mod fetch;
mod http;
mod install;
mod pipeline;
mod template;
mod version;

pub use batch::{BatchOutcome, BatchReport, install_all};
pub use checksum::{ChecksumVerifier, parse_checksum_document, sha256_file};
pub use extract::{extract_archive, extract_entry, locate_entry};
pub use fetch::{DEFAULT_DOWNLOAD_TIMEOUT, Downloaded, Fetcher, RetryPolicy};
pub use http::USER_AGENT;
pub use install::{PlaceOptions, place};
pub use pipeline::{InstallOptions, ToolInstaller};
pub use template::{artifact_file_name, expand_template};
pub use version::{INDEX_CONNECT_TIMEOUT, INDEX_TIMEOUT, VersionResolver, parse_version_document};
