//! Tool installation data model.
//!
//! - [`ToolSpec`] - What to install, created by the caller per invocation
//! - [`Platform`], [`Os`], [`Arch`] - Host identification and `{os}`/`{arch}` tokens
//! - [`ResolvedVersion`] - Output of version resolution
//! - [`FetchAttempt`], [`FetchReport`] - Per-attempt download records
//! - [`ChecksumOutcome`] - Verified, skipped, or unavailable
//! - [`InstalledArtifact`] - End state of a successful install

mod artifact;
mod platform;
mod spec;

pub use artifact::{
    AttemptOutcome, ChecksumOutcome, FetchAttempt, FetchReport, InstalledArtifact,
    ResolvedVersion, VersionSource, normalize_version,
};
pub use platform::{Arch, ArchStyle, Os, Platform};
pub use spec::{
    ArchiveKind, ChecksumSource, DEFAULT_MODE, DEFAULT_VERSION_FIELD, DEFAULT_VERSION_PREFIX,
    ToolSpec, VersionConstraint, is_sha256_hex,
};
