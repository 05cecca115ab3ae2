//! Tool specifications: what to install and from where.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use super::platform::ArchStyle;
use crate::Error;

/// Default JSON field holding the version in a release index response.
pub const DEFAULT_VERSION_FIELD: &str = "tag_name";

/// Default version prefix applied during normalization.
pub const DEFAULT_VERSION_PREFIX: &str = "v";

/// Default permission bits for installed binaries.
pub const DEFAULT_MODE: u32 = 0o755;

/// Whether `s` is a 64-character hexadecimal digest.
#[must_use]
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Which version of a tool to install.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VersionConstraint {
    /// Ask the release index for the newest version.
    #[default]
    Latest,
    /// Install exactly this version.
    Exact(String),
}

impl From<String> for VersionConstraint {
    fn from(s: String) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("latest") {
            Self::Latest
        } else {
            Self::Exact(trimmed.to_string())
        }
    }
}

impl From<&str> for VersionConstraint {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<VersionConstraint> for String {
    fn from(v: VersionConstraint) -> Self {
        match v {
            VersionConstraint::Latest => "latest".to_string(),
            VersionConstraint::Exact(s) => s,
        }
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Exact(s) => f.write_str(s),
        }
    }
}

/// Packaging of a downloaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArchiveKind {
    /// The download is the executable itself.
    #[default]
    #[serde(rename = "raw")]
    Raw,
    /// Gzip-compressed tarball.
    #[serde(rename = "tar.gz", alias = "tgz")]
    TarGz,
    /// Zip archive.
    #[serde(rename = "zip")]
    Zip,
}

impl ArchiveKind {
    /// Infer the archive kind from an artifact file name or URL.
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.ends_with(".zip") {
            Self::Zip
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else {
            Self::Raw
        }
    }
}

impl FromStr for ArchiveKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" | "binary" => Ok(Self::Raw),
            "tar.gz" | "tgz" | "targz" => Ok(Self::TarGz),
            "zip" => Ok(Self::Zip),
            other => Err(Error::configuration_with_help(
                format!("Unknown archive kind '{other}'"),
                "Expected one of: raw, tar.gz, zip",
            )),
        }
    }
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::TarGz => f.write_str("tar.gz"),
            Self::Zip => f.write_str("zip"),
        }
    }
}

/// Where the expected artifact hash comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumSource {
    /// URL template of a checksum document (same tokens as the artifact).
    Url(String),
    /// Expected SHA-256 digest, hex encoded.
    Sha256(String),
}

/// Identifies a tool to install.
///
/// Built once per invocation by the caller and never mutated by the
/// pipeline. Every option the pipeline honours is a field here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name, used for logs, cache paths and the default entry name.
    pub name: String,
    /// Version to install.
    pub version: VersionConstraint,
    /// Release index queried when `version` is `latest`.
    pub release_index: Option<String>,
    /// Literal version substituted when the release index cannot be read.
    pub fallback_version: Option<String>,
    /// JSON field holding the version in the index response.
    pub version_field: String,
    /// Prefix the normalized version must carry (empty for none).
    pub version_prefix: String,
    /// Artifact URL template.
    pub artifact: String,
    /// Optional checksum source.
    pub checksum: Option<ChecksumSource>,
    /// Packaging of the artifact.
    pub archive: ArchiveKind,
    /// File to take out of an archive. Defaults to the tool name.
    pub entry: Option<String>,
    /// Final location of the installed file.
    pub install_path: PathBuf,
    /// Permission bits for the installed file.
    pub mode: u32,
    /// Architecture naming used by `{arch}`.
    pub arch_style: ArchStyle,
}

impl ToolSpec {
    /// Create a spec for the latest version of a raw binary.
    ///
    /// The archive kind is inferred from the artifact template's extension.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        artifact: impl Into<String>,
        install_path: impl Into<PathBuf>,
    ) -> Self {
        let artifact = artifact.into();
        Self {
            name: name.into(),
            version: VersionConstraint::Latest,
            release_index: None,
            fallback_version: None,
            version_field: DEFAULT_VERSION_FIELD.to_string(),
            version_prefix: DEFAULT_VERSION_PREFIX.to_string(),
            archive: ArchiveKind::from_file_name(&artifact),
            artifact,
            checksum: None,
            entry: None,
            install_path: install_path.into(),
            mode: DEFAULT_MODE,
            arch_style: ArchStyle::default(),
        }
    }

    /// Set the version constraint.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<VersionConstraint>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the release index URL.
    #[must_use]
    pub fn with_release_index(mut self, url: impl Into<String>) -> Self {
        self.release_index = Some(url.into());
        self
    }

    /// Set the fallback version literal.
    #[must_use]
    pub fn with_fallback_version(mut self, version: impl Into<String>) -> Self {
        self.fallback_version = Some(version.into());
        self
    }

    /// Set the JSON version field.
    #[must_use]
    pub fn with_version_field(mut self, field: impl Into<String>) -> Self {
        self.version_field = field.into();
        self
    }

    /// Set the version prefix.
    #[must_use]
    pub fn with_version_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.version_prefix = prefix.into();
        self
    }

    /// Set the checksum source.
    #[must_use]
    pub fn with_checksum(mut self, checksum: ChecksumSource) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// Set the archive kind.
    #[must_use]
    pub fn with_archive(mut self, archive: ArchiveKind) -> Self {
        self.archive = archive;
        self
    }

    /// Set the archive entry name.
    #[must_use]
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    /// Set the permission bits.
    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Set the architecture naming style.
    #[must_use]
    pub fn with_arch_style(mut self, style: ArchStyle) -> Self {
        self.arch_style = style;
        self
    }

    /// Name of the file to locate inside an archive.
    #[must_use]
    pub fn entry_name(&self) -> &str {
        self.entry.as_deref().unwrap_or(&self.name)
    }

    /// Check that the spec is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a `latest` constraint has neither a
    /// release index nor a fallback, when required strings are empty, when
    /// the name is not a plain file name, or when a literal digest is not 64
    /// hex characters.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration("Tool name must not be empty"));
        }
        if self.name == "." || self.name.contains("..") || self.name.contains(['/', '\\', '\0']) {
            return Err(Error::configuration_with_help(
                format!("Tool name '{}' is not a valid file name", self.name),
                "The name becomes a cache directory and the default install file name",
            ));
        }
        if self.artifact.trim().is_empty() {
            return Err(Error::configuration(format!(
                "Tool '{}' has an empty artifact template",
                self.name
            )));
        }
        if self.version == VersionConstraint::Latest
            && self.release_index.is_none()
            && self.fallback_version.is_none()
        {
            return Err(Error::configuration_with_help(
                format!("Tool '{}' requests the latest version but has no release index", self.name),
                "Set release_index, pin an explicit version, or configure fallback_version",
            ));
        }
        if let Some(ChecksumSource::Sha256(hex)) = &self.checksum
            && !is_sha256_hex(hex)
        {
            return Err(Error::configuration_with_help(
                format!("Tool '{}' has an invalid sha256 digest '{hex}'", self.name),
                "Expected 64 hexadecimal characters",
            ));
        }
        Ok(())
    }
}
