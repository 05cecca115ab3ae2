//! Manifest configuration (`devfetch.toml`).
//!
//! A manifest lists the tools to install plus shared settings:
//!
//! ```toml
//! [settings]
//! bin_dir = "/usr/local/bin"
//! max_attempts = 5
//! initial_delay_ms = 3000
//!
//! [[tool]]
//! name = "bazelisk"
//! release_index = "https://api.github.com/repos/bazelbuild/bazelisk/releases/latest"
//! fallback_version = "v1.20.0"
//! artifact = "https://github.com/bazelbuild/bazelisk/releases/download/{tag}/bazelisk-{os}-{arch}"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::tools::{
    ArchStyle, ArchiveKind, ChecksumSource, DEFAULT_MODE, DEFAULT_VERSION_FIELD,
    DEFAULT_VERSION_PREFIX, ToolSpec, VersionConstraint,
};
use crate::{Error, Result};

/// Default manifest file name.
pub const MANIFEST_NAME: &str = "devfetch.toml";

/// Parsed manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Shared settings.
    #[serde(default)]
    pub settings: Settings,
    /// Tool entries, in file order.
    #[serde(default, rename = "tool")]
    pub tools: Vec<ToolEntry>,
}

/// Settings shared by every tool in a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Directory tools install into when they have no `install_path`.
    pub bin_dir: Option<PathBuf>,
    /// Download staging and cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Download attempts per artifact.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry, doubled for each following retry.
    pub initial_delay_ms: Option<u64>,
    /// Allow `sudo` for the final move when the destination is not writable.
    #[serde(default)]
    pub allow_sudo: bool,
}

/// One `[[tool]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolEntry {
    /// Tool name; also the default entry and install file name.
    pub name: String,
    /// `latest` (the default) or an exact version.
    #[serde(default)]
    pub version: VersionConstraint,
    /// Release index URL queried for `latest`.
    pub release_index: Option<String>,
    /// Version used when the release index cannot be read.
    pub fallback_version: Option<String>,
    /// JSON field holding the version. Defaults to `tag_name`.
    pub version_field: Option<String>,
    /// Prefix of the normalized version. Defaults to `v`.
    pub version_prefix: Option<String>,
    /// Artifact URL template.
    pub artifact: String,
    /// Checksum document URL template.
    pub checksum_url: Option<String>,
    /// Expected SHA-256 of the artifact, hex encoded.
    pub sha256: Option<String>,
    /// Packaging, inferred from the artifact extension when unset.
    pub archive: Option<ArchiveKind>,
    /// Path of the executable inside an archive.
    pub entry: Option<String>,
    /// Install location, overriding `bin_dir/<name>`.
    pub install_path: Option<PathBuf>,
    /// Permission bits of the installed file.
    pub mode: Option<u32>,
    /// `{arch}` naming style.
    #[serde(default)]
    pub arch_style: ArchStyle,
}

impl ToolEntry {
    /// Build a validated [`ToolSpec`], installing into `bin_dir` unless the
    /// entry names its own `install_path`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if both checksum forms are given or the
    /// resulting spec is inconsistent.
    pub fn to_spec(&self, bin_dir: &Path) -> Result<ToolSpec> {
        let checksum = match (&self.checksum_url, &self.sha256) {
            (Some(_), Some(_)) => {
                return Err(Error::configuration_with_help(
                    format!("Tool '{}' sets both checksum_url and sha256", self.name),
                    "Keep only one checksum source",
                ));
            }
            (Some(url), None) => Some(ChecksumSource::Url(url.clone())),
            (None, Some(hex)) => Some(ChecksumSource::Sha256(hex.trim().to_lowercase())),
            (None, None) => None,
        };

        let spec = ToolSpec {
            name: self.name.clone(),
            version: self.version.clone(),
            release_index: self.release_index.clone(),
            fallback_version: self.fallback_version.clone(),
            version_field: self
                .version_field
                .clone()
                .unwrap_or_else(|| DEFAULT_VERSION_FIELD.to_string()),
            version_prefix: self
                .version_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_VERSION_PREFIX.to_string()),
            artifact: self.artifact.clone(),
            checksum,
            archive: self
                .archive
                .unwrap_or_else(|| ArchiveKind::from_file_name(&self.artifact)),
            entry: self.entry.clone(),
            install_path: self
                .install_path
                .clone()
                .unwrap_or_else(|| bin_dir.join(&self.name)),
            mode: self.mode.unwrap_or(DEFAULT_MODE),
            arch_style: self.arch_style,
        };

        spec.validate()?;
        Ok(spec)
    }
}

impl Manifest {
    /// Parse manifest content.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the TOML problem.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            Error::configuration_with_help(
                format!("Invalid manifest: {e}"),
                format!("See the example at the top of {MANIFEST_NAME} documentation"),
            )
        })
    }

    /// Load a manifest from disk.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a configuration
    /// error if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        Self::parse(&content)
    }

    /// Find a manifest in `start` or any of its ancestors.
    #[must_use]
    pub fn find(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(MANIFEST_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Build specs for every tool, or for the named subset in `only`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on duplicate tool names, unknown names in
    /// `only`, or an invalid entry.
    pub fn tool_specs(&self, bin_dir: &Path, only: &[String]) -> Result<Vec<ToolSpec>> {
        let mut seen = HashSet::new();
        for entry in &self.tools {
            if !seen.insert(entry.name.as_str()) {
                return Err(Error::configuration(format!(
                    "Tool '{}' is declared more than once",
                    entry.name
                )));
            }
        }

        if let Some(unknown) = only.iter().find(|name| !seen.contains(name.as_str())) {
            let mut available: Vec<_> = seen.into_iter().collect();
            available.sort_unstable();
            return Err(Error::configuration_with_help(
                format!("Tool '{unknown}' is not in the manifest"),
                format!("Available tools: {}", available.join(", ")),
            ));
        }

        self.tools
            .iter()
            .filter(|entry| only.is_empty() || only.contains(&entry.name))
            .map(|entry| entry.to_spec(bin_dir))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[settings]
max_attempts = 5
initial_delay_ms = 3000
allow_sudo = true

[[tool]]
name = "bazelisk"
release_index = "https://api.github.com/repos/bazelbuild/bazelisk/releases/latest"
fallback_version = "v1.20.0"
artifact = "https://github.com/bazelbuild/bazelisk/releases/download/{tag}/bazelisk-{os}-{arch}"

[[tool]]
name = "helm"
version = "3.14.0"
artifact = "https://get.helm.sh/helm-v{version}-{os}-{arch}.tar.gz"
checksum_url = "https://get.helm.sh/helm-v{version}-{os}-{arch}.tar.gz.sha256sum"
entry = "helm"
install_path = "/opt/tools/helm"
mode = 0o750
"#;

    #[test]
    fn test_parse_sample() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.settings.max_attempts, Some(5));
        assert_eq!(manifest.settings.initial_delay_ms, Some(3000));
        assert!(manifest.settings.allow_sudo);
        assert_eq!(manifest.tools.len(), 2);
        assert_eq!(manifest.tools[0].version, VersionConstraint::Latest);
    }

    #[test]
    fn test_tool_specs_defaults() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let specs = manifest.tool_specs(Path::new("/usr/local/bin"), &[]).unwrap();

        let bazel = &specs[0];
        assert_eq!(bazel.install_path, PathBuf::from("/usr/local/bin/bazelisk"));
        assert_eq!(bazel.archive, ArchiveKind::Raw);
        assert_eq!(bazel.mode, 0o755);
        assert!(bazel.checksum.is_none());

        let helm = &specs[1];
        assert_eq!(helm.install_path, PathBuf::from("/opt/tools/helm"));
        assert_eq!(helm.archive, ArchiveKind::TarGz);
        assert_eq!(helm.mode, 0o750);
        assert_eq!(helm.version, VersionConstraint::Exact("3.14.0".into()));
        assert!(matches!(helm.checksum, Some(ChecksumSource::Url(_))));
    }

    #[test]
    fn test_tool_specs_subset() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let specs = manifest
            .tool_specs(Path::new("/bin"), &["helm".to_string()])
            .unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "helm");

        let err = manifest
            .tool_specs(Path::new("/bin"), &["kubectl".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("kubectl"));
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let content = r#"
[[tool]]
name = "jq"
version = "1.7.1"
artifact = "https://x/jq"

[[tool]]
name = "jq"
version = "1.7.0"
artifact = "https://x/jq"
"#;
        let manifest = Manifest::parse(content).unwrap();
        assert!(manifest.tool_specs(Path::new("/bin"), &[]).is_err());
    }

    #[test]
    fn test_both_checksums_rejected() {
        let content = r#"
[[tool]]
name = "jq"
version = "1.7.1"
artifact = "https://x/jq"
checksum_url = "https://x/jq.sha256"
sha256 = "abc"
"#;
        let manifest = Manifest::parse(content).unwrap();
        let err = manifest.tool_specs(Path::new("/bin"), &[]).unwrap_err();
        assert!(err.to_string().contains("both checksum_url and sha256"));
    }

    #[test]
    fn test_sha256_normalized() {
        let content = r#"
[[tool]]
name = "jq"
version = "1.7.1"
artifact = "https://x/jq"
sha256 = "  0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF  "
"#;
        let manifest = Manifest::parse(content).unwrap();
        let specs = manifest.tool_specs(Path::new("/bin"), &[]).unwrap();
        assert_eq!(
            specs[0].checksum,
            Some(ChecksumSource::Sha256("0123456789abcdef".repeat(4)))
        );
    }

    #[test]
    fn test_traversing_name_rejected() {
        let content = r#"
[[tool]]
name = "../../etc/cron.d/job"
version = "1.0.0"
artifact = "https://x/job"
"#;
        let manifest = Manifest::parse(content).unwrap();
        let err = manifest.tool_specs(Path::new("/bin"), &[]).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_truncated_sha256_rejected() {
        let content = r#"
[[tool]]
name = "jq"
version = "1.7.1"
artifact = "https://x/jq"
sha256 = "abc"
"#;
        let manifest = Manifest::parse(content).unwrap();
        let err = manifest.tool_specs(Path::new("/bin"), &[]).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("invalid sha256"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let content = r#"
[[tool]]
name = "jq"
artifact = "https://x/jq"
checksum = "oops"
"#;
        assert!(Manifest::parse(content).is_err());
    }

    #[test]
    fn test_latest_without_index_rejected() {
        let content = r#"
[[tool]]
name = "jq"
artifact = "https://x/jq"
"#;
        let manifest = Manifest::parse(content).unwrap();
        assert!(manifest.tool_specs(Path::new("/bin"), &[]).is_err());
    }

    #[test]
    fn test_load_and_find() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join(MANIFEST_NAME), SAMPLE).unwrap();

        let found = Manifest::find(&nested).unwrap();
        assert_eq!(found, temp.path().join(MANIFEST_NAME));

        let manifest = Manifest::load(&found).unwrap();
        assert_eq!(manifest.tools.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = Manifest::load(&temp.path().join("nope.toml")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }
}
