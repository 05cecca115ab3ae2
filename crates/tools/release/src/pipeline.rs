//! Resolve, fetch, verify and install one tool.

use devfetch_core::paths::downloads_dir;
use devfetch_core::tools::{
    ArchiveKind, ChecksumSource, InstalledArtifact, Platform, ResolvedVersion, ToolSpec,
};
use devfetch_core::{Error, Result, Step};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::checksum::{ChecksumVerifier, sha256_file};
use crate::extract::extract_entry;
use crate::fetch::{DEFAULT_DOWNLOAD_TIMEOUT, Fetcher, RetryPolicy};
use crate::install::{PlaceOptions, place};
use crate::template::{artifact_file_name, expand_template};
use crate::version::VersionResolver;

/// Options shared by every install run by one [`ToolInstaller`].
///
/// Built by the caller from CLI flags and the manifest; nothing here reads the
/// environment.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Root of the download staging area.
    pub cache_dir: PathBuf,
    /// Download retry policy.
    pub retry: RetryPolicy,
    /// Allow `sudo -n` for the final move.
    pub allow_sudo: bool,
    /// Bearer token for release index requests.
    pub token: Option<String>,
    /// Platform used for `{os}` and `{arch}`.
    pub platform: Platform,
    /// Per-attempt download timeout.
    pub download_timeout: Duration,
}

impl InstallOptions {
    /// Options for the current platform with default retry behaviour.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            retry: RetryPolicy::default(),
            allow_sudo: false,
            token: None,
            platform: Platform::current(),
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    /// Set the download retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Allow `sudo` for the final move into an unwritable directory.
    #[must_use]
    pub fn with_allow_sudo(mut self, allow: bool) -> Self {
        self.allow_sudo = allow;
        self
    }

    /// Bearer token sent to release indexes only.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Target platform for `{os}` and `{arch}`. Defaults to the host.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Overall limit for a single download attempt.
    #[must_use]
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }
}

/// Installs tools described by [`ToolSpec`]s.
///
/// Holds no per-tool state, so one installer can serve concurrent installs.
pub struct ToolInstaller {
    options: InstallOptions,
    resolver: VersionResolver,
    fetcher: Fetcher,
    verifier: ChecksumVerifier,
}

impl ToolInstaller {
    /// Create an installer.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be created.
    pub fn new(options: InstallOptions) -> Result<Self> {
        Ok(Self {
            resolver: VersionResolver::new()?.with_token(options.token.clone()),
            fetcher: Fetcher::with_timeout(options.retry, options.download_timeout)?,
            verifier: ChecksumVerifier::new()?,
            options,
        })
    }

    /// Options this installer was built with.
    #[must_use]
    pub fn options(&self) -> &InstallOptions {
        &self.options
    }

    /// Resolve the version `spec` would install, without downloading.
    ///
    /// # Errors
    ///
    /// Returns a [`Step::Resolve`] error when resolution fails.
    pub async fn resolve(&self, spec: &ToolSpec) -> Result<ResolvedVersion> {
        self.resolver
            .resolve(spec)
            .await
            .map_err(|e| e.at_step(&spec.name, Step::Resolve))
    }

    /// Install one tool.
    ///
    /// Nothing is written to `install_path` unless the download completed
    /// and, when a reachable checksum source is configured, it matched.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid spec, otherwise an
    /// [`Error::Step`] naming the tool and the failing step.
    pub async fn install(&self, spec: &ToolSpec) -> Result<InstalledArtifact> {
        spec.validate()?;
        let name = spec.name.as_str();

        let version = self.resolve(spec).await?;

        let platform = &self.options.platform;
        let url = expand_template(&spec.artifact, name, &version, platform, spec.arch_style);
        let staging = downloads_dir(&self.options.cache_dir, name);
        debug!(tool = %name, %url, staging = %staging.display(), "Expanded artifact URL");

        let downloaded = self
            .fetcher
            .download(&url, &staging)
            .await
            .map_err(|e| e.at_step(name, Step::Fetch))?;

        let checksum_source = spec.checksum.as_ref().map(|source| match source {
            ChecksumSource::Url(template) => ChecksumSource::Url(expand_template(
                template,
                name,
                &version,
                platform,
                spec.arch_style,
            )),
            ChecksumSource::Sha256(hex) => ChecksumSource::Sha256(hex.clone()),
        });
        let checksum = self
            .verifier
            .verify(downloaded.path(), &artifact_file_name(&url), checksum_source.as_ref())
            .await
            .map_err(|e| e.at_step(name, Step::Verify))?;

        let place_options = PlaceOptions {
            mode: spec.mode,
            allow_sudo: self.options.allow_sudo,
        };
        let downloaded = downloaded.into_temp_path();
        place_artifact(spec, &downloaded, &staging, &place_options)
            .await
            .map_err(|e| e.at_step(name, Step::Install))?;

        let sha256 = sha256_file(&spec.install_path)
            .await
            .map_err(|e| e.at_step(name, Step::Install))?;

        let verified = checksum.is_verified();
        info!(
            tool = %name,
            version = %version,
            path = %spec.install_path.display(),
            verified,
            "Tool installed"
        );

        Ok(InstalledArtifact {
            name: spec.name.clone(),
            path: spec.install_path.clone(),
            mode: spec.mode,
            verified,
            version,
            checksum,
            sha256,
        })
    }
}

async fn place_artifact(
    spec: &ToolSpec,
    downloaded: &Path,
    staging: &Path,
    options: &PlaceOptions,
) -> Result<()> {
    if spec.archive == ArchiveKind::Raw {
        return place(downloaded, &spec.install_path, options).await;
    }

    let scratch = tempfile::Builder::new()
        .prefix(".devfetch-extract-")
        .tempdir_in(staging)
        .map_err(|e| Error::io(e, staging, "create extraction directory"))?;

    let archive = downloaded.to_path_buf();
    let kind = spec.archive;
    let entry = spec.entry_name().to_string();
    let root = scratch.path().to_path_buf();
    let candidate = tokio::task::spawn_blocking(move || extract_entry(&archive, kind, &entry, &root))
        .await
        .map_err(|e| Error::install(format!("Extraction task failed: {e}")))??;

    debug!(tool = %spec.name, entry = %candidate.display(), "Located archive entry");
    place(&candidate, &spec.install_path, options).await
}
