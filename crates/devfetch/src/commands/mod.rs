//! Command implementations.
//!
//! Each command returns a [`CommandOutput`] carrying both the human-readable
//! text and the JSON payload; `main` picks one based on `--json`.

pub mod apt;
pub mod get;
pub mod install;
pub mod platform;
pub mod resolve;
pub mod version;

use crate::cli::{CliError, FetchArgs};
use devfetch_core::config::Settings;
use devfetch_core::paths;
use devfetch_tools_release::{InstallOptions, RetryPolicy};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Result of a successful command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Text printed to stdout in human mode.
    pub text: String,
    /// Payload wrapped in an `OkEnvelope` in JSON mode.
    pub data: Value,
}

impl CommandOutput {
    /// Create output from text and a JSON payload.
    #[must_use]
    pub fn new(text: impl Into<String>, data: Value) -> Self {
        Self {
            text: text.into(),
            data,
        }
    }
}

/// Build install options from manifest settings, with CLI flags taking
/// precedence.
pub(crate) fn install_options(
    settings: &Settings,
    fetch: &FetchArgs,
    token: Option<String>,
) -> Result<InstallOptions, CliError> {
    let cache_dir = match fetch.cache_dir.clone().or_else(|| settings.cache_dir.clone()) {
        Some(dir) => dir,
        None => paths::default_cache_dir()?,
    };

    let defaults = RetryPolicy::default();
    let max_attempts = fetch
        .max_attempts
        .or(settings.max_attempts)
        .unwrap_or(defaults.max_attempts);
    let initial_delay = fetch
        .initial_delay_ms
        .or(settings.initial_delay_ms)
        .map_or(defaults.initial_delay, Duration::from_millis);

    Ok(InstallOptions::new(cache_dir)
        .with_retry(RetryPolicy::new(max_attempts, initial_delay))
        .with_allow_sudo(fetch.allow_sudo || settings.allow_sudo)
        .with_token(token))
}

/// Install directory from the flag, the manifest, or the conventional default.
pub(crate) fn bin_dir(flag: Option<PathBuf>, settings: &Settings) -> Result<PathBuf, CliError> {
    match flag.or_else(|| settings.bin_dir.clone()) {
        Some(dir) => Ok(dir),
        None => Ok(paths::default_bin_dir()?),
    }
}
