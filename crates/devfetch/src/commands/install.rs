//! `devfetch install`: install the tools listed in a manifest.

use crate::cli::{CliError, FetchArgs};
use crate::commands::{CommandOutput, bin_dir, install_options};
use devfetch_core::config::{MANIFEST_NAME, Manifest};
use devfetch_core::tools::InstalledArtifact;
use devfetch_tools_release::{ToolInstaller, install_all};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Install every tool in the manifest, or the named subset.
///
/// Tools install concurrently; one failure does not cancel the others. The
/// command fails with the first failure's exit code after all have finished.
///
/// # Errors
///
/// Returns a configuration error if no manifest is found or it is invalid,
/// otherwise the error of the first tool that failed.
pub async fn execute_install(
    manifest: Option<PathBuf>,
    tools: &[String],
    bin_dir_flag: Option<PathBuf>,
    fetch: &FetchArgs,
    token: Option<String>,
) -> Result<CommandOutput, CliError> {
    let manifest_path = match manifest {
        Some(path) => path,
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| CliError::config(format!("Failed to read current directory: {e}")))?;
            Manifest::find(&cwd).ok_or_else(|| {
                CliError::config_with_help(
                    format!("No {MANIFEST_NAME} found"),
                    "Create one in this directory or pass --manifest",
                )
            })?
        }
    };
    if !manifest_path.is_file() {
        return Err(CliError::config(format!(
            "Manifest not found: {}",
            manifest_path.display()
        )));
    }
    tracing::debug!(manifest = %manifest_path.display(), "Loading manifest");

    let manifest = Manifest::load(&manifest_path)?;
    let bin_dir = bin_dir(bin_dir_flag, &manifest.settings)?;
    let specs = manifest.tool_specs(&bin_dir, tools)?;
    if specs.is_empty() {
        return Ok(CommandOutput::new(
            "No tools to install",
            serde_json::json!({ "installed": [], "failed": [] }),
        ));
    }

    let options = install_options(&manifest.settings, fetch, token)?;
    let installer = ToolInstaller::new(options)?;
    let report = install_all(&installer, &specs).await;

    let installed: Vec<&InstalledArtifact> = report.installed().collect();
    let failed: Vec<_> = report
        .failures()
        .map(|(name, err)| serde_json::json!({ "name": name, "error": err.to_string() }))
        .collect();

    if let Some(err) = report.first_error() {
        for (name, err) in report.failures() {
            tracing::error!(tool = name, error = %err, "Install failed");
        }
        let message = format!(
            "{} of {} tool(s) failed; first failure: {err}",
            failed.len(),
            specs.len()
        );
        return Err(CliError::from_core(err).with_message(message));
    }

    let mut text = String::new();
    for artifact in &installed {
        let _ = writeln!(text, "{}", summary_line(artifact));
    }

    Ok(CommandOutput::new(
        text.trim_end().to_string(),
        serde_json::json!({ "installed": installed, "failed": failed }),
    ))
}

/// One-line description of an installed tool.
pub(crate) fn summary_line(artifact: &InstalledArtifact) -> String {
    let checksum = if artifact.verified {
        "verified"
    } else {
        "unverified"
    };
    let fallback = if artifact.version.is_fallback() {
        " (fallback)"
    } else {
        ""
    };
    format!(
        "{} {}{} -> {} [{checksum}]",
        artifact.name,
        artifact.version,
        fallback,
        artifact.path.display()
    )
}
