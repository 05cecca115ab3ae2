//! `devfetch get`: install one tool described by flags.

use crate::cli::{CliError, GetArgs};
use crate::commands::install::summary_line;
use crate::commands::{CommandOutput, bin_dir, install_options};
use devfetch_core::config::Settings;
use devfetch_core::tools::{ArchStyle, ChecksumSource, ToolSpec};
use devfetch_tools_release::ToolInstaller;

/// Build the spec described by `args`.
///
/// # Errors
///
/// Returns a configuration error if the spec is inconsistent, for example
/// `latest` without an index or fallback.
pub fn spec_from_args(args: &GetArgs) -> Result<ToolSpec, CliError> {
    let install_path = match &args.dest {
        Some(dest) => dest.clone(),
        None => bin_dir(None, &Settings::default())?.join(&args.name),
    };

    let mut spec = ToolSpec::new(&args.name, &args.artifact, install_path)
        .with_version(args.version.as_str());
    if let Some(index) = &args.index {
        spec = spec.with_release_index(index);
    }
    if let Some(fallback) = &args.fallback_version {
        spec = spec.with_fallback_version(fallback);
    }
    if let Some(field) = &args.version_field {
        spec = spec.with_version_field(field);
    }
    if let Some(prefix) = &args.prefix {
        spec = spec.with_version_prefix(prefix);
    }
    if let Some(url) = &args.checksum_url {
        spec = spec.with_checksum(ChecksumSource::Url(url.clone()));
    }
    if let Some(hex) = &args.sha256 {
        spec = spec.with_checksum(ChecksumSource::Sha256(hex.trim().to_lowercase()));
    }
    if let Some(kind) = args.archive {
        spec = spec.with_archive(kind);
    }
    if let Some(entry) = &args.entry {
        spec = spec.with_entry(entry);
    }
    if let Some(mode) = args.mode {
        spec = spec.with_mode(mode);
    }
    if args.gnu_arch {
        spec = spec.with_arch_style(ArchStyle::Gnu);
    }

    spec.validate()?;
    Ok(spec)
}

/// Resolve, download, verify and install a single tool.
///
/// # Errors
///
/// Returns the error of the failing step, mapped to its exit code.
pub async fn execute_get(args: &GetArgs, token: Option<String>) -> Result<CommandOutput, CliError> {
    let spec = spec_from_args(args)?;
    let options = install_options(&Settings::default(), &args.fetch, token)?;
    let installer = ToolInstaller::new(options)?;

    let artifact = installer.install(&spec).await?;
    let data = serde_json::to_value(&artifact)
        .map_err(|e| CliError::install(format!("Failed to serialize result: {e}")))?;
    Ok(CommandOutput::new(summary_line(&artifact), data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use devfetch_core::tools::{ArchiveKind, VersionConstraint};
    use std::path::PathBuf;

    fn get_args(extra: &[&str]) -> GetArgs {
        let mut argv = vec!["devfetch", "get", "jq", "--artifact", "https://example.com/jq.tar.gz"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Some(Commands::Get(args)) => *args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_spec_from_flags() {
        let digest = format!("  {}  ", "AB".repeat(32));
        let args = get_args(&[
            "--version",
            "1.7.1",
            "--sha256",
            &digest,
            "--dest",
            "/opt/bin/jq",
            "--entry",
            "bin/jq",
            "--gnu-arch",
        ]);
        let spec = spec_from_args(&args).unwrap();
        assert_eq!(spec.version, VersionConstraint::Exact("1.7.1".to_string()));
        assert_eq!(spec.checksum, Some(ChecksumSource::Sha256("ab".repeat(32))));
        assert_eq!(spec.install_path, PathBuf::from("/opt/bin/jq"));
        assert_eq!(spec.archive, ArchiveKind::TarGz);
        assert_eq!(spec.entry_name(), "bin/jq");
        assert_eq!(spec.arch_style, ArchStyle::Gnu);
    }

    #[test]
    fn test_archive_flag_overrides_extension() {
        let args = get_args(&["--version", "1.0", "--archive", "raw", "--dest", "/tmp/jq"]);
        assert_eq!(spec_from_args(&args).unwrap().archive, ArchiveKind::Raw);
    }

    #[test]
    fn test_short_digest_is_config_error() {
        let args = get_args(&["--version", "1.0", "--sha256", "abc", "--dest", "/tmp/jq"]);
        let err = spec_from_args(&args).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
        assert!(err.to_string().contains("invalid sha256"));
    }

    #[test]
    fn test_latest_without_index_is_config_error() {
        let args = get_args(&["--dest", "/tmp/jq"]);
        let err = spec_from_args(&args).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }
}
