use clap::{Parser, Subcommand};
use devfetch_core::ErrorKind;
use devfetch_core::tools::ArchiveKind;
use miette::{Diagnostic, Report};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

use crate::tracing::{LogLevel, TracingFormat};

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Version resolution failed
pub const EXIT_RESOLVE: i32 = 3;
/// Every download attempt failed
pub const EXIT_FETCH: i32 = 4;
/// Checksum mismatch
pub const EXIT_CHECKSUM: i32 = 5;
/// Extraction, placement or other I/O failure
pub const EXIT_INSTALL: i32 = 6;
/// System package manager failure
pub const EXIT_PACKAGE_MANAGER: i32 = 7;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("{message}")]
    #[diagnostic(code(devfetch::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Version resolution error (exit code 3)
    #[error("{message}")]
    #[diagnostic(code(devfetch::cli::resolve))]
    Resolve {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Download error (exit code 4)
    #[error("{message}")]
    #[diagnostic(code(devfetch::cli::fetch))]
    Fetch {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Checksum mismatch (exit code 5)
    #[error("{message}")]
    #[diagnostic(code(devfetch::cli::checksum))]
    Checksum {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Install or I/O error (exit code 6)
    #[error("{message}")]
    #[diagnostic(code(devfetch::cli::install))]
    Install {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Package manager error (exit code 7)
    #[error("{message}")]
    #[diagnostic(code(devfetch::cli::package_manager))]
    PackageManager {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new install error
    #[must_use]
    pub fn install(message: impl Into<String>) -> Self {
        Self::Install {
            message: message.into(),
            help: None,
        }
    }

    /// Add help text to an existing error, returning a new error with the help text set.
    #[must_use]
    pub fn with_help(self, help_text: impl Into<String>) -> Self {
        let help = Some(help_text.into());
        match self {
            Self::Config { message, .. } => Self::Config { message, help },
            Self::Resolve { message, .. } => Self::Resolve { message, help },
            Self::Fetch { message, .. } => Self::Fetch { message, help },
            Self::Checksum { message, .. } => Self::Checksum { message, help },
            Self::Install { message, .. } => Self::Install { message, help },
            Self::PackageManager { message, .. } => Self::PackageManager { message, help },
        }
    }

    /// Replace the message, keeping the variant and help text.
    #[must_use]
    pub fn with_message(self, message: impl Into<String>) -> Self {
        let message = message.into();
        match self {
            Self::Config { help, .. } => Self::Config { message, help },
            Self::Resolve { help, .. } => Self::Resolve { message, help },
            Self::Fetch { help, .. } => Self::Fetch { message, help },
            Self::Checksum { help, .. } => Self::Checksum { message, help },
            Self::Install { help, .. } => Self::Install { message, help },
            Self::PackageManager { help, .. } => Self::PackageManager { message, help },
        }
    }

    /// Stable machine-readable code used in JSON error envelopes.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Resolve { .. } => "resolve",
            Self::Fetch { .. } => "fetch",
            Self::Checksum { .. } => "checksum",
            Self::Install { .. } => "install",
            Self::PackageManager { .. } => "package_manager",
        }
    }
}

/// Help text of the innermost error, looking through step attribution.
fn root_help(err: &devfetch_core::Error) -> Option<String> {
    match err {
        devfetch_core::Error::Step { cause, .. } => root_help(cause),
        other => other.help().map(|h| h.to_string()),
    }
}

impl CliError {
    /// Map a core error to the variant for its root kind.
    ///
    /// The message keeps the tool and step attribution; the help text comes
    /// from the underlying failure.
    #[must_use]
    pub fn from_core(err: &devfetch_core::Error) -> Self {
        let help = root_help(err);
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Configuration => Self::Config { message, help },
            ErrorKind::VersionResolution => Self::Resolve { message, help },
            ErrorKind::FetchExhausted => Self::Fetch { message, help },
            ErrorKind::ChecksumMismatch => Self::Checksum { message, help },
            ErrorKind::Install | ErrorKind::Io => Self::Install { message, help },
            ErrorKind::PackageManager => Self::PackageManager { message, help },
        }
    }
}

impl From<devfetch_core::Error> for CliError {
    fn from(err: devfetch_core::Error) -> Self {
        Self::from_core(&err)
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Resolve { .. } => EXIT_RESOLVE,
        CliError::Fetch { .. } => EXIT_FETCH,
        CliError::Checksum { .. } => EXIT_CHECKSUM,
        CliError::Install { .. } => EXIT_INSTALL,
        CliError::PackageManager { .. } => EXIT_PACKAGE_MANAGER,
    }
}

/// Render error appropriately based on JSON flag
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let error_envelope = ErrorEnvelope::new(serde_json::json!({
            "code": err.code(),
            "message": err.to_string(),
            "exit_code": exit_code_for(err),
        }));

        match serde_json::to_string(&error_envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Resolve, download, verify and install developer tools.
#[derive(Parser, Debug)]
#[command(name = "devfetch")]
#[command(about = "Resolve, download, verify and install developer tools from release feeds")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Log line format on stderr.
    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    /// Emit JSON envelopes on stdout and JSON logs on stderr.
    #[arg(long, global = true, help = "Emit JSON envelopes and JSON logs")]
    pub json: bool,

    /// Token sent to release indexes.
    #[arg(
        long,
        global = true,
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "Bearer token for release index requests (raises GitHub rate limits)"
    )]
    pub token: Option<String>,
}

/// Options shared by commands that download.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// Download staging directory.
    #[arg(long, value_name = "DIR", help = "Cache and staging directory")]
    pub cache_dir: Option<PathBuf>,

    /// Download attempts per artifact.
    #[arg(long, value_name = "N", help = "Download attempts per artifact (default 3)")]
    pub max_attempts: Option<u32>,

    /// Delay before the first retry.
    #[arg(
        long,
        value_name = "MS",
        help = "Delay before the first retry in milliseconds, doubled each retry (default 2000)"
    )]
    pub initial_delay_ms: Option<u64>,

    /// Allow sudo for the final move.
    #[arg(long, help = "Use sudo -n for the final move when the destination is not writable")]
    pub allow_sudo: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install tools listed in a manifest.
    #[command(about = "Install tools listed in a devfetch.toml manifest")]
    Install {
        /// Tools to install (all when omitted).
        #[arg(value_name = "TOOL", help = "Tools to install (default: all)")]
        tools: Vec<String>,
        /// Manifest path.
        #[arg(
            long,
            short = 'm',
            env = "DEVFETCH_MANIFEST",
            value_name = "PATH",
            help = "Manifest path (default: nearest devfetch.toml)"
        )]
        manifest: Option<PathBuf>,
        /// Directory for tools without an install path.
        #[arg(long, value_name = "DIR", help = "Install directory override")]
        bin_dir: Option<PathBuf>,
        /// Download options.
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Install one tool described on the command line.
    #[command(about = "Install one tool described by flags")]
    Get(Box<GetArgs>),
    /// Print the version a release index resolves to.
    #[command(about = "Resolve a version from a release index")]
    Resolve {
        /// Release index URL.
        #[arg(long, value_name = "URL", help = "Release index URL")]
        index: String,
        /// JSON field holding the version.
        #[arg(long, default_value = "tag_name", help = "JSON field holding the version")]
        field: String,
        /// Prefix to normalize to.
        #[arg(long, default_value = "v", help = "Version prefix (empty to disable)")]
        prefix: String,
        /// Version used when the index cannot be read.
        #[arg(long, value_name = "VERSION", help = "Fallback version")]
        fallback: Option<String>,
    },
    /// System package operations.
    #[command(about = "System package operations")]
    Apt {
        /// Apt subcommand to execute.
        #[command(subcommand)]
        subcommand: AptCommands,
    },
    /// Show the platform tokens used in artifact templates.
    #[command(about = "Show {os} and {arch} template values for this host")]
    Platform,
    /// Show version information.
    #[command(about = "Show version information")]
    Version,
}

/// Arguments for `devfetch get`.
#[derive(clap::Args, Debug, Clone)]
pub struct GetArgs {
    /// Tool name.
    #[arg(value_name = "NAME")]
    pub name: String,
    /// Artifact URL template.
    #[arg(long, value_name = "TEMPLATE", help = "Artifact URL template ({version} {tag} {os} {arch} {name})")]
    pub artifact: String,
    /// Release index URL.
    #[arg(long, value_name = "URL", help = "Release index URL for the latest version")]
    pub index: Option<String>,
    /// Version to install.
    #[arg(long, default_value = "latest", help = "Version to install")]
    pub version: String,
    /// Version used when the index cannot be read.
    #[arg(long, value_name = "VERSION", help = "Fallback version")]
    pub fallback_version: Option<String>,
    /// JSON field holding the version.
    #[arg(long, value_name = "FIELD", help = "JSON field holding the version")]
    pub version_field: Option<String>,
    /// Prefix to normalize to.
    #[arg(long, value_name = "PREFIX", help = "Version prefix (default v, empty to disable)")]
    pub prefix: Option<String>,
    /// Checksum file URL template.
    #[arg(long, value_name = "TEMPLATE", conflicts_with = "sha256", help = "Checksum file URL template")]
    pub checksum_url: Option<String>,
    /// Expected SHA-256.
    #[arg(long, value_name = "HEX", help = "Expected SHA-256 of the artifact")]
    pub sha256: Option<String>,
    /// Artifact packaging.
    #[arg(long, value_name = "KIND", value_parser = parse_archive, help = "raw, tar.gz or zip (default: from file name)")]
    pub archive: Option<ArchiveKind>,
    /// File to take from the archive.
    #[arg(long, value_name = "PATH", help = "File inside the archive (default: tool name)")]
    pub entry: Option<String>,
    /// Install path.
    #[arg(long, value_name = "PATH", help = "Install path (default: <bin dir>/<name>)")]
    pub dest: Option<PathBuf>,
    /// Permission bits in octal.
    #[arg(long, value_name = "OCTAL", value_parser = parse_mode, help = "Permission bits (default 755)")]
    pub mode: Option<u32>,
    /// Use `x86_64`/`aarch64` for `{arch}`.
    #[arg(long, help = "Use x86_64/aarch64 for {arch} instead of amd64/arm64")]
    pub gnu_arch: bool,
    /// Download options.
    #[command(flatten)]
    pub fetch: FetchArgs,
}

/// Apt subcommands.
#[derive(Subcommand, Debug)]
pub enum AptCommands {
    /// Install packages with apt-get.
    #[command(about = "Install packages with apt-get, waiting out dpkg locks")]
    Install {
        /// Packages to install.
        #[arg(required = true, value_name = "PACKAGE")]
        packages: Vec<String>,
        /// Run apt-get update first.
        #[arg(long, help = "Run apt-get update first")]
        update: bool,
        /// Seconds to wait for dpkg/apt locks.
        #[arg(long, default_value_t = 60, value_name = "SECS", help = "Seconds to wait for dpkg/apt locks")]
        lock_timeout: u64,
    },
}

fn parse_archive(s: &str) -> Result<ArchiveKind, String> {
    s.parse::<ArchiveKind>().map_err(|e| e.to_string())
}

fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
        .ok_or_else(|| format!("invalid octal mode: {s}"))
}

/// Parse command line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
