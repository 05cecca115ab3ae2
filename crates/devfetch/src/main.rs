//! devfetch CLI application.

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use devfetch::cli::{
    self, AptCommands, CliError, Commands, EXIT_OK, OkEnvelope, exit_code_for, render_error,
};
use devfetch::commands::{self, CommandOutput};
use devfetch::tracing::{TracingConfig, TracingFormat, init_tracing};
use std::time::Duration;

/// Main entry point - determines sync vs async execution path
fn main() {
    // NOTE: Using eprintln! in panic hook is intentional - tracing infrastructure
    // may be corrupted during a panic, so we use the most reliable output method.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();
    let json_mode = cli.json;

    let tracing_config = TracingConfig {
        format: if json_mode {
            TracingFormat::Json
        } else {
            cli.log_format
        },
        level: cli.level.into(),
        ..Default::default()
    };
    // Ignore error if tracing already initialized (e.g., in tests)
    let _ = init_tracing(tracing_config);

    let result = if requires_async_runtime(&cli) {
        run_with_tokio(cli)
    } else {
        run_sync(cli.command.as_ref())
    };

    let exit_code = match result {
        Ok(output) => {
            print_output(&output, json_mode);
            EXIT_OK
        }
        Err(err) => {
            render_error(&err, json_mode);
            exit_code_for(&err)
        }
    };
    std::process::exit(exit_code);
}

/// Determine if a command requires the async runtime
const fn requires_async_runtime(cli: &cli::Cli) -> bool {
    match &cli.command {
        None | Some(Commands::Version | Commands::Platform) => false,
        Some(
            Commands::Install { .. }
            | Commands::Get(_)
            | Commands::Resolve { .. }
            | Commands::Apt { .. },
        ) => true,
    }
}

/// Run commands that need no network or subprocess I/O
fn run_sync(command: Option<&Commands>) -> Result<CommandOutput, CliError> {
    match command {
        Some(Commands::Version) => Ok(commands::version::execute_version()),
        Some(Commands::Platform) => Ok(commands::platform::execute_platform()),
        _ => Err(CliError::config_with_help(
            "No subcommand provided",
            "Run 'devfetch --help' to see available commands",
        )),
    }
}

/// Create tokio runtime and run async path
fn run_with_tokio(cli: cli::Cli) -> Result<CommandOutput, CliError> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::install(format!("Failed to create tokio runtime: {e}")))?;

    rt.block_on(run(cli))
}

async fn run(cli: cli::Cli) -> Result<CommandOutput, CliError> {
    let token = cli
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| std::env::var("GH_TOKEN").ok().filter(|t| !t.is_empty()));

    match cli.command {
        Some(Commands::Install {
            tools,
            manifest,
            bin_dir,
            fetch,
        }) => commands::install::execute_install(manifest, &tools, bin_dir, &fetch, token).await,
        Some(Commands::Get(args)) => commands::get::execute_get(&args, token).await,
        Some(Commands::Resolve {
            index,
            field,
            prefix,
            fallback,
        }) => {
            commands::resolve::execute_resolve(&index, &field, &prefix, fallback.as_deref(), token)
                .await
        }
        Some(Commands::Apt {
            subcommand:
                AptCommands::Install {
                    packages,
                    update,
                    lock_timeout,
                },
        }) => {
            commands::apt::execute_apt_install(&packages, update, Duration::from_secs(lock_timeout))
                .await
        }
        other @ (Some(Commands::Version | Commands::Platform) | None) => run_sync(other.as_ref()),
    }
}

fn print_output(output: &CommandOutput, json_mode: bool) {
    if json_mode {
        let envelope = OkEnvelope::new(&output.data);
        match serde_json::to_string(&envelope) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing response: {e}"),
        }
    } else if !output.text.is_empty() {
        println!("{}", output.text);
    }
}
