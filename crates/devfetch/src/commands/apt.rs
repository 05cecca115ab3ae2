//! `devfetch apt install`: system packages through apt-get.

use crate::cli::CliError;
use crate::commands::CommandOutput;
use devfetch_tools_apt::{AptInstaller, LockWaiter};
use std::time::Duration;

/// Install `packages`, waiting up to `lock_timeout` for dpkg/apt locks.
///
/// # Errors
///
/// Returns a package manager error if apt-get fails or a stale lock cannot be
/// removed.
pub async fn execute_apt_install(
    packages: &[String],
    update: bool,
    lock_timeout: Duration,
) -> Result<CommandOutput, CliError> {
    let apt = AptInstaller::new()
        .with_update(update)
        .with_lock_waiter(LockWaiter::default().with_timeout(lock_timeout));

    if !apt.check_available().await {
        return Err(CliError::from(devfetch_core::Error::package_manager(
            "apt-get is not available on this system",
        ))
        .with_help("apt installs are supported on Debian and Ubuntu images"));
    }

    apt.install(packages).await?;
    Ok(CommandOutput::new(
        format!("Installed {}", packages.join(" ")),
        serde_json::json!({ "packages": packages }),
    ))
}
