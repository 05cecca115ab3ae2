//! `apt-get` command wrappers.

use devfetch_core::paths::is_root;
use devfetch_core::{Error, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::locks::{LockWait, LockWaiter};

/// Installs system packages with `apt-get`.
#[derive(Debug, Clone)]
pub struct AptInstaller {
    program: String,
    use_sudo: bool,
    update: bool,
    waiter: LockWaiter,
}

impl Default for AptInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl AptInstaller {
    /// Installer using `apt-get`, escalating with `sudo` when not root.
    #[must_use]
    pub fn new() -> Self {
        let use_sudo = !is_root();
        Self {
            program: "apt-get".to_string(),
            use_sudo,
            update: false,
            waiter: LockWaiter::default().with_sudo(use_sudo),
        }
    }

    /// Use a different executable (tests substitute `true`/`false`).
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Prefix commands with `sudo -n`.
    #[must_use]
    pub fn with_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self.waiter = self.waiter.with_sudo(use_sudo);
        self
    }

    /// Run `apt-get update` before installing.
    #[must_use]
    pub fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    /// Wait on these locks before each command.
    ///
    /// The waiter's timeout is also passed to apt-get as
    /// `DPkg::Lock::Timeout`, so apt keeps waiting on locks the waiter could
    /// not observe.
    #[must_use]
    pub fn with_lock_waiter(mut self, waiter: LockWaiter) -> Self {
        self.waiter = waiter.with_sudo(self.use_sudo);
        self
    }

    /// Refresh package lists.
    ///
    /// # Errors
    ///
    /// Returns a package manager error if the command fails.
    pub async fn update(&self) -> Result<()> {
        self.wait_for_locks().await?;
        self.run(&["update"]).await
    }

    /// Install `packages` non-interactively without recommended packages.
    ///
    /// Waits for the dpkg/apt locks first.
    ///
    /// # Errors
    ///
    /// Returns a package manager error if a lock cannot be cleared or the
    /// command fails.
    pub async fn install(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            debug!("No packages requested");
            return Ok(());
        }

        if self.update {
            self.update().await?;
        }

        self.wait_for_locks().await?;

        let mut args = vec!["install", "-y", "--no-install-recommends"];
        args.extend(packages.iter().map(String::as_str));
        self.run(&args).await?;

        info!(packages = ?packages, "Installed system packages");
        Ok(())
    }

    /// Check that the package manager can be executed.
    pub async fn check_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn wait_for_locks(&self) -> Result<LockWait> {
        let outcome = self.waiter.wait().await?;
        debug!(?outcome, "Lock wait finished");
        Ok(outcome)
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = if self.use_sudo {
            // sudo resets the environment, so pass the variable as an assignment
            let mut cmd = Command::new("sudo");
            cmd.args(["-n", "DEBIAN_FRONTEND=noninteractive", self.program.as_str()]);
            cmd
        } else {
            let mut cmd = Command::new(&self.program);
            cmd.env("DEBIAN_FRONTEND", "noninteractive");
            cmd
        };
        cmd.arg("-o")
            .arg(format!("DPkg::Lock::Timeout={}", self.waiter.timeout().as_secs()))
            .args(args);
        cmd
    }

    async fn run(&self, args: &[&str]) -> Result<()> {
        debug!(program = %self.program, ?args, sudo = self.use_sudo, "Running package manager");

        let output = self
            .command(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::package_manager(format!("Failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(Error::package_manager(format!(
                "{} {} failed (exit {code}): {}",
                self.program,
                args.first().unwrap_or(&""),
                stderr.trim()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::LockProbe;
    use std::path::PathBuf;
    use std::time::Duration;

    fn no_locks() -> LockWaiter {
        LockWaiter::new(vec![PathBuf::from("/nonexistent/devfetch/lock")])
            .with_probe(LockProbe::Exists)
            .with_timeout(Duration::from_millis(10))
    }

    #[test]
    fn test_command_without_sudo() {
        let apt = AptInstaller::new().with_sudo(false);
        let cmd = apt.command(&["install", "-y", "curl"]);
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "apt-get");
        let args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(args, ["-o", "DPkg::Lock::Timeout=60", "install", "-y", "curl"]);
        assert!(
            std_cmd
                .get_envs()
                .any(|(k, v)| k == "DEBIAN_FRONTEND" && v == Some("noninteractive".as_ref()))
        );
    }

    #[test]
    fn test_command_with_sudo() {
        let apt = AptInstaller::new().with_sudo(true);
        let cmd = apt.command(&["update"]);
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "sudo");
        let args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(
            args,
            [
                "-n",
                "DEBIAN_FRONTEND=noninteractive",
                "apt-get",
                "-o",
                "DPkg::Lock::Timeout=60",
                "update"
            ]
        );
    }

    #[test]
    fn test_unprivileged_install_waits_on_root_locks() {
        let apt = AptInstaller::new()
            .with_sudo(true)
            .with_lock_waiter(
                LockWaiter::default()
                    .with_probe(LockProbe::OpenHandles)
                    .with_timeout(Duration::from_secs(15)),
            );
        assert_eq!(apt.waiter.probe(), LockProbe::Fuser);

        let cmd = apt.command(&["install", "-y", "jq"]);
        let args: Vec<_> = cmd.as_std().get_args().collect();
        assert!(args.windows(2).any(|w| w == ["-o", "DPkg::Lock::Timeout=15"]));
    }

    #[tokio::test]
    async fn test_install_success() {
        let apt = AptInstaller::new()
            .with_program("true")
            .with_sudo(false)
            .with_lock_waiter(no_locks());
        apt.install(&["curl".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_install_failure_is_package_manager_error() {
        let apt = AptInstaller::new()
            .with_program("false")
            .with_sudo(false)
            .with_update(true)
            .with_lock_waiter(no_locks());
        let err = apt.install(&["curl".to_string()]).await.unwrap_err();
        assert_eq!(err.kind(), devfetch_core::ErrorKind::PackageManager);
        assert!(err.to_string().contains("false update failed"));
    }

    #[tokio::test]
    async fn test_empty_install_is_noop() {
        let apt = AptInstaller::new()
            .with_program("false")
            .with_sudo(false)
            .with_lock_waiter(no_locks());
        apt.install(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_program() {
        let apt = AptInstaller::new()
            .with_program("devfetch-no-such-package-manager")
            .with_sudo(false)
            .with_lock_waiter(no_locks());
        assert!(!apt.check_available().await);
        let err = apt.install(&["curl".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("Failed to run"));
    }
}
