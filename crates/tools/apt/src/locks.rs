//! Waiting for dpkg/apt locks held by another package manager run.
//!
//! Container builds often race `unattended-upgrades` or a parallel
//! `apt-get`. This is a bounded poll, separate from download backoff: wait up
//! to a deadline, then clear the stale locks and carry on.

use devfetch_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lock files taken by dpkg and apt.
pub const DEFAULT_LOCKS: &[&str] = &[
    "/var/lib/dpkg/lock-frontend",
    "/var/lib/dpkg/lock",
    "/var/lib/apt/lists/lock",
    "/var/cache/apt/archives/lock",
];

/// How long to wait before clearing locks.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How a lock is judged to be held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockProbe {
    /// The lock file exists.
    Exists,
    /// Some process has the lock file open (scans `/proc/*/fd`).
    ///
    /// dpkg leaves its lock files in place between runs, so existence alone
    /// reports a lock on every Debian system. Falls back to [`Self::Exists`]
    /// where `/proc` is unavailable.
    OpenHandles,
    /// `fuser -s` reports a process using the lock file.
    ///
    /// Runs through `sudo -n` when the waiter escalates, since the fd tables
    /// of root processes are unreadable to other users. A missing `fuser`
    /// reports the lock as free.
    Fuser,
}

impl Default for LockProbe {
    fn default() -> Self {
        if Path::new("/proc/self/fd").is_dir() {
            Self::OpenHandles
        } else {
            Self::Exists
        }
    }
}

/// How a lock wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockWait {
    /// No lock was held.
    Free,
    /// Locks were released by their holder while waiting.
    Released {
        /// Time spent waiting.
        waited: Duration,
    },
    /// The wait timed out and these locks were removed.
    Cleared {
        /// Locks that were removed.
        stale: Vec<PathBuf>,
    },
}

/// Polls a set of lock files until they are free.
#[derive(Debug, Clone)]
pub struct LockWaiter {
    locks: Vec<PathBuf>,
    timeout: Duration,
    poll_interval: Duration,
    probe: LockProbe,
    use_sudo: bool,
}

impl Default for LockWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_LOCKS.iter().map(PathBuf::from).collect())
    }
}

impl LockWaiter {
    /// Wait on `locks` with default timing and probe.
    #[must_use]
    pub fn new(locks: Vec<PathBuf>) -> Self {
        Self {
            locks,
            timeout: DEFAULT_LOCK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe: LockProbe::default(),
            use_sudo: false,
        }
    }

    /// Give up waiting after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Re-check the locks every `interval`.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how held locks are detected.
    #[must_use]
    pub fn with_probe(mut self, probe: LockProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Probe and remove locks through `sudo -n`.
    ///
    /// An unprivileged `/proc` scan cannot see root-held locks, so
    /// [`LockProbe::OpenHandles`] is replaced by [`LockProbe::Fuser`].
    #[must_use]
    pub fn with_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    /// Lock files being watched.
    #[must_use]
    pub fn locks(&self) -> &[PathBuf] {
        &self.locks
    }

    /// Longest wait before locks are cleared.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe used to detect held locks.
    #[must_use]
    pub fn probe(&self) -> LockProbe {
        match self.probe {
            LockProbe::OpenHandles if self.use_sudo => LockProbe::Fuser,
            probe => probe,
        }
    }

    /// Wait until no lock is held, clearing them once the timeout passes.
    ///
    /// # Errors
    ///
    /// Returns a package manager error if a stale lock cannot be removed.
    pub async fn wait(&self) -> Result<LockWait> {
        let started = Instant::now();
        let mut held = self.held().await;
        if held.is_empty() {
            return Ok(LockWait::Free);
        }

        info!(
            locks = ?held,
            timeout_secs = self.timeout.as_secs(),
            "Waiting for package manager locks"
        );

        while started.elapsed() < self.timeout {
            tokio::time::sleep(self.poll_interval).await;
            held = self.held().await;
            if held.is_empty() {
                let waited = started.elapsed();
                info!(
                    waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                    "Package manager locks released"
                );
                return Ok(LockWait::Released { waited });
            }
            debug!(locks = ?held, "Locks still held");
        }

        warn!(locks = ?held, "Timed out waiting for package manager locks; removing them");
        for lock in &held {
            self.remove(lock).await?;
        }
        Ok(LockWait::Cleared { stale: held })
    }

    async fn held(&self) -> Vec<PathBuf> {
        match self.probe() {
            LockProbe::Exists => self.locks.iter().filter(|l| l.exists()).cloned().collect(),
            LockProbe::OpenHandles => {
                let locks = self.locks.clone();
                tokio::task::spawn_blocking(move || open_handles(&locks))
                    .await
                    .unwrap_or_default()
            }
            LockProbe::Fuser => {
                let mut held = Vec::new();
                for lock in &self.locks {
                    if self.in_use(lock).await {
                        held.push(lock.clone());
                    }
                }
                held
            }
        }
    }

    async fn in_use(&self, lock: &Path) -> bool {
        let mut cmd = if self.use_sudo {
            let mut cmd = tokio::process::Command::new("sudo");
            cmd.args(["-n", "fuser"]);
            cmd
        } else {
            tokio::process::Command::new("fuser")
        };
        let status = cmd
            .arg("-s")
            .arg(lock)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await;
        match status {
            Ok(status) => status.success(),
            Err(e) => {
                debug!(lock = %lock.display(), error = %e, "fuser unavailable");
                false
            }
        }
    }

    async fn remove(&self, lock: &Path) -> Result<()> {
        if self.use_sudo {
            let status = tokio::process::Command::new("sudo")
                .args(["-n", "rm", "-f"])
                .arg(lock)
                .status()
                .await
                .map_err(|e| Error::package_manager(format!("Failed to run sudo: {e}")))?;
            if !status.success() {
                return Err(Error::package_manager(format!(
                    "Failed to remove stale lock {}",
                    lock.display()
                )));
            }
            return Ok(());
        }

        match tokio::fs::remove_file(lock).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::package_manager(format!(
                "Failed to remove stale lock {}: {e}",
                lock.display()
            ))),
        }
    }
}

/// Wait until none of `locks` exist, removing them after `timeout`.
///
/// # Errors
///
/// Returns a package manager error if a stale lock cannot be removed.
pub async fn wait_for_locks(
    locks: &[PathBuf],
    timeout: Duration,
    poll_interval: Duration,
) -> Result<LockWait> {
    LockWaiter::new(locks.to_vec())
        .with_timeout(timeout)
        .with_poll_interval(poll_interval)
        .with_probe(LockProbe::Exists)
        .wait()
        .await
}

/// Locks that some process currently has open.
fn open_handles(locks: &[PathBuf]) -> Vec<PathBuf> {
    let Ok(procs) = std::fs::read_dir("/proc") else {
        return locks.iter().filter(|l| l.exists()).cloned().collect();
    };

    let mut held = Vec::new();
    for proc_entry in procs.filter_map(std::result::Result::ok) {
        let is_pid = proc_entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.bytes().all(|b| b.is_ascii_digit()));
        if !is_pid {
            continue;
        }
        // Other users' fd tables are unreadable without root
        let Ok(fds) = std::fs::read_dir(proc_entry.path().join("fd")) else {
            continue;
        };
        for fd in fds.filter_map(std::result::Result::ok) {
            if let Ok(target) = std::fs::read_link(fd.path())
                && let Some(lock) = locks.iter().find(|l| **l == target)
                && !held.contains(lock)
            {
                held.push(lock.clone());
            }
        }
        if held.len() == locks.len() {
            break;
        }
    }
    held
}
