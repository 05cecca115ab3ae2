//! Artifact download with exponential backoff.

use devfetch_core::tools::{AttemptOutcome, FetchAttempt, FetchReport};
use devfetch_core::{Error, Result};
use reqwest::Client;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::http::build_client;

/// Total timeout for a single artifact download attempt.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How many times to try a download and how long to wait in between.
///
/// The wait before attempt `n + 1` is `initial_delay * 2^(n - 1)`, so the
/// defaults sleep 2s and then 4s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Create a policy. At least one attempt is always made.
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    /// Delay after the failed 1-based `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }

    /// Every delay that would be slept if all attempts fail.
    #[must_use]
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts.max(1)).map(|a| self.delay_for(a)).collect()
    }
}

/// A completed download, staged next to where it will be used.
///
/// The temp file is removed on drop unless it is persisted.
#[derive(Debug)]
pub struct Downloaded {
    /// Staged download.
    pub file: NamedTempFile,
    /// Every attempt made.
    pub report: FetchReport,
    /// URL that was downloaded.
    pub url: String,
}

impl Downloaded {
    /// Path of the staged file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Close the file handle, keeping the auto-deleting path.
    #[must_use]
    pub fn into_temp_path(self) -> TempPath {
        self.file.into_temp_path()
    }
}

/// Downloads artifacts, retrying transient failures.
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    /// Create a fetcher with the default per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        Self::with_timeout(policy, DEFAULT_DOWNLOAD_TIMEOUT)
    }

    /// Create a fetcher with a custom per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(policy: RetryPolicy, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(DOWNLOAD_CONNECT_TIMEOUT, timeout)?,
            policy,
        })
    }

    /// Retry policy in use.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Download `url` into a temp file inside `staging_dir`.
    ///
    /// Every attempt writes to its own temp file; a failed attempt's file is
    /// dropped before the next one starts, so nothing partial survives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FetchExhausted`] when every attempt fails, or an I/O
    /// error when the staging directory cannot be written.
    pub async fn download(&self, url: &str, staging_dir: &Path) -> Result<Downloaded> {
        tokio::fs::create_dir_all(staging_dir)
            .await
            .map_err(|e| Error::io(e, staging_dir, "create staging directory"))?;

        let max = self.policy.max_attempts.max(1);
        let mut report = FetchReport::default();

        for attempt in 1..=max {
            let started = Instant::now();
            debug!(%url, attempt, max_attempts = max, "Downloading artifact");

            match self.attempt(url, staging_dir).await? {
                Ok(file) => {
                    report.attempts.push(FetchAttempt {
                        attempt,
                        outcome: AttemptOutcome::Success,
                        elapsed: started.elapsed(),
                        delay_before_next: None,
                    });
                    info!(%url, attempts = attempt, "Downloaded artifact");
                    return Ok(Downloaded {
                        file,
                        report,
                        url: url.to_string(),
                    });
                }
                Err(outcome) => {
                    let delay = (attempt < max).then(|| self.policy.delay_for(attempt));
                    warn!(
                        %url,
                        attempt,
                        max_attempts = max,
                        error = %outcome,
                        delay_ms = delay.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                        "Download attempt failed"
                    );
                    report.attempts.push(FetchAttempt {
                        attempt,
                        outcome,
                        elapsed: started.elapsed(),
                        delay_before_next: delay,
                    });
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let last_error = report
            .attempts
            .last()
            .map_or_else(|| "no attempts made".to_string(), |a| a.outcome.to_string());
        Err(Error::fetch_exhausted(url, report.attempt_count(), last_error))
    }

    /// One try. The outer error is fatal, the inner one is retryable.
    async fn attempt(
        &self,
        url: &str,
        staging_dir: &Path,
    ) -> Result<std::result::Result<NamedTempFile, AttemptOutcome>> {
        let mut response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Ok(Err(network_error(&e))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(Err(AttemptOutcome::HttpError {
                status: status.as_u16(),
            }));
        }

        let staged = tempfile::Builder::new()
            .prefix(".devfetch-")
            .suffix(".part")
            .tempfile_in(staging_dir)
            .map_err(|e| Error::io(e, staging_dir, "create staged download"))?;
        let handle = staged
            .as_file()
            .try_clone()
            .map_err(|e| Error::io(e, staged.path(), "open staged download"))?;
        let mut out = tokio::fs::File::from_std(handle);

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => out
                    .write_all(&chunk)
                    .await
                    .map_err(|e| Error::io(e, staged.path(), "write staged download"))?,
                Ok(None) => break,
                Err(e) => return Ok(Err(network_error(&e))),
            }
        }

        out.flush()
            .await
            .map_err(|e| Error::io(e, staged.path(), "flush staged download"))?;
        out.sync_all()
            .await
            .map_err(|e| Error::io(e, staged.path(), "sync staged download"))?;

        Ok(Ok(staged))
    }
}

fn network_error(e: &reqwest::Error) -> AttemptOutcome {
    let message = if e.is_timeout() {
        format!("timed out: {e}")
    } else {
        e.to_string()
    };
    AttemptOutcome::NetworkError { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(
            policy.schedule(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
    }

    #[test]
    fn test_at_least_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 1);
        assert!(policy.schedule().is_empty());
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::new(100, Duration::from_secs(2));
        assert_eq!(policy.delay_for(64), Duration::from_secs(2).saturating_mul(u32::MAX));
    }
}
