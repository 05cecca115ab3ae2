//! SHA-256 verification of downloaded artifacts.

use devfetch_core::tools::{ChecksumOutcome, ChecksumSource, is_sha256_hex};
use devfetch_core::{Error, Result};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::http::build_client;

const CHECKSUM_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CHECKSUM_TIMEOUT: Duration = Duration::from_secs(30);

/// Verifies artifacts against a literal digest or a published checksum file.
pub struct ChecksumVerifier {
    client: Client,
}

impl ChecksumVerifier {
    /// Create a verifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client(CHECKSUM_CONNECT_TIMEOUT, CHECKSUM_TIMEOUT)?,
        })
    }

    /// Verify `path` against `source`.
    ///
    /// `artifact_name` selects the matching line in multi-entry checksum files.
    /// `source` must already be expanded; URL templates are not touched here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChecksumMismatch`] when the digest differs, or an I/O
    /// error if the file cannot be read. An unreachable checksum URL is not an
    /// error: it yields [`ChecksumOutcome::Unavailable`].
    pub async fn verify(
        &self,
        path: &Path,
        artifact_name: &str,
        source: Option<&ChecksumSource>,
    ) -> Result<ChecksumOutcome> {
        let expected = match source {
            None => {
                debug!(artifact = %artifact_name, "No checksum configured; skipping verification");
                return Ok(ChecksumOutcome::Skipped);
            }
            Some(ChecksumSource::Sha256(hex)) => hex.trim().to_ascii_lowercase(),
            Some(ChecksumSource::Url(url)) => match self.fetch_expected(url, artifact_name).await {
                Ok(hex) => hex,
                Err(reason) => {
                    warn!(
                        artifact = %artifact_name,
                        %url,
                        %reason,
                        "Checksum unavailable; continuing without verification"
                    );
                    return Ok(ChecksumOutcome::Unavailable { reason });
                }
            },
        };

        let actual = sha256_file(path).await?;
        if actual != expected {
            return Err(Error::checksum_mismatch(artifact_name, expected, actual));
        }

        info!(artifact = %artifact_name, sha256 = %actual, "Checksum verified");
        Ok(ChecksumOutcome::Verified { sha256: actual })
    }

    async fn fetch_expected(&self, url: &str, artifact_name: &str) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        parse_checksum_document(&body, artifact_name)
            .ok_or_else(|| format!("no SHA-256 digest for '{artifact_name}' in checksum document"))
    }
}

/// Extract the digest for `file_name` from a checksum document.
///
/// Understands a bare hash, `sha256sum` output (`<hex>  <name>` and the
/// binary-mode `<hex> *<name>`) and BSD `SHA256 (<name>) = <hex>`. A line
/// naming the artifact wins; otherwise a document with exactly one digest is
/// taken to describe the artifact.
#[must_use]
pub fn parse_checksum_document(body: &str, file_name: &str) -> Option<String> {
    let entries: Vec<(Option<&str>, &str)> = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_line)
        .collect();

    entries
        .iter()
        .find(|(name, _)| name.is_some_and(|n| names_match(n, file_name)))
        .or_else(|| match entries.as_slice() {
            [only] => Some(only),
            _ => None,
        })
        .map(|(_, hex)| hex.to_ascii_lowercase())
}

fn parse_line(line: &str) -> Option<(Option<&str>, &str)> {
    if let Some(rest) = line.strip_prefix("SHA256 (")
        && let Some((name, hex)) = rest.rsplit_once(") = ")
    {
        let hex = hex.trim();
        return is_sha256_hex(hex).then_some((Some(name), hex));
    }

    let mut parts = line.splitn(2, char::is_whitespace);
    let hex = parts.next()?;
    if !is_sha256_hex(hex) {
        return None;
    }
    let name = parts
        .next()
        .map(str::trim)
        .map(|n| n.strip_prefix('*').unwrap_or(n))
        .filter(|n| !n.is_empty());
    Some((name, hex))
}

fn names_match(listed: &str, file_name: &str) -> bool {
    let listed = listed.strip_prefix("./").unwrap_or(listed);
    listed == file_name || listed.rsplit('/').next() == Some(file_name)
}

/// Compute the lowercase hex SHA-256 of a file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| Error::io(e, path, "open for hashing"))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .map_err(|e| Error::io(e, path, "read for hashing"))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
