//! Version resolution against a release index.
//!
//! A lookup is a single bounded request. It is never retried here: a failing
//! index is usually rate limiting, which a quick retry does not fix.

use devfetch_core::tools::{
    DEFAULT_VERSION_FIELD, ResolvedVersion, ToolSpec, VersionConstraint, VersionSource,
};
use devfetch_core::{Error, Result};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::http::build_client;

/// Connect timeout for release index requests.
pub const INDEX_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total timeout for release index requests.
pub const INDEX_TIMEOUT: Duration = Duration::from_secs(10);

/// Bare version token in a plain-text body, e.g. `v1.30.2` or `1.7.1-rc.1`.
static VERSION_TOKEN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\bv?\d+\.\d+(?:\.\d+)?(?:-[0-9A-Za-z][0-9A-Za-z.]*)?(?:\+[0-9A-Za-z.]+)?\b").ok()
});

/// Resolves version constraints to concrete versions.
pub struct VersionResolver {
    client: Client,
    token: Option<String>,
}

impl VersionResolver {
    /// Create a resolver with the default index timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client(INDEX_CONNECT_TIMEOUT, INDEX_TIMEOUT)?,
            token: None,
        })
    }

    /// Send a bearer token with index requests (raises GitHub rate limits).
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Resolve the spec's version constraint.
    ///
    /// Exact versions are normalized without any network access. For
    /// `latest`, a failed lookup falls back to `fallback_version` when one is
    /// configured; the substitution is logged and recorded as
    /// [`VersionSource::Fallback`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionResolution`] when the lookup fails and no
    /// fallback is configured.
    pub async fn resolve(&self, spec: &ToolSpec) -> Result<ResolvedVersion> {
        let prefix = spec.version_prefix.as_str();

        if let VersionConstraint::Exact(version) = &spec.version {
            debug!(tool = %spec.name, %version, "Using pinned version");
            return Ok(ResolvedVersion::normalize(version, prefix, VersionSource::Explicit));
        }

        let lookup = match &spec.release_index {
            Some(url) => self.query(url, &spec.version_field).await,
            None => Err(Error::version_resolution(
                "<none>",
                "no release index configured",
            )),
        };

        match lookup {
            Ok(raw) => {
                let resolved = ResolvedVersion::normalize(&raw, prefix, VersionSource::Index);
                info!(tool = %spec.name, version = %resolved, "Resolved latest version");
                Ok(resolved)
            }
            Err(err) => match &spec.fallback_version {
                Some(fallback) => {
                    warn!(
                        tool = %spec.name,
                        error = %err,
                        %fallback,
                        "Release index lookup failed; using fallback version"
                    );
                    Ok(ResolvedVersion::normalize(fallback, prefix, VersionSource::Fallback))
                }
                None => Err(err),
            },
        }
    }

    /// Query a release index and extract the raw version string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionResolution`] if the request fails, the status
    /// is not successful, or no version can be found in the body.
    pub async fn query(&self, url: &str, field: &str) -> Result<String> {
        debug!(%url, %field, "Querying release index");

        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/json, text/plain;q=0.9, */*;q=0.8");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::version_resolution(url, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let hint = if matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS) {
                " (likely rate limited)"
            } else {
                ""
            };
            return Err(Error::version_resolution(url, format!("HTTP {status}{hint}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::version_resolution(url, format!("failed to read response: {e}")))?;

        parse_version_document(&body, field)
            .ok_or_else(|| Error::version_resolution(url, "no version found in response"))
    }
}

/// Extract a version from a release index response.
///
/// A JSON body is only searched at `field`, then `tag_name` and `version`;
/// arrays use their first element (release listings are newest first) and a
/// JSON string is taken as the version. Bodies that are not JSON are scanned
/// as text for a `"field": "value"` pair and then for a bare version token.
#[must_use]
pub fn parse_version_document(body: &str, field: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(body) {
        Ok(value) => json_version(&value, field),
        Err(_) => text_version(body, field),
    }
}

fn json_version(value: &Value, field: &str) -> Option<String> {
    match value {
        Value::Object(map) => [field, DEFAULT_VERSION_FIELD, "version"]
            .iter()
            .filter_map(|key| map.get(*key))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(String::from),
        Value::Array(items) => items.first().and_then(|first| json_version(first, field)),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn text_version(body: &str, field: &str) -> Option<String> {
    let pattern = format!(r#""{}"\s*:\s*"([^"]+)""#, regex::escape(field));
    if let Ok(re) = Regex::new(&pattern)
        && let Some(captures) = re.captures(body)
    {
        return captures.get(1).map(|m| m.as_str().trim().to_string());
    }

    VERSION_TOKEN
        .as_ref()
        .and_then(|re| re.find(body))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_github_release() {
        let body = r#"{"url":"https://api.github.com/x","tag_name":"v1.2.3","name":"Release 1.2.3"}"#;
        assert_eq!(parse_version_document(body, "tag_name"), Some("v1.2.3".into()));
    }

    #[test]
    fn test_parse_custom_field() {
        let body = r#"{"current_version":"2.0.1","tag_name":"ignored"}"#;
        assert_eq!(
            parse_version_document(body, "current_version"),
            Some("2.0.1".into())
        );
    }

    #[test]
    fn test_parse_falls_back_to_version_field() {
        let body = r#"{"version":"0.9.0"}"#;
        assert_eq!(parse_version_document(body, "tag_name"), Some("0.9.0".into()));
    }

    #[test]
    fn test_parse_release_list() {
        let body = r#"[{"tag_name":"v3.0.0"},{"tag_name":"v2.9.0"}]"#;
        assert_eq!(parse_version_document(body, "tag_name"), Some("v3.0.0".into()));
    }

    #[test]
    fn test_parse_plain_text() {
        assert_eq!(parse_version_document("v1.30.2\n", "tag_name"), Some("v1.30.2".into()));
        assert_eq!(parse_version_document("1.7.1", "tag_name"), Some("1.7.1".into()));
    }

    #[test]
    fn test_parse_truncated_json_uses_text_pattern() {
        let body = r#"{"html_url":"https://github.com/x","tag_name": "v0.41.4", "assets": ["#;
        assert_eq!(parse_version_document(body, "tag_name"), Some("v0.41.4".into()));
    }

    #[test]
    fn test_parse_prerelease_token() {
        assert_eq!(
            parse_version_document("latest: v2.0.0-rc.1", "tag_name"),
            Some("v2.0.0-rc.1".into())
        );
    }

    #[test]
    fn test_parse_nothing() {
        assert_eq!(parse_version_document("", "tag_name"), None);
        assert_eq!(parse_version_document("rate limit exceeded", "tag_name"), None);
        assert_eq!(parse_version_document(r#"{"message":"Not Found"}"#, "tag_name"), None);
        assert_eq!(parse_version_document(r#"{"tag_name":""}"#, "tag_name"), None);
    }

    #[test]
    fn test_json_without_field_is_not_scanned() {
        let body = r#"{"tag_name":null,"body":"Requires Go 1.21.0 or newer"}"#;
        assert_eq!(parse_version_document(body, "tag_name"), None);
    }

    #[test]
    fn test_release_title_is_not_a_version() {
        let body = r#"{"name":"Nightly build","draft":false}"#;
        assert_eq!(parse_version_document(body, "tag_name"), None);
    }

    #[test]
    fn test_json_and_text_paths_agree() {
        let json = r#"{"tag_name":"v1.2.3"}"#;
        let text = "v1.2.3";
        assert_eq!(
            parse_version_document(json, "tag_name"),
            parse_version_document(text, "tag_name")
        );
    }
}
