//! `devfetch resolve`: print the version a release index resolves to.

use crate::cli::CliError;
use crate::commands::CommandOutput;
use devfetch_core::tools::{ToolSpec, VersionConstraint};
use devfetch_tools_release::VersionResolver;
use std::path::PathBuf;

/// Query `index` once and print the normalized version.
///
/// Resolution follows the same rules as an install of `latest`, including the
/// fallback substitution.
///
/// # Errors
///
/// Returns a resolve error when the index cannot be read and no fallback is
/// given.
pub async fn execute_resolve(
    index: &str,
    field: &str,
    prefix: &str,
    fallback: Option<&str>,
    token: Option<String>,
) -> Result<CommandOutput, CliError> {
    let spec = index_spec(index, field, prefix, fallback);
    let resolved = VersionResolver::new()?
        .with_token(token)
        .resolve(&spec)
        .await?;

    let data = serde_json::json!({
        "version": resolved.normalized,
        "bare": resolved.bare(),
        "source": resolved.source,
    });
    Ok(CommandOutput::new(resolved.normalized.clone(), data))
}

/// A `latest` spec that only carries the index settings.
fn index_spec(index: &str, field: &str, prefix: &str, fallback: Option<&str>) -> ToolSpec {
    let mut spec = ToolSpec::new("resolve", index, PathBuf::new())
        .with_version(VersionConstraint::Latest)
        .with_release_index(index)
        .with_version_field(field)
        .with_version_prefix(prefix);
    if let Some(fallback) = fallback {
        spec = spec.with_fallback_version(fallback);
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_spec() {
        let spec = index_spec("https://x/latest", "version", "", Some("1.2.3"));
        assert_eq!(spec.version, VersionConstraint::Latest);
        assert_eq!(spec.release_index.as_deref(), Some("https://x/latest"));
        assert_eq!(spec.fallback_version.as_deref(), Some("1.2.3"));
        assert_eq!(spec.version_field, "version");
        assert_eq!(spec.version_prefix, "");

        let spec = index_spec("https://x/latest", "tag_name", "v", None);
        assert_eq!(spec.fallback_version, None);
    }

    #[tokio::test]
    async fn test_unreachable_index_uses_fallback() {
        let index = "http://127.0.0.1:1/latest";
        let output = execute_resolve(index, "tag_name", "v", Some("2.0.0"), None)
            .await
            .unwrap();
        assert_eq!(output.text, "v2.0.0");
        assert_eq!(output.data["source"], "fallback");
    }
}
