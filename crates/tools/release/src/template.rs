//! Artifact URL template expansion.

use devfetch_core::tools::{ArchStyle, Platform, ResolvedVersion};

/// Expand template tokens in an artifact or checksum URL.
///
/// | Token | Value |
/// |-------|-------|
/// | `{version}` | version without prefix (`1.2.3`) |
/// | `{tag}` | normalized version (`v1.2.3`) |
/// | `{os}` | host OS (`linux`, `darwin`) |
/// | `{arch}` | host architecture in `style` (`amd64`/`arm64` or `x86_64`/`aarch64`) |
/// | `{name}` | tool name |
#[must_use]
pub fn expand_template(
    template: &str,
    name: &str,
    version: &ResolvedVersion,
    platform: &Platform,
    style: ArchStyle,
) -> String {
    template
        .replace("{name}", name)
        .replace("{tag}", &version.normalized)
        .replace("{version}", version.bare())
        .replace("{os}", &platform.os.to_string())
        .replace("{arch}", platform.arch.token(style))
}

/// Last path segment of a URL, without query string or fragment.
#[must_use]
pub fn artifact_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use devfetch_core::tools::{Arch, Os, VersionSource};

    fn version(raw: &str) -> ResolvedVersion {
        ResolvedVersion::normalize(raw, "v", VersionSource::Index)
    }

    #[test]
    fn test_expand_tag_name_scenario() {
        let platform = Platform::new(Os::Linux, Arch::Arm64);
        let url = expand_template(
            "https://example.com/releases/download/v{version}/tool-{os}-{arch}",
            "tool",
            &version("v1.2.3"),
            &platform,
            ArchStyle::Go,
        );
        assert_eq!(
            url,
            "https://example.com/releases/download/v1.2.3/tool-linux-arm64"
        );
    }

    #[test]
    fn test_expand_tag_token() {
        let platform = Platform::new(Os::Linux, Arch::X86_64);
        let url = expand_template(
            "https://dl.k8s.io/release/{tag}/bin/{os}/{arch}/{name}",
            "kubectl",
            &version("1.30.2"),
            &platform,
            ArchStyle::Go,
        );
        assert_eq!(url, "https://dl.k8s.io/release/v1.30.2/bin/linux/amd64/kubectl");
    }

    #[test]
    fn test_expand_gnu_arch_style() {
        let platform = Platform::new(Os::Darwin, Arch::Arm64);
        let url = expand_template(
            "bun-{os}-{arch}.zip",
            "bun",
            &version("1.0.0"),
            &platform,
            ArchStyle::Gnu,
        );
        assert_eq!(url, "bun-darwin-aarch64.zip");
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(
            artifact_file_name("https://x.io/download/v1/tool-linux-amd64.tar.gz"),
            "tool-linux-amd64.tar.gz"
        );
        assert_eq!(
            artifact_file_name("https://x.io/download/tool.zip?raw=true"),
            "tool.zip"
        );
        assert_eq!(artifact_file_name("tool"), "tool");
    }
}
