//! `devfetch platform`: show the template values for this host.

use crate::commands::CommandOutput;
use devfetch_core::tools::{ArchStyle, Platform};

/// Report `{os}` and both `{arch}` spellings for the current host.
#[must_use]
pub fn execute_platform() -> CommandOutput {
    describe(Platform::current())
}

fn describe(platform: Platform) -> CommandOutput {
    let os = platform.os.to_string();
    let arch = platform.arch.token(ArchStyle::Go);
    let arch_gnu = platform.arch.token(ArchStyle::Gnu);
    CommandOutput::new(
        format!("os: {os}\narch: {arch}\narch (gnu): {arch_gnu}"),
        serde_json::json!({ "os": os, "arch": arch, "arch_gnu": arch_gnu }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use devfetch_core::tools::{Arch, Os};

    #[test]
    fn test_describe_linux_arm64() {
        let out = describe(Platform::new(Os::Linux, Arch::Arm64));
        assert_eq!(out.data["os"], "linux");
        assert_eq!(out.data["arch"], "arm64");
        assert_eq!(out.data["arch_gnu"], "aarch64");
        assert!(out.text.contains("arch (gnu): aarch64"));
    }
}
