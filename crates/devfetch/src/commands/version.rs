//! `devfetch version`.

use crate::commands::CommandOutput;

/// Version information for this build.
#[must_use]
pub fn execute_version() -> CommandOutput {
    let version = env!("CARGO_PKG_VERSION");
    CommandOutput::new(
        format!("devfetch {version}"),
        serde_json::json!({ "name": "devfetch", "version": version }),
    )
}
