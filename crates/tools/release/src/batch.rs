//! Concurrent installation of several tools.

use devfetch_core::tools::{InstalledArtifact, ToolSpec};
use devfetch_core::{Error, Result};
use futures::future::join_all;
use tracing::{info, warn};

use crate::pipeline::ToolInstaller;

/// Result of one tool in a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Tool name.
    pub name: String,
    /// Installed artifact, or the error that stopped this tool.
    pub result: Result<InstalledArtifact>,
}

/// Results of a batch, in the order the specs were given.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One outcome per spec.
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    /// Whether every tool installed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Tools that installed.
    pub fn installed(&self) -> impl Iterator<Item = &InstalledArtifact> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Tools that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.name.as_str(), e)))
    }

    /// First failure, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<&Error> {
        self.failures().next().map(|(_, e)| e)
    }
}

/// Install every spec concurrently and wait for all of them.
///
/// A failing tool does not cancel its siblings; every outcome is reported.
pub async fn install_all(installer: &ToolInstaller, specs: &[ToolSpec]) -> BatchReport {
    info!(count = specs.len(), "Installing tools");

    let results = join_all(specs.iter().map(|spec| installer.install(spec))).await;

    let outcomes: Vec<BatchOutcome> = specs
        .iter()
        .zip(results)
        .map(|(spec, result)| {
            if let Err(e) = &result {
                warn!(tool = %spec.name, error = %e, "Tool install failed");
            }
            BatchOutcome {
                name: spec.name.clone(),
                result,
            }
        })
        .collect();

    let report = BatchReport { outcomes };
    info!(
        installed = report.installed().count(),
        failed = report.failures().count(),
        "Batch finished"
    );
    report
}
