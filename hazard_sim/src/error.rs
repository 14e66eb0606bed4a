//! Error types for the simulation harness.

use hazard_core::HarnessError;
use thiserror::Error;

/// Errors raised by the runner, the CLI and the exporter.
#[derive(Debug, Error)]
pub enum SimError {
    /// A scenario name did not match any known scenario
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    /// A driver failed to run
    #[error(transparent)]
    Harness(#[from] HarnessError),

    /// Writing the export file failed
    #[error("Export error: {0}")]
    Export(#[from] std::io::Error),

    /// Encoding the export failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
