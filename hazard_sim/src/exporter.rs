//! JSON exporter for scenario results.
//!
//! Writes the configuration and every scenario result (traces, progress
//! boards, counts) so a run can be inspected or diffed after the fact.

use crate::config::SimConfig;
use crate::error::SimError;
use crate::runner::ScenarioResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Tool version that produced the export
    pub version: String,

    /// Parameters the scenarios ran with
    pub config: SimConfig,

    /// Every scenario result, in run order
    pub results: Vec<ScenarioResult>,

    /// True if every scenario passed
    pub passed: bool,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(config: SimConfig) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config,
            results: Vec::new(),
            passed: true,
        }
    }

    /// Adds a result.
    pub fn add_result(&mut self, result: ScenarioResult) {
        self.passed &= result.passed;
        self.results.push(result);
    }

    /// Returns the number of failed scenarios.
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Serializes the export as pretty JSON.
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> Result<(), SimError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::ScenarioId;
    use std::time::Duration;

    fn result(scenario: ScenarioId, passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario,
            passed,
            failure_reason: (!passed).then(|| "nope".to_string()),
            elapsed: Duration::from_millis(3),
            report: None,
        }
    }

    #[test]
    fn test_export_tracks_pass_state() {
        let mut export = SimExport::new(SimConfig::default());
        export.add_result(result(ScenarioId::Deadlock, true));
        assert!(export.passed);
        export.add_result(result(ScenarioId::Starvation, false));
        assert!(!export.passed);
        assert_eq!(export.failed_count(), 1);
    }

    #[test]
    fn test_write_to_file() {
        let mut export = SimExport::new(SimConfig::default());
        export.add_result(result(ScenarioId::Livelock, true));

        let path = std::env::temp_dir().join(format!("hazard_export_{}.json", std::process::id()));
        let path = path.to_string_lossy().into_owned();
        export.write_to_file(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["results"][0]["scenario"], "livelock");
        assert_eq!(written["passed"], true);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_write_to_missing_dir_fails() {
        let export = SimExport::new(SimConfig::default());
        let err = export.write_to_file("/nonexistent-dir/export.json").unwrap_err();
        assert!(matches!(err, SimError::Export(_)));
    }
}
