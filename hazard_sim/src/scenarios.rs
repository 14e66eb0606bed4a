//! Hazard scenarios for DST.

use crate::error::SimError;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// HZ-001: Opposed lock ordering over two shared cells
    Deadlock,

    /// HZ-002: Symmetric agents negotiating directions in lock-step
    Livelock,

    /// HZ-003: Greedy long-hold versus polite short-hold lock use
    Starvation,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Deadlock,
            ScenarioId::Livelock,
            ScenarioId::Starvation,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Deadlock => "deadlock",
            ScenarioId::Livelock => "livelock",
            ScenarioId::Starvation => "starvation",
        }
    }

    /// Returns the scenario code.
    pub fn code(&self) -> &'static str {
        match self {
            ScenarioId::Deadlock => "HZ-001",
            ScenarioId::Livelock => "HZ-002",
            ScenarioId::Starvation => "HZ-003",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Deadlock => "Two agents lock two cells in opposite order with work in between; expect a permanent hang",
            ScenarioId::Livelock => "Agents claim and abandon directions on a shared cadence; expect nobody to commit",
            ScenarioId::Starvation => "Greedy 3-unit holds against polite 3x1-unit holds; expect polite throughput to collapse",
        }
    }

    /// Returns true if the scenario can block forever without an external limit.
    pub fn may_hang(&self) -> bool {
        matches!(self, ScenarioId::Deadlock | ScenarioId::Livelock)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deadlock" | "dl" | "hz-001" => Ok(ScenarioId::Deadlock),
            "livelock" | "ll" | "hz-002" => Ok(ScenarioId::Livelock),
            "starvation" | "exhaustion" | "hz-003" => Ok(ScenarioId::Starvation),
            _ => Err(SimError::UnknownScenario(s.to_string())),
        }
    }
}
