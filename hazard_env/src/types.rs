//! Common types for the hazard environment abstraction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Human-readable name of a simulated agent ("Alice", "Barbara", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentName(String);

impl AgentName {
    /// Creates a new agent name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for AgentName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An avoidance direction an agent can try to claim ("left", "right", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Direction(String);

impl Direction {
    /// Creates a new direction.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the direction as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Direction {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_display_verbatim() {
        assert_eq!(AgentName::from("Alice").to_string(), "Alice");
        assert_eq!(Direction::from("left").as_str(), "left");
    }
}
