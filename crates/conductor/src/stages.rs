//! Stage controller: which pipeline stages run.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingestion,
    Analysis,
    Patterns,
    Transformation,
    Risk,
    Validation,
    Reporting,
}

impl Stage {
    /// Pipeline order.
    pub const ALL: [Stage; 7] = [
        Stage::Ingestion,
        Stage::Analysis,
        Stage::Patterns,
        Stage::Transformation,
        Stage::Risk,
        Stage::Validation,
        Stage::Reporting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingestion => "ingestion",
            Stage::Analysis => "analysis",
            Stage::Patterns => "patterns",
            Stage::Transformation => "transformation",
            Stage::Risk => "risk",
            Stage::Validation => "validation",
            Stage::Reporting => "reporting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = Stage::ALL.iter().map(Stage::as_str).collect();
                format!("unknown stage '{}' (valid: {})", s, valid.join(", "))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageController {
    enabled: BTreeSet<Stage>,
}

impl Default for StageController {
    fn default() -> Self {
        Self::all()
    }
}

impl StageController {
    pub fn all() -> Self {
        Self {
            enabled: Stage::ALL.into_iter().collect(),
        }
    }

    /// Every stage up to and including `last`.
    pub fn until(last: Stage) -> Self {
        Self {
            enabled: Stage::ALL.into_iter().filter(|s| *s <= last).collect(),
        }
    }

    pub fn only(stages: &[Stage]) -> Self {
        Self {
            enabled: stages.iter().copied().collect(),
        }
    }

    pub fn is_enabled(&self, stage: Stage) -> bool {
        self.enabled.contains(&stage)
    }

    /// Enabled stages in pipeline order.
    pub fn enabled_stages(&self) -> Vec<Stage> {
        self.enabled.iter().copied().collect()
    }
}
