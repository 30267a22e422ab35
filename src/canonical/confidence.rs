use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CanonError;

/// How reliable a canonical assignment is believed to be.
///
/// Variants are declared low to high so the derived ordering reads naturally:
/// `Confident > Suggested > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Suggested,
    Confident,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    pub confident: f32,
    pub suggested: f32,
    /// Minimum Jaro-Winkler similarity for a fuzzy match to count at all.
    pub fuzzy_floor: f32,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            confident: 0.90,
            suggested: 0.75,
            fuzzy_floor: 0.85,
        }
    }
}

impl ConfidenceLevel {
    pub fn from_score(score: f32, thresholds: &MatchThresholds) -> Self {
        if score >= thresholds.confident {
            ConfidenceLevel::Confident
        } else if score >= thresholds.suggested {
            ConfidenceLevel::Suggested
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Confident => "confident",
            ConfidenceLevel::Suggested => "suggested",
            ConfidenceLevel::Low => "low",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfidenceLevel {
    type Err = CanonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confident" => Ok(ConfidenceLevel::Confident),
            "suggested" => Ok(ConfidenceLevel::Suggested),
            "low" => Ok(ConfidenceLevel::Low),
            _ => Err(CanonError::UnknownConfidence(s.trim().to_string())),
        }
    }
}
