//! Tutoring stages and their question targets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four ordered phases of a topic's Q&A session.
///
/// Variant order is the progression order, so `Ord` compares stages by
/// how far the session has advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    InitialMaterial,
    DeeperMaterial,
    OutOfSyllabus,
    Completed,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::InitialMaterial,
        Stage::DeeperMaterial,
        Stage::OutOfSyllabus,
        Stage::Completed,
    ];

    /// Number of questions the oracle is expected to ask before leaving this stage
    pub fn target_questions(self) -> u32 {
        match self {
            Stage::InitialMaterial => 3,
            Stage::DeeperMaterial => 2,
            Stage::OutOfSyllabus => 1,
            Stage::Completed => 0,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Stage::InitialMaterial => "Initial Material",
            Stage::DeeperMaterial => "Deeper Material",
            Stage::OutOfSyllabus => "Out of Syllabus",
            Stage::Completed => "Completed",
        }
    }

    /// Wire name, identical to the serde representation
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::InitialMaterial => "initial_material",
            Stage::DeeperMaterial => "deeper_material",
            Stage::OutOfSyllabus => "out_of_syllabus",
            Stage::Completed => "completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Stage::Completed
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    /// Accepts the wire name in any case, with `-` or spaces in place of `_`.
    /// Oracle output is loose about this.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}
