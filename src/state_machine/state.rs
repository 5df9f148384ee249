//! Session state types

use crate::stage::Stage;
use serde::{Deserialize, Serialize};

/// Stage progress of one tutoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionState {
    pub current_stage: Stage,
    /// Answers given since the current stage was entered
    pub questions_answered_in_stage: u32,
    /// Set once the oracle declares the `Completed` stage complete
    pub is_session_completed: bool,
}

impl SessionState {
    /// State for a brand-new session
    pub fn fresh() -> Self {
        Self::default()
    }

    /// State restored at a given stage and count.
    ///
    /// A session started directly at `Completed` counts as finished.
    pub fn at(stage: Stage, questions_answered_in_stage: u32) -> Self {
        Self {
            current_stage: stage,
            questions_answered_in_stage,
            is_session_completed: stage.is_terminal(),
        }
    }
}
