//! Stateful holder for one live session's stage progress

use super::mcq::looks_like_multiple_choice;
use super::transition::advance;
use super::SessionState;
use crate::oracle::OracleTurnResult;
use crate::stage::Stage;

/// Tracks stage progression for a single active conversation.
///
/// Never shared across sessions; a reset replaces the tracker.
#[derive(Debug, Clone, Default)]
pub struct StageTracker {
    state: SessionState,
}

impl StageTracker {
    /// Tracker for a brand-new session at `(InitialMaterial, 0)`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: SessionState) -> Self {
        Self { state }
    }

    /// Reset to an explicit stage and count. This is the only way a stage
    /// can move backwards.
    pub fn initialize(&mut self, start_stage: Stage, start_count: u32) {
        self.state = SessionState::at(start_stage, start_count);
    }

    /// Apply one oracle turn and return the new snapshot
    pub fn advance(&mut self, turn: &OracleTurnResult) -> SessionState {
        let result = advance(&self.state, turn);

        if let Some(declared) = result.refused_regression {
            tracing::warn!(
                current = %self.state.current_stage,
                declared = %declared,
                "Oracle declared an earlier stage, keeping current stage"
            );
        }
        if let Some(entered) = result.entered_stage {
            tracing::debug!(from = %self.state.current_stage, to = %entered, "Stage advanced");
        }

        self.state = result.new_state;
        self.state
    }

    /// Whether a new answer may be submitted.
    ///
    /// After completion, input is still accepted while the latest question on
    /// screen is multiple-choice, so a trailing MCQ can be answered.
    pub fn can_accept_input(&self, latest_question: Option<&str>) -> bool {
        if !self.state.is_session_completed {
            return true;
        }
        latest_question.is_some_and(looks_like_multiple_choice)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}
