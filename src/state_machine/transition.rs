//! Pure stage transition function
//!
//! Given the same state and oracle turn, `advance` always produces the same
//! result and performs no I/O.

use super::SessionState;
use crate::oracle::OracleTurnResult;
use crate::stage::Stage;

/// Result of applying one oracle turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub new_state: SessionState,
    /// Stage entered by this turn, if it differs from the previous one
    pub entered_stage: Option<Stage>,
    /// Earlier stage the oracle declared and that was refused
    pub refused_regression: Option<Stage>,
}

/// Apply an oracle turn to a session state.
///
/// Counter rules, with `prev` the stage before the turn:
/// - stage changed, stage-complete declared, new stage not `Completed`: reset to 0
/// - stage unchanged: +1, whether or not stage-complete was declared
/// - anything else (changed without stage-complete, or changed into
///   `Completed`): unchanged
///
/// A declared stage earlier than `prev` is refused and the turn is treated
/// as staying in `prev`.
pub fn advance(state: &SessionState, turn: &OracleTurnResult) -> TransitionResult {
    let prev = state.current_stage;
    let stage_complete = turn.declared_stage_complete.unwrap_or(false);

    let (next, refused_regression) = match turn.declared_next_stage {
        Some(declared) if declared < prev => (prev, Some(declared)),
        Some(declared) => (declared, None),
        None => (prev, None),
    };
    let stage_changed = next != prev;

    let questions_answered_in_stage = if stage_changed {
        if stage_complete && next != Stage::Completed {
            0
        } else {
            state.questions_answered_in_stage
        }
    } else {
        // Same increment with or without stage-complete; observed behaviour
        // of the tutoring flow, pending product clarification.
        state.questions_answered_in_stage.saturating_add(1)
    };

    let is_session_completed =
        state.is_session_completed || (next == Stage::Completed && stage_complete);

    TransitionResult {
        new_state: SessionState {
            current_stage: next,
            questions_answered_in_stage,
            is_session_completed,
        },
        entered_stage: stage_changed.then_some(next),
        refused_regression,
    }
}
