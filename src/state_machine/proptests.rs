//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible oracle turns.

use super::*;
use crate::oracle::OracleTurnResult;
use crate::stage::Stage;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_stage() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::InitialMaterial),
        Just(Stage::DeeperMaterial),
        Just(Stage::OutOfSyllabus),
        Just(Stage::Completed),
    ]
}

fn arb_turn() -> impl Strategy<Value = OracleTurnResult> {
    (
        "[a-zA-Z ?]{1,40}",
        proptest::option::of(arb_stage()),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(|(text, stage, complete)| OracleTurnResult {
            declared_next_stage: stage,
            declared_stage_complete: complete,
            ..OracleTurnResult::question(text)
        })
}

fn arb_state() -> impl Strategy<Value = SessionState> {
    (arb_stage(), 0u32..10, any::<bool>()).prop_map(|(stage, answered, completed)| {
        SessionState {
            current_stage: stage,
            questions_answered_in_stage: answered,
            // Completion is only ever reached through the Completed stage
            is_session_completed: completed && stage == Stage::Completed,
        }
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// The stage never moves backwards, whatever the oracle declares
    #[test]
    fn prop_stage_is_monotonic(turns in proptest::collection::vec(arb_turn(), 0..30)) {
        let mut tracker = StageTracker::new();
        let mut prev = tracker.state();
        for turn in &turns {
            let next = tracker.advance(turn);
            prop_assert!(next.current_stage >= prev.current_stage);
            prev = next;
        }
    }

    /// The counter only grows by one, resets to zero, or stays put
    #[test]
    fn prop_counter_steps(state in arb_state(), turn in arb_turn()) {
        let before = state.questions_answered_in_stage;
        let after = advance(&state, &turn).new_state.questions_answered_in_stage;
        prop_assert!(after == 0 || after == before || after == before + 1);
    }

    /// The counter saturates instead of overflowing
    #[test]
    fn prop_counter_saturates(stage in arb_stage(), turn in arb_turn()) {
        let state = SessionState::at(stage, u32::MAX);
        let result = advance(&state, &turn);
        let after = result.new_state.questions_answered_in_stage;
        prop_assert!(after == 0 || after == u32::MAX);
    }

    /// Once completed, a session stays completed
    #[test]
    fn prop_completion_is_sticky(turns in proptest::collection::vec(arb_turn(), 0..30)) {
        let mut tracker = StageTracker::new();
        let mut completed = false;
        for turn in &turns {
            let state = tracker.advance(turn);
            if completed {
                prop_assert!(state.is_session_completed);
            }
            completed = state.is_session_completed;
        }
    }

    /// Completion implies the Completed stage
    #[test]
    fn prop_completion_implies_completed_stage(turns in proptest::collection::vec(arb_turn(), 0..30)) {
        let mut tracker = StageTracker::new();
        for turn in &turns {
            let state = tracker.advance(turn);
            if state.is_session_completed {
                prop_assert_eq!(state.current_stage, Stage::Completed);
            }
        }
    }

    /// Refused regressions leave the stage where it was
    #[test]
    fn prop_regression_is_refused(state in arb_state(), turn in arb_turn()) {
        let result = advance(&state, &turn);
        if let Some(refused) = result.refused_regression {
            prop_assert!(refused < state.current_stage);
            prop_assert_eq!(result.new_state.current_stage, state.current_stage);
            prop_assert!(result.entered_stage.is_none());
        }
    }

    /// Transitions are pure
    #[test]
    fn prop_advance_is_deterministic(state in arb_state(), turn in arb_turn()) {
        prop_assert_eq!(advance(&state, &turn), advance(&state, &turn));
    }

    /// An open session always accepts input
    #[test]
    fn prop_open_session_accepts_input(
        turns in proptest::collection::vec(arb_turn(), 0..10),
        latest in proptest::option::of("[a-zA-Z ?]{0,40}"),
    ) {
        let mut tracker = StageTracker::new();
        for turn in &turns {
            tracker.advance(turn);
        }
        if !tracker.state().is_session_completed {
            prop_assert!(tracker.can_accept_input(latest.as_deref()));
        }
    }

    /// A completed session accepts input exactly when the latest question is multiple choice
    #[test]
    fn prop_completed_session_gates_on_mcq(latest in "[a-zA-Z .)?\n]{0,60}") {
        let tracker = StageTracker::from_state(SessionState::at(Stage::Completed, 0));
        prop_assert_eq!(
            tracker.can_accept_input(Some(&latest)),
            looks_like_multiple_choice(&latest)
        );
    }
}
