//! Session state rehydration
//!
//! Rebuilds a session's stage progress from its persisted transcript when a
//! conversation is reopened. No oracle calls are replayed.

use crate::db::Message;
use crate::stage::Stage;
use crate::state_machine::{SessionState, StageTracker};

/// Result of replaying a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rehydration {
    /// The state to resume with
    pub state: SessionState,
    /// Reason for the decision (for debugging)
    pub reason: RehydrationReason,
}

/// How the state was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RehydrationReason {
    /// No messages in conversation
    EmptyConversation,
    /// No AI message declares a stage
    NoStageBearingMessage,
    /// Transcript ends on an unanswered question that opened a new stage
    FreshStageQuestion,
    /// Answers within the restored stage were counted from the transcript
    ReplayedAnswers,
}

impl Rehydration {
    fn fresh(reason: RehydrationReason) -> Self {
        Self {
            state: SessionState::fresh(),
            reason,
        }
    }
}

/// Reconstruct a session state from an ordered message list.
///
/// The restored stage is the one declared by the last stage-bearing AI
/// message. Within that stage, an answer counts when a user message is
/// timestamped strictly after a pending, not-stage-complete question for the
/// stage. A question never followed by such an answer is not counted.
pub fn rehydrate(messages: &[Message]) -> Rehydration {
    let Some(last) = messages.last() else {
        return Rehydration::fresh(RehydrationReason::EmptyConversation);
    };

    let Some((restored_stage, restored_complete)) = messages
        .iter()
        .rev()
        .filter(|m| m.is_ai())
        .find_map(|m| {
            m.declared_next_stage
                .map(|stage| (stage, m.declared_stage_complete == Some(true)))
        })
    else {
        return Rehydration::fresh(RehydrationReason::NoStageBearingMessage);
    };

    let last_index = messages.len() - 1;
    let last_user_index = messages.iter().rposition(Message::is_user);
    let ends_on_fresh_stage_question = last.is_ai()
        && last_user_index.is_none_or(|user_index| last_index > user_index)
        && last.declared_stage_complete == Some(true);

    let (answered, reason) = if ends_on_fresh_stage_question {
        (0, RehydrationReason::FreshStageQuestion)
    } else {
        (
            count_answered(messages, restored_stage),
            RehydrationReason::ReplayedAnswers,
        )
    };

    let mut tracker = StageTracker::new();
    tracker.initialize(restored_stage, answered);
    let mut state = tracker.state();
    state.is_session_completed = restored_stage == Stage::Completed && restored_complete;

    Rehydration { state, reason }
}

fn count_answered(messages: &[Message], stage: Stage) -> u32 {
    let mut pending_asked_at = None;
    let mut answered = 0u32;

    for message in messages {
        if message.is_ai() {
            if message.declared_next_stage == Some(stage)
                && message.declared_stage_complete != Some(true)
            {
                pending_asked_at = Some(message.created_at);
            }
        } else if let Some(asked_at) = pending_asked_at {
            if message.created_at > asked_at {
                answered = answered.saturating_add(1);
                pending_asked_at = None;
            }
        }
    }

    answered
}
