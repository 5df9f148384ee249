//! Session controller
//!
//! Drives one conversation's turns: gates input, calls the oracle, advances
//! the stage tracker and appends the transcript.

use super::rehydrate::rehydrate;
use super::traits::ConversationStore;
use super::RuntimeError;
use crate::db::{Conversation, Message, NewMessage, TopicMeta};
use crate::oracle::{
    HistoryEntry, OracleConfig, OracleError, OracleRequest, OracleTurnResult, TutorOracle,
};
use crate::state_machine::{SessionState, StageTracker};
use serde::Serialize;
use std::time::Duration;

/// Shown when input arrives after the session is complete
pub const TOPIC_COMPLETED_NOTICE: &str =
    "You've completed this topic. Start a new Q&A on this topic to keep practising.";

/// Per-session tuning taken from the oracle configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub oracle_timeout: Duration,
    pub history_window: usize,
}

impl From<&OracleConfig> for SessionSettings {
    fn from(config: &OracleConfig) -> Self {
        Self {
            oracle_timeout: config.timeout,
            history_window: config.history_window,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&OracleConfig::default())
    }
}

/// Non-blocking, toast-style message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// What happened to one submitted turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The oracle replied; `messages` are the entries appended this turn
    Asked {
        state: SessionState,
        messages: Vec<Message>,
    },
    /// Input was not accepted; nothing was appended
    Rejected { state: SessionState, notice: Notice },
    /// The oracle failed; a synthetic AI message was appended, state untouched
    OracleFailed {
        state: SessionState,
        messages: Vec<Message>,
        notice: Notice,
    },
}

impl TurnOutcome {
    pub fn state(&self) -> SessionState {
        match self {
            TurnOutcome::Asked { state, .. }
            | TurnOutcome::Rejected { state, .. }
            | TurnOutcome::OracleFailed { state, .. } => *state,
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        match self {
            TurnOutcome::Asked { .. } => None,
            TurnOutcome::Rejected { notice, .. } | TurnOutcome::OracleFailed { notice, .. } => {
                Some(notice)
            }
        }
    }

    pub fn messages(&self) -> &[Message] {
        match self {
            TurnOutcome::Asked { messages, .. } | TurnOutcome::OracleFailed { messages, .. } => {
                messages
            }
            TurnOutcome::Rejected { .. } => &[],
        }
    }
}

/// Controller for one conversation.
///
/// Methods that run a turn take `&mut self`, so at most one turn is in flight
/// per controller.
pub struct SessionController<S, O>
where
    S: ConversationStore,
    O: TutorOracle,
{
    conversation_id: String,
    meta: TopicMeta,
    tracker: StageTracker,
    /// Local copy of the persisted transcript
    transcript: Vec<Message>,
    store: S,
    oracle: O,
    settings: SessionSettings,
}

impl<S, O> SessionController<S, O>
where
    S: ConversationStore,
    O: TutorOracle,
{
    /// Controller for a brand-new conversation at `(InitialMaterial, 0)`
    pub fn new(
        conversation_id: impl Into<String>,
        meta: TopicMeta,
        store: S,
        oracle: O,
        settings: SessionSettings,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            meta,
            tracker: StageTracker::new(),
            transcript: Vec::new(),
            store,
            oracle,
            settings,
        }
    }

    /// Reopen an existing conversation, rebuilding its state from the transcript
    pub async fn resume(
        conversation: &Conversation,
        store: S,
        oracle: O,
        settings: SessionSettings,
    ) -> Result<Self, RuntimeError> {
        let transcript = store
            .load(&conversation.id)
            .await
            .map_err(RuntimeError::Storage)?;
        let rehydration = rehydrate(&transcript);

        tracing::info!(
            conv_id = %conversation.id,
            stage = %rehydration.state.current_stage,
            answered = rehydration.state.questions_answered_in_stage,
            completed = rehydration.state.is_session_completed,
            reason = ?rehydration.reason,
            "Rehydrated session"
        );

        Ok(Self {
            conversation_id: conversation.id.clone(),
            meta: conversation.meta.clone(),
            tracker: StageTracker::from_state(rehydration.state),
            transcript,
            store,
            oracle,
            settings,
        })
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn state(&self) -> SessionState {
        self.tracker.state()
    }

    pub fn messages(&self) -> &[Message] {
        &self.transcript
    }

    /// Text of the question currently on screen. Fallback messages written
    /// for failed oracle calls are skipped.
    pub fn latest_question(&self) -> Option<&str> {
        self.transcript
            .iter()
            .rev()
            .find(|m| m.is_question())
            .map(|m| m.text.as_str())
    }

    pub fn can_accept_input(&self) -> bool {
        self.tracker.can_accept_input(self.latest_question())
    }

    /// Ask the opening question of an empty conversation.
    ///
    /// The tracker is not advanced: no answer has been given yet. Returns
    /// `None` if the conversation already has messages.
    pub async fn start(&mut self) -> Result<Option<TurnOutcome>, RuntimeError> {
        if !self.transcript.is_empty() {
            return Ok(None);
        }

        let request = self.build_request(None);
        match self.call_oracle(&request).await {
            Ok(turn) => {
                let ai_message = self.append(&turn_message(&turn)).await?;
                tracing::info!(conv_id = %self.conversation_id, "Session started");
                Ok(Some(TurnOutcome::Asked {
                    state: self.state(),
                    messages: vec![ai_message],
                }))
            }
            Err(e) => self.record_failure(&e, Vec::new()).await.map(Some),
        }
    }

    /// Handle one submitted answer
    pub async fn handle_answer(&mut self, answer: &str) -> Result<TurnOutcome, RuntimeError> {
        if !self.can_accept_input() {
            tracing::debug!(conv_id = %self.conversation_id, "Input rejected, session completed");
            return Ok(TurnOutcome::Rejected {
                state: self.state(),
                notice: Notice::info(TOPIC_COMPLETED_NOTICE),
            });
        }

        let request = self.build_request(Some(answer));
        let user_message = self.append(&NewMessage::user(answer)).await?;

        match self.call_oracle(&request).await {
            Ok(turn) => {
                let prev = self.state();
                let state = self.tracker.advance(&turn);
                // Persist what the oracle declared, not the tracker snapshot
                let ai_message = self.append(&turn_message(&turn)).await?;

                tracing::info!(
                    conv_id = %self.conversation_id,
                    from = %prev.current_stage,
                    stage = %state.current_stage,
                    answered = state.questions_answered_in_stage,
                    completed = state.is_session_completed,
                    "Turn completed"
                );

                Ok(TurnOutcome::Asked {
                    state,
                    messages: vec![user_message, ai_message],
                })
            }
            Err(e) => self.record_failure(&e, vec![user_message]).await,
        }
    }

    async fn call_oracle(&self, request: &OracleRequest) -> Result<OracleTurnResult, OracleError> {
        let timeout = self.settings.oracle_timeout;
        match tokio::time::timeout(timeout, self.oracle.next_turn(request)).await {
            Ok(result) => result.and_then(OracleTurnResult::validate),
            Err(_) => Err(OracleError::timed_out(timeout)),
        }
    }

    /// Append a synthetic AI message for a failed oracle call. State is untouched.
    async fn record_failure(
        &mut self,
        error: &OracleError,
        mut messages: Vec<Message>,
    ) -> Result<TurnOutcome, RuntimeError> {
        tracing::warn!(
            conv_id = %self.conversation_id,
            error = %error,
            kind = ?error.kind,
            "Oracle call failed, session state unchanged"
        );

        let fallback = NewMessage::fallback(format!(
            "Sorry, I couldn't prepare the next question ({error}). Please submit your answer again."
        ));
        messages.push(self.append(&fallback).await?);

        Ok(TurnOutcome::OracleFailed {
            state: self.state(),
            messages,
            notice: Notice::error("The tutor is unavailable right now. Please try again."),
        })
    }

    fn build_request(&self, answer: Option<&str>) -> OracleRequest {
        let state = self.state();
        let start = self
            .transcript
            .len()
            .saturating_sub(self.settings.history_window);

        OracleRequest {
            current_stage: state.current_stage,
            questions_asked_in_stage: state.questions_answered_in_stage,
            student_answer: answer.map(String::from),
            previous_question: self.latest_question().map(String::from),
            conversation_history_snippet: self.transcript[start..]
                .iter()
                .map(|m| HistoryEntry {
                    sender: m.sender,
                    text: m.text.clone(),
                })
                .collect(),
            topic: self.meta.clone(),
        }
    }

    async fn append(&mut self, message: &NewMessage) -> Result<Message, RuntimeError> {
        let stored = self
            .store
            .append(&self.conversation_id, message, &self.meta)
            .await
            .map_err(RuntimeError::Storage)?;
        self.transcript.push(stored.clone());
        Ok(stored)
    }
}

fn turn_message(turn: &OracleTurnResult) -> NewMessage {
    NewMessage {
        feedback: turn.feedback_text.clone(),
        is_correct: turn.is_answer_correct,
        suggestions: turn.suggestions.clone(),
        declared_next_stage: turn.declared_next_stage,
        declared_stage_complete: turn.declared_stage_complete,
        ..NewMessage::ai(turn.question_text.clone())
    }
}
