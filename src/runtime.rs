//! Runtime for driving tutoring sessions
//!
//! `SessionManager` owns one controller per open conversation and keeps at
//! most one turn in flight for each.

mod controller;
mod rehydrate;
pub mod traits;

#[cfg(test)]
pub mod testing;

#[allow(unused_imports)] // Public API re-exports
pub use controller::{
    Notice, NoticeLevel, SessionController, SessionSettings, TurnOutcome, TOPIC_COMPLETED_NOTICE,
};
pub use traits::*;

use crate::db::{Conversation, Message, TopicMeta};
use crate::oracle::TutorOracle;
use crate::state_machine::SessionState;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Conversation not found: {0}")]
    NotFound(String),
    #[error("A previous answer is still being processed")]
    Busy,
    #[error("Answer text is empty")]
    EmptyAnswer,
}

/// Snapshot of a session for display
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub conversation: Conversation,
    pub state: SessionState,
    pub can_accept_input: bool,
    pub messages: Vec<Message>,
}

/// Snapshot returned after creating or resetting a session
#[derive(Debug, Clone, Serialize)]
pub struct StartedSession {
    #[serde(flatten)]
    pub view: SessionView,
    /// Set when the opening question could not be produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

/// Outcome of a submitted answer plus the resulting input gate
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    #[serde(flatten)]
    pub outcome: TurnOutcome,
    pub can_accept_input: bool,
}

type ControllerHandle<S, O> = Arc<Mutex<SessionController<S, O>>>;

/// Manager for all open sessions
pub struct SessionManager<S, O>
where
    S: ConversationStore + Clone + 'static,
    O: TutorOracle + Clone + 'static,
{
    store: S,
    oracle: O,
    settings: SessionSettings,
    sessions: RwLock<HashMap<String, ControllerHandle<S, O>>>,
}

impl<S, O> SessionManager<S, O>
where
    S: ConversationStore + Clone + 'static,
    O: TutorOracle + Clone + 'static,
{
    pub fn new(store: S, oracle: O, settings: SessionSettings) -> Self {
        Self {
            store,
            oracle,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a conversation and ask its opening question
    pub async fn create_session(&self, meta: TopicMeta) -> Result<StartedSession, RuntimeError> {
        let conv_id = uuid::Uuid::new_v4().to_string();
        self.store
            .create(&conv_id, &meta)
            .await
            .map_err(RuntimeError::Storage)?;

        tracing::info!(conv_id = %conv_id, topic = %meta.topic, "Created session");

        let mut controller = SessionController::new(
            conv_id.clone(),
            meta,
            self.store.clone(),
            self.oracle.clone(),
            self.settings,
        );
        let notice = controller
            .start()
            .await?
            .and_then(|outcome| outcome.notice().cloned());
        let view = self.view_of(&controller).await?;

        self.sessions
            .write()
            .await
            .insert(conv_id, Arc::new(Mutex::new(controller)));

        Ok(StartedSession { view, notice })
    }

    /// Open a conversation, rehydrating it if it is not loaded yet.
    ///
    /// Waits for an in-flight turn to finish.
    pub async fn open_session(&self, conv_id: &str) -> Result<SessionView, RuntimeError> {
        let handle = self.get_or_resume(conv_id).await?;
        let controller = handle.lock().await;
        self.view_of(&controller).await
    }

    /// Submit an answer. Rejected with `Busy` while a turn is in flight.
    pub async fn submit_answer(
        &self,
        conv_id: &str,
        answer: &str,
    ) -> Result<TurnReport, RuntimeError> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(RuntimeError::EmptyAnswer);
        }

        let handle = self.get_or_resume(conv_id).await?;
        let Ok(mut controller) = handle.try_lock() else {
            tracing::debug!(conv_id = %conv_id, "Submission rejected, turn in flight");
            return Err(RuntimeError::Busy);
        };
        let outcome = controller.handle_answer(answer).await?;
        Ok(TurnReport {
            outcome,
            can_accept_input: controller.can_accept_input(),
        })
    }

    /// Start a new conversation on the same topic as an existing one
    pub async fn reset_session(&self, conv_id: &str) -> Result<StartedSession, RuntimeError> {
        let conversation = self.require_conversation(conv_id).await?;
        self.sessions.write().await.remove(conv_id);
        tracing::info!(conv_id = %conv_id, "Resetting session");
        self.create_session(conversation.meta).await
    }

    pub async fn list_conversations(
        &self,
        topic: Option<&str>,
    ) -> Result<Vec<Conversation>, RuntimeError> {
        self.store
            .list_conversations(topic)
            .await
            .map_err(RuntimeError::Storage)
    }

    async fn get_or_resume(&self, conv_id: &str) -> Result<ControllerHandle<S, O>, RuntimeError> {
        if let Some(handle) = self.sessions.read().await.get(conv_id) {
            return Ok(handle.clone());
        }

        let conversation = self.require_conversation(conv_id).await?;
        let controller = SessionController::resume(
            &conversation,
            self.store.clone(),
            self.oracle.clone(),
            self.settings,
        )
        .await?;

        // Another request may have resumed it meanwhile; keep the first
        let handle = self
            .sessions
            .write()
            .await
            .entry(conv_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(controller)))
            .clone();
        Ok(handle)
    }

    async fn require_conversation(&self, conv_id: &str) -> Result<Conversation, RuntimeError> {
        self.store
            .get_conversation(conv_id)
            .await
            .map_err(RuntimeError::Storage)?
            .ok_or_else(|| RuntimeError::NotFound(conv_id.to_string()))
    }

    async fn view_of(
        &self,
        controller: &SessionController<S, O>,
    ) -> Result<SessionView, RuntimeError> {
        let conversation = self.require_conversation(controller.conversation_id()).await?;
        Ok(SessionView {
            conversation,
            state: controller.state(),
            can_accept_input: controller.can_accept_input(),
            messages: controller.messages().to_vec(),
        })
    }
}
