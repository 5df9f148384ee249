//! Mock implementations for testing
//!
//! These mocks enable controller and manager tests without real I/O.

use super::traits::ConversationStore;
use crate::db::{Conversation, Message, NewMessage, TopicMeta};
use crate::oracle::{OracleError, OracleRequest, OracleTurnResult, TutorOracle};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Mock Oracle
// ============================================================================

/// Mock oracle that returns queued turns
pub struct MockOracle {
    responses: Mutex<VecDeque<Result<OracleTurnResult, OracleError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<OracleRequest>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful turn
    pub fn queue_turn(&self, turn: OracleTurnResult) {
        self.responses.lock().unwrap().push_back(Ok(turn));
    }

    /// Queue a failure
    pub fn queue_error(&self, error: OracleError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TutorOracle for MockOracle {
    async fn next_turn(&self, request: &OracleRequest) -> Result<OracleTurnResult, OracleError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::network("No mock turn queued")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Delayed Mock Oracle (for in-flight and timeout testing)
// ============================================================================

/// Mock oracle with a configurable delay
pub struct DelayedMockOracle {
    inner: MockOracle,
    delay: Duration,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl DelayedMockOracle {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockOracle::new(),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_turn(&self, turn: OracleTurnResult) {
        self.inner.queue_turn(turn);
    }
}

#[async_trait]
impl TutorOracle for DelayedMockOracle {
    async fn next_turn(&self, request: &OracleRequest) -> Result<OracleTurnResult, OracleError> {
        self.request_started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.next_turn(request).await
    }

    fn name(&self) -> &str {
        "delayed-mock"
    }
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// In-memory conversation store.
///
/// Timestamps advance one second per appended message so transcript order and
/// timestamp order always agree, independent of clock resolution.
pub struct MemoryStore {
    conversations: Mutex<HashMap<String, Conversation>>,
    messages: Mutex<HashMap<String, Vec<Message>>>,
    clock: Mutex<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
            clock: Mutex::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
        }
    }

    fn tick(&self) -> DateTime<Utc> {
        let mut clock = self.clock.lock().unwrap();
        *clock += ChronoDuration::seconds(1);
        *clock
    }

    /// Snapshot of a conversation's messages
    pub fn messages(&self, conv_id: &str) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap()
            .get(conv_id)
            .cloned()
            .unwrap_or_default()
    }

    fn ensure_conversation(&self, conv_id: &str, meta: &TopicMeta) -> Conversation {
        let now = self.tick();
        self.conversations
            .lock()
            .unwrap()
            .entry(conv_id.to_string())
            .or_insert_with(|| Conversation {
                id: conv_id.to_string(),
                meta: meta.clone(),
                created_at: now,
                updated_at: now,
                message_count: 0,
            })
            .clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create(&self, conv_id: &str, meta: &TopicMeta) -> Result<Conversation, String> {
        if self.conversations.lock().unwrap().contains_key(conv_id) {
            return Err(format!("Conversation already exists: {conv_id}"));
        }
        Ok(self.ensure_conversation(conv_id, meta))
    }

    async fn get_conversation(&self, conv_id: &str) -> Result<Option<Conversation>, String> {
        let count = self.messages(conv_id).len();
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .get(conv_id)
            .cloned()
            .map(|mut conv| {
                conv.message_count = i64::try_from(count).unwrap();
                conv
            }))
    }

    async fn list_conversations(&self, topic: Option<&str>) -> Result<Vec<Conversation>, String> {
        let mut convs: Vec<Conversation> = self
            .conversations
            .lock()
            .unwrap()
            .values()
            .filter(|c| topic.is_none_or(|t| c.meta.topic == t))
            .cloned()
            .collect();
        convs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(convs)
    }

    async fn load(&self, conv_id: &str) -> Result<Vec<Message>, String> {
        Ok(self.messages(conv_id))
    }

    async fn append(
        &self,
        conv_id: &str,
        message: &NewMessage,
        meta: &TopicMeta,
    ) -> Result<Message, String> {
        self.ensure_conversation(conv_id, meta);
        let now = self.tick();

        let mut messages = self.messages.lock().unwrap();
        let list = messages.entry(conv_id.to_string()).or_default();
        let stored = Message {
            message_id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conv_id.to_string(),
            sequence_id: i64::try_from(list.len()).unwrap() + 1,
            sender: message.sender,
            text: message.text.clone(),
            feedback: message.feedback.clone(),
            is_correct: message.is_correct,
            suggestions: message.suggestions.clone(),
            declared_next_stage: message.declared_next_stage,
            declared_stage_complete: message.declared_stage_complete,
            created_at: now,
            is_fallback: message.is_fallback,
        };
        list.push(stored.clone());

        if let Some(conv) = self.conversations.lock().unwrap().get_mut(conv_id) {
            conv.updated_at = now;
        }
        Ok(stored)
    }
}
