//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the controller with mock implementations.

use crate::db::{Conversation, Database, Message, NewMessage, TopicMeta};
use async_trait::async_trait;
use std::sync::Arc;

/// Ordered message storage per conversation
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create an empty conversation
    async fn create(&self, conv_id: &str, meta: &TopicMeta) -> Result<Conversation, String>;

    /// Get conversation metadata, `None` if it does not exist
    async fn get_conversation(&self, conv_id: &str) -> Result<Option<Conversation>, String>;

    /// List conversations, optionally restricted to one topic
    async fn list_conversations(&self, topic: Option<&str>) -> Result<Vec<Conversation>, String>;

    /// All messages of a conversation, in order
    async fn load(&self, conv_id: &str) -> Result<Vec<Message>, String>;

    /// Append a message; the conversation is created from `meta` if missing
    async fn append(
        &self,
        conv_id: &str,
        message: &NewMessage,
        meta: &TopicMeta,
    ) -> Result<Message, String>;
}

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn create(&self, conv_id: &str, meta: &TopicMeta) -> Result<Conversation, String> {
        (**self).create(conv_id, meta).await
    }

    async fn get_conversation(&self, conv_id: &str) -> Result<Option<Conversation>, String> {
        (**self).get_conversation(conv_id).await
    }

    async fn list_conversations(&self, topic: Option<&str>) -> Result<Vec<Conversation>, String> {
        (**self).list_conversations(topic).await
    }

    async fn load(&self, conv_id: &str) -> Result<Vec<Message>, String> {
        (**self).load(conv_id).await
    }

    async fn append(
        &self,
        conv_id: &str,
        message: &NewMessage,
        meta: &TopicMeta,
    ) -> Result<Message, String> {
        (**self).append(conv_id, message, meta).await
    }
}

// ============================================================================
// Production Adapter
// ============================================================================

/// Adapter to use Database as a `ConversationStore`
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationStore for DatabaseStorage {
    async fn create(&self, conv_id: &str, meta: &TopicMeta) -> Result<Conversation, String> {
        self.db
            .create_conversation(conv_id, meta)
            .map_err(|e| e.to_string())
    }

    async fn get_conversation(&self, conv_id: &str) -> Result<Option<Conversation>, String> {
        match self.db.get_conversation(conv_id) {
            Ok(conv) => Ok(Some(conv)),
            Err(crate::db::DbError::ConversationNotFound(_)) => Ok(None),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn list_conversations(&self, topic: Option<&str>) -> Result<Vec<Conversation>, String> {
        self.db.list_conversations(topic).map_err(|e| e.to_string())
    }

    async fn load(&self, conv_id: &str) -> Result<Vec<Message>, String> {
        self.db.get_messages(conv_id).map_err(|e| e.to_string())
    }

    async fn append(
        &self,
        conv_id: &str,
        message: &NewMessage,
        meta: &TopicMeta,
    ) -> Result<Message, String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.db
            .add_message(&id, conv_id, message, meta)
            .map_err(|e| e.to_string())
    }
}
