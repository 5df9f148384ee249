//! Database module
//!
//! SQLite persistence for conversations and their transcripts.

mod schema;

pub use schema::*;

use crate::stage::Stage;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

#[derive(Error, Debug)]
#[error("Unknown sender: {0}")]
struct UnknownSender(String);

const CONVERSATION_COLUMNS: &str = "c.id, c.topic, c.subject, c.lesson, c.created_at, c.updated_at,
    (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id) AS message_count";

const MESSAGE_COLUMNS: &str = "message_id, conversation_id, sequence_id, sender, text, feedback, is_correct,
    suggestions, declared_next_stage, declared_stage_complete, created_at, is_fallback";

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        // Databases created before fallback messages were flagged (ignore error if already done)
        let _ = conn.execute(
            "ALTER TABLE messages ADD COLUMN is_fallback BOOLEAN NOT NULL DEFAULT 0",
            [],
        );
        Ok(())
    }

    // ==================== Conversation Operations ====================

    /// Create a new conversation
    pub fn create_conversation(&self, id: &str, meta: &TopicMeta) -> DbResult<Conversation> {
        let conn = self.conn()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO conversations (id, topic, subject, lesson, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, meta.topic, meta.subject, meta.lesson, now.to_rfc3339()],
        )?;

        Ok(Conversation {
            id: id.to_string(),
            meta: meta.clone(),
            created_at: now,
            updated_at: now,
            message_count: 0,
        })
    }

    /// Get conversation by ID
    pub fn get_conversation(&self, id: &str) -> DbResult<Conversation> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = ?1"
        ))?;

        stmt.query_row(params![id], row_to_conversation)
            .optional()?
            .ok_or_else(|| DbError::ConversationNotFound(id.to_string()))
    }

    /// List conversations, most recently active first, optionally for one topic
    pub fn list_conversations(&self, topic: Option<&str>) -> DbResult<Vec<Conversation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c
             WHERE ?1 IS NULL OR c.topic = ?1
             ORDER BY c.updated_at DESC"
        ))?;

        let rows = stmt.query_map(params![topic], row_to_conversation)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== Message Operations ====================

    /// Append a message, creating the conversation from `meta` if it does not exist yet
    pub fn add_message(
        &self,
        message_id: &str,
        conversation_id: &str,
        message: &NewMessage,
        meta: &TopicMeta,
    ) -> DbResult<Message> {
        let mut conn = self.conn()?;
        let now = Utc::now();
        // Conversation row, message and timestamp land together or not at all
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO conversations (id, topic, subject, lesson, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![conversation_id, meta.topic, meta.subject, meta.lesson, now.to_rfc3339()],
        )?;

        // Get next sequence ID
        let sequence_id: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sequence_id), 0) + 1 FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?;

        let suggestions = if message.suggestions.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&message.suggestions)?)
        };

        tx.execute(
            &format!(
                "INSERT INTO messages ({MESSAGE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                message_id,
                conversation_id,
                sequence_id,
                message.sender.to_string(),
                message.text,
                message.feedback,
                message.is_correct,
                suggestions,
                message.declared_next_stage.map(Stage::as_str),
                message.declared_stage_complete,
                now.to_rfc3339(),
                message.is_fallback,
            ],
        )?;

        // Update conversation timestamp
        tx.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), conversation_id],
        )?;
        tx.commit()?;

        Ok(Message {
            message_id: message_id.to_string(),
            conversation_id: conversation_id.to_string(),
            sequence_id,
            sender: message.sender,
            text: message.text.clone(),
            feedback: message.feedback.clone(),
            is_correct: message.is_correct,
            suggestions: message.suggestions.clone(),
            declared_next_stage: message.declared_next_stage,
            declared_stage_complete: message.declared_stage_complete,
            created_at: now,
            is_fallback: message.is_fallback,
        })
    }

    /// Get messages for a conversation in sequence order
    pub fn get_messages(&self, conversation_id: &str) -> DbResult<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = ?1 ORDER BY sequence_id ASC"
        ))?;

        let rows = stmt.query_map(params![conversation_id], row_to_message)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

fn row_to_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        meta: TopicMeta {
            topic: row.get(1)?,
            subject: row.get(2)?,
            lesson: row.get(3)?,
        },
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
        message_count: row.get(6)?,
    })
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let sender_str: String = row.get(3)?;
    let sender = Sender::parse(&sender_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            Box::new(UnknownSender(sender_str.clone())),
        )
    })?;

    let suggestions = row
        .get::<_, Option<String>>(7)?
        .map(|json| serde_json::from_str::<Vec<String>>(&json))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?
        .unwrap_or_default();

    let declared_next_stage = row
        .get::<_, Option<String>>(8)?
        .map(|s| s.parse::<Stage>())
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        message_id: row.get(0)?,
        conversation_id: row.get(1)?,
        sequence_id: row.get(2)?,
        sender,
        text: row.get(4)?,
        feedback: row.get(5)?,
        is_correct: row.get(6)?,
        suggestions,
        declared_next_stage,
        declared_stage_complete: row.get(9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?),
        is_fallback: row.get(11)?,
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
