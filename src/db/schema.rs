//! Database schema and types

use crate::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    topic TEXT NOT NULL,
    subject TEXT,
    lesson TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_topic ON conversations(topic, subject, lesson);
CREATE INDEX IF NOT EXISTS idx_conversations_updated ON conversations(updated_at DESC);

CREATE TABLE IF NOT EXISTS messages (
    message_id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    sequence_id INTEGER NOT NULL,
    sender TEXT NOT NULL,
    text TEXT NOT NULL,
    feedback TEXT,
    is_correct BOOLEAN,
    suggestions TEXT,
    declared_next_stage TEXT,
    declared_stage_complete BOOLEAN,
    created_at TEXT NOT NULL,
    is_fallback BOOLEAN NOT NULL DEFAULT 0,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, sequence_id);
";

/// Metadata a conversation is keyed by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicMeta {
    pub topic: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub lesson: Option<String>,
}

impl TopicMeta {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            subject: None,
            lesson: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_lesson(mut self, lesson: impl Into<String>) -> Self {
        self.lesson = Some(lesson.into());
        self
    }
}

/// Conversation record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    pub id: String,
    #[serde(flatten)]
    pub meta: TopicMeta,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: i64,
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Ai => write!(f, "ai"),
        }
    }
}

impl Sender {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Sender::User),
            "ai" => Some(Sender::Ai),
            _ => None,
        }
    }
}

/// A message as it is handed to the store, before it gets an id and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender: Sender,
    pub text: String,
    pub feedback: Option<String>,
    pub is_correct: Option<bool>,
    pub suggestions: Vec<String>,
    pub declared_next_stage: Option<Stage>,
    pub declared_stage_complete: Option<bool>,
    /// Stand-in written when the oracle failed; never a question
    pub is_fallback: bool,
}

impl NewMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(Sender::User, text)
    }

    /// AI message with no grading or stage markers
    pub fn ai(text: impl Into<String>) -> Self {
        Self::plain(Sender::Ai, text)
    }

    /// AI message standing in for a turn the oracle could not produce
    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            is_fallback: true,
            ..Self::plain(Sender::Ai, text)
        }
    }

    fn plain(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            feedback: None,
            is_correct: None,
            suggestions: Vec::new(),
            declared_next_stage: None,
            declared_stage_complete: None,
            is_fallback: false,
        }
    }
}

/// Message record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub message_id: String,
    pub conversation_id: String,
    pub sequence_id: i64,
    pub sender: Sender,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_next_stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_stage_complete: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub is_fallback: bool,
}

impl Message {
    pub fn is_ai(&self) -> bool {
        self.sender == Sender::Ai
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// An AI message the oracle actually produced
    pub fn is_question(&self) -> bool {
        self.is_ai() && !self.is_fallback
    }
}
