//! API request and response types

use crate::db::{Conversation, TopicMeta};
use crate::stage::Stage;
use serde::{Deserialize, Serialize};

/// Request to start a Q&A session
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub topic: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub lesson: Option<String>,
}

impl CreateSessionRequest {
    pub fn into_meta(self) -> TopicMeta {
        let mut meta = TopicMeta::new(self.topic.trim());
        if let Some(subject) = self.subject {
            meta = meta.with_subject(subject);
        }
        if let Some(lesson) = self.lesson {
            meta = meta.with_lesson(lesson);
        }
        meta
    }
}

/// Request to submit an answer
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub text: String,
}

/// Query for the conversation history
#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub topic: Option<String>,
}

/// Response with a list of conversations
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub conversations: Vec<Conversation>,
}

/// One row of the stage table
#[derive(Debug, Serialize)]
pub struct StageInfo {
    pub stage: Stage,
    pub display_name: &'static str,
    pub target_questions: u32,
}

impl From<Stage> for StageInfo {
    fn from(stage: Stage) -> Self {
        Self {
            stage,
            display_name: stage.display_name(),
            target_questions: stage.target_questions(),
        }
    }
}

/// Response for the stage table
#[derive(Debug, Serialize)]
pub struct StagesResponse {
    pub stages: Vec<StageInfo>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
