//! Oracle request and turn types

use super::OracleError;
use crate::db::{Sender, TopicMeta};
use crate::stage::Stage;
use serde::{Deserialize, Deserializer, Serialize};

/// Everything the oracle needs to produce the next turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleRequest {
    pub current_stage: Stage,
    pub questions_asked_in_stage: u32,
    /// Absent when asking for the opening question
    pub student_answer: Option<String>,
    pub previous_question: Option<String>,
    /// Trailing window of the transcript, oldest first
    pub conversation_history_snippet: Vec<HistoryEntry>,
    pub topic: TopicMeta,
}

/// One transcript line handed to the oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub sender: Sender,
    pub text: String,
}

/// Output of one oracle call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleTurnResult {
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub feedback_text: Option<String>,
    /// `None` when correctness is unknown or there was nothing to grade
    #[serde(default)]
    pub is_answer_correct: Option<bool>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, deserialize_with = "lenient_stage")]
    pub declared_next_stage: Option<Stage>,
    #[serde(default)]
    pub declared_stage_complete: Option<bool>,
}

impl OracleTurnResult {
    /// A bare question with nothing else declared
    pub fn question(text: impl Into<String>) -> Self {
        Self {
            question_text: text.into(),
            feedback_text: None,
            is_answer_correct: None,
            suggestions: Vec::new(),
            declared_next_stage: None,
            declared_stage_complete: None,
        }
    }

    pub fn with_stage(mut self, stage: Stage, stage_complete: bool) -> Self {
        self.declared_next_stage = Some(stage);
        self.declared_stage_complete = Some(stage_complete);
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>, correct: Option<bool>) -> Self {
        self.feedback_text = Some(feedback.into());
        self.is_answer_correct = correct;
        self
    }

    /// Shape check. Pedagogical content is trusted as-is.
    pub fn validate(self) -> Result<Self, OracleError> {
        if self.question_text.trim().is_empty() {
            return Err(OracleError::malformed("Oracle reply is missing question_text"));
        }
        Ok(self)
    }
}

fn lenient_stage<'de, D>(deserializer: D) -> Result<Option<Stage>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| s.parse::<Stage>().map_err(serde::de::Error::custom))
        .transpose()
}
