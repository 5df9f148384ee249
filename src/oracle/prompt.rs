//! Prompt rendering for the LLM-backed oracle

use super::{HistoryEntry, OracleRequest};
use crate::db::Sender;
use crate::stage::Stage;
use std::fmt::Write;

/// Role and reply contract for the tutoring model
const BASE_PROMPT: &str = r#"You are a patient tutor running an interactive question-and-answer session on a single topic.

The session moves through four stages in order: initial_material, deeper_material, out_of_syllabus, completed. Ask one question at a time. When the student answers, grade the answer, give short feedback, then ask the next question.

Reply with a single JSON object and nothing else:
{
  "question_text": string,            // the next question, required
  "feedback_text": string | null,     // feedback on the student's last answer
  "is_answer_correct": bool | null,   // null when there was nothing to grade
  "suggestions": [string],            // optional study suggestions
  "declared_next_stage": string,      // stage the next question belongs to
  "declared_stage_complete": bool     // true when the previous stage's questions are exhausted
}

Multiple-choice questions list their options on separate lines as "A) ...", "B) ...", "C) ...", "D) ...".
When the out_of_syllabus stage is finished, declare "completed" with declared_stage_complete true and congratulate the student."#;

/// Build the system prompt, including the stage target table
pub fn build_system_prompt() -> String {
    let mut prompt = String::from(BASE_PROMPT);
    prompt.push_str("\n\nQuestions per stage before moving on:\n");
    for stage in Stage::ALL.into_iter().filter(|s| !s.is_terminal()) {
        let _ = writeln!(prompt, "- {}: {}", stage.as_str(), stage.target_questions());
    }
    prompt
}

/// Render the per-turn user message
pub fn build_turn_prompt(request: &OracleRequest) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "Topic: {}", request.topic.topic);
    if let Some(subject) = &request.topic.subject {
        let _ = writeln!(prompt, "Subject: {subject}");
    }
    if let Some(lesson) = &request.topic.lesson {
        let _ = writeln!(prompt, "Lesson: {lesson}");
    }
    let _ = writeln!(
        prompt,
        "Current stage: {} ({} of {} questions answered)",
        request.current_stage.as_str(),
        request.questions_asked_in_stage,
        request.current_stage.target_questions()
    );

    if !request.conversation_history_snippet.is_empty() {
        prompt.push_str("\nRecent conversation:\n");
        prompt.push_str(&render_history(&request.conversation_history_snippet));
    }

    match (&request.previous_question, &request.student_answer) {
        (Some(question), Some(answer)) => {
            let _ = write!(
                prompt,
                "\nPrevious question: {question}\nStudent answer: {answer}\n\nGrade the answer and ask the next question."
            );
        }
        (None, Some(answer)) => {
            let _ = write!(
                prompt,
                "\nStudent message: {answer}\n\nRespond and ask the next question."
            );
        }
        (_, None) => prompt.push_str("\nStart the session with the first question."),
    }

    prompt
}

fn render_history(history: &[HistoryEntry]) -> String {
    history.iter().fold(String::new(), |mut out, entry| {
        let role = match entry.sender {
            Sender::User => "Student",
            Sender::Ai => "Tutor",
        };
        let _ = writeln!(out, "{role}: {}", entry.text);
        out
    })
}
