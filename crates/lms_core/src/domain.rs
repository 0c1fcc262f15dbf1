//! crates/lms_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or web framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Users
//=========================================================================================

/// Represents a caller of the API. Authentication itself is handled upstream;
/// the backend only needs a stable identifier to attach ownership to.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Analysis pipeline
//=========================================================================================

/// One uploaded document held for a bounded retention window.
///
/// The `file_id` is the opaque handle callers use; it is assigned once at
/// upload and never changes. Extraction happens synchronously at upload, so
/// `extracted_text` is complete from the moment the record exists.
#[derive(Debug, Clone)]
pub struct AnalysisDocument {
    pub id: Uuid,
    pub file_id: String,
    pub owner_id: Uuid,
    pub metadata: serde_json::Value,
    pub extracted_text: String,
    pub page_count: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AnalysisDocument {
    /// A document is usable up to and including its expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// The kind of AI-assisted operation requested against a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Summarize,
    Explain,
    Answer,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Explain => "explain",
            Self::Answer => "answer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "summarize" => Some(Self::Summarize),
            "explain" => Some(Self::Explain),
            "answer" => Some(Self::Answer),
            _ => None,
        }
    }
}

/// Caller-supplied, task-specific parameters. Which fields are required
/// depends on the task kind; see [`crate::analysis::AnalysisTask`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summarize_length: Option<SummarizeLength>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizeLength {
    Short,
    #[default]
    Medium,
    Long,
}

/// How the analysis result content should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Text,
    Json,
    Bulleted,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Bulleted => "bulleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            "bulleted" => Some(Self::Bulleted),
            _ => None,
        }
    }
}

/// Request lifecycle. Transitions are monotonic and one-directional:
/// queued -> processing -> {done, error}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// A best-effort pointer from generated prose back into the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReference {
    pub page: u32,
    pub text_snippet: String,
}

/// The payload recorded when a request reaches `done`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub content: String,
    pub references: Vec<PageReference>,
}

/// One task (summarize/explain/answer) tracked against a document.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub id: Uuid,
    pub document_id: Uuid,
    pub owner_id: Uuid,
    pub task: TaskKind,
    pub task_options: TaskOptions,
    pub response_format: ResponseFormat,
    pub status: RequestStatus,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
    pub model_used: Option<String>,
    pub cost_estimate: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//=========================================================================================
// Quiz catalog
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Mixed,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

/// An immutable-after-creation ordered set of questions.
#[derive(Debug, Clone)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_count: i32,
    pub time_limit_minutes: i32,
    pub created_by: Uuid,
    pub join_code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question_text: String,
    pub points: i32,
    /// 1-based, contiguous display and advancement order.
    pub position: i32,
}

#[derive(Debug, Clone)]
pub struct QuizChoice {
    pub id: Uuid,
    pub question_id: Uuid,
    pub choice_text: String,
    pub is_correct: bool,
    pub position: i32,
}

/// A question together with its ordered choices, as read back from storage.
#[derive(Debug, Clone)]
pub struct QuestionWithChoices {
    pub question: QuizQuestion,
    pub choices: Vec<QuizChoice>,
}

//=========================================================================================
// Live quiz sessions
//=========================================================================================

/// A hosted, joinable round-based run of a quiz.
///
/// The topic/difficulty/question-count fields are snapshots copied from the
/// quiz at creation time, never re-derived.
#[derive(Debug, Clone)]
pub struct LiveSession {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub room_code: String,
    pub host_id: Uuid,
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_count: i32,
    pub is_active: bool,
    pub current_question_index: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A user's membership and running score within one live session.
#[derive(Debug, Clone)]
pub struct LiveParticipant {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub score: i32,
    pub joined_at: DateTime<Utc>,
}

/// A leaderboard row, ordered by descending score at query time.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub display_name: String,
    pub score: i32,
}

/// The outcome of submitting a live answer.
#[derive(Debug, Clone, Copy)]
pub struct AnswerOutcome {
    pub correct: bool,
    /// The participant's score after this submission.
    pub score: i32,
    /// False when the participant had already answered this question; repeat
    /// submissions never change the score.
    pub counted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn doc_expiring_at(expires_at: DateTime<Utc>) -> AnalysisDocument {
        AnalysisDocument {
            id: Uuid::new_v4(),
            file_id: Uuid::new_v4().to_string(),
            owner_id: Uuid::new_v4(),
            metadata: serde_json::json!({}),
            extracted_text: String::new(),
            page_count: 0,
            created_at: expires_at - Duration::hours(1),
            expires_at,
        }
    }

    #[test]
    fn document_is_usable_until_exactly_its_expiry_instant() {
        let expiry = Utc::now();
        let doc = doc_expiring_at(expiry);

        assert!(!doc.is_expired(expiry - Duration::seconds(1)));
        assert!(!doc.is_expired(expiry));
        assert!(doc.is_expired(expiry + Duration::milliseconds(1)));
    }

    #[test]
    fn status_round_trips_through_storage_strings() {
        for status in [
            RequestStatus::Queued,
            RequestStatus::Processing,
            RequestStatus::Done,
            RequestStatus::Error,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::parse("cancelled"), None);
    }

    #[test]
    fn only_done_and_error_are_terminal() {
        assert!(!RequestStatus::Queued.is_terminal());
        assert!(!RequestStatus::Processing.is_terminal());
        assert!(RequestStatus::Done.is_terminal());
        assert!(RequestStatus::Error.is_terminal());
    }

    #[test]
    fn analysis_result_serializes_task_kind_under_type_key() {
        let result = AnalysisResult {
            kind: TaskKind::Summarize,
            content: "short".to_string(),
            references: vec![],
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "summarize");
    }
}
