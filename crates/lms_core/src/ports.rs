//! crates/lms_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases
//! or hosted AI APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::analysis::ExtractedPage;
use crate::domain::{
    AnalysisDocument, AnalysisRequest, AnalysisResult, AnswerOutcome, Difficulty,
    LeaderboardEntry, LiveParticipant, LiveSession, QuestionWithChoices, Quiz, QuizChoice,
    QuizQuestion, ResponseFormat, TaskKind, TaskOptions, User,
};
use crate::quiz::GeneratedQuestion;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflicting state: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Write Models
//=========================================================================================

/// Everything needed to persist a freshly uploaded document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub file_id: String,
    pub owner_id: Uuid,
    pub metadata: serde_json::Value,
    pub extracted_text: String,
    pub page_count: i32,
    pub expires_at: DateTime<Utc>,
}

/// Everything needed to persist a new analysis request in state `queued`.
#[derive(Debug, Clone)]
pub struct NewAnalysisRequest {
    pub document_id: Uuid,
    pub owner_id: Uuid,
    pub task: TaskKind,
    pub task_options: TaskOptions,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone)]
pub struct NewChoice {
    pub choice_text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question_text: String,
    pub points: i32,
    pub choices: Vec<NewChoice>,
}

/// A fully assembled quiz ready for one-shot transactional persistence.
/// Question positions are assigned 1..N from the vector order.
#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_count: i32,
    pub time_limit_minutes: i32,
    pub created_by: Uuid,
    pub join_code: String,
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Clone)]
pub struct NewLiveSession {
    pub quiz_id: Uuid,
    pub room_code: String,
    pub host_id: Uuid,
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_count: i32,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn get_or_create_user(&self, user_id: Uuid) -> PortResult<User>;

    // --- Document Store ---
    async fn create_document(&self, new: NewDocument) -> PortResult<AnalysisDocument>;

    async fn get_document(&self, document_id: Uuid) -> PortResult<AnalysisDocument>;

    async fn get_document_for_owner(
        &self,
        file_id: &str,
        owner_id: Uuid,
    ) -> PortResult<AnalysisDocument>;

    /// The caller's documents, newest first.
    async fn list_documents_for_owner(&self, owner_id: Uuid)
        -> PortResult<Vec<AnalysisDocument>>;

    async fn find_expired_documents(
        &self,
        now: DateTime<Utc>,
    ) -> PortResult<Vec<AnalysisDocument>>;

    async fn delete_document(&self, document_id: Uuid) -> PortResult<()>;

    // --- Analysis Request Tracker ---
    async fn create_request(&self, new: NewAnalysisRequest) -> PortResult<AnalysisRequest>;

    async fn get_request(&self, request_id: Uuid) -> PortResult<AnalysisRequest>;

    async fn get_request_for_owner(
        &self,
        request_id: Uuid,
        owner_id: Uuid,
    ) -> PortResult<AnalysisRequest>;

    /// Claims a queued request for execution. Returns false when the request
    /// was not in `queued` (already claimed or terminal), in which case the
    /// caller must not run it. This is the exactly-once guard.
    async fn mark_request_processing(&self, request_id: Uuid) -> PortResult<bool>;

    /// Records a successful terminal transition. Only applies while the
    /// request is in `processing`; returns false otherwise.
    async fn complete_request(
        &self,
        request_id: Uuid,
        result: &AnalysisResult,
        model_used: &str,
        cost_estimate: Option<f64>,
    ) -> PortResult<bool>;

    /// Records a failed terminal transition with the failure message verbatim.
    /// Only applies while the request is in `queued` or `processing`.
    async fn fail_request(&self, request_id: Uuid, error: &str) -> PortResult<bool>;

    /// Marks every request stuck in `processing` since before `stalled_before`
    /// as errored. Returns how many rows were affected.
    async fn fail_stalled_requests(&self, stalled_before: DateTime<Utc>) -> PortResult<u64>;

    // --- Quiz Catalog ---
    async fn join_code_in_use(&self, code: &str) -> PortResult<bool>;

    /// Persists the quiz with all its questions and choices in a single
    /// transaction. Either the whole quiz exists afterwards, or nothing does.
    async fn create_quiz(&self, new: NewQuiz) -> PortResult<Quiz>;

    async fn get_quiz(&self, quiz_id: Uuid) -> PortResult<Quiz>;

    /// All questions with their choices, in position order.
    async fn get_quiz_questions(&self, quiz_id: Uuid) -> PortResult<Vec<QuestionWithChoices>>;

    /// Looks up a (question, choice) pair and verifies the question belongs to
    /// the quiz and the choice belongs to the question.
    async fn get_question_choice(
        &self,
        quiz_id: Uuid,
        question_id: Uuid,
        choice_id: Uuid,
    ) -> PortResult<(QuizQuestion, QuizChoice)>;

    // --- Live Sessions ---
    async fn room_code_active(&self, code: &str) -> PortResult<bool>;

    async fn create_live_session(&self, new: NewLiveSession) -> PortResult<LiveSession>;

    /// Finds the session by room code among currently-active sessions only.
    async fn get_active_session(&self, room_code: &str) -> PortResult<LiveSession>;

    /// Create-if-absent membership; re-joining returns the existing row.
    async fn join_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        display_name: &str,
    ) -> PortResult<LiveParticipant>;

    async fn get_participant(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<LiveParticipant>;

    /// Records an answer for (session, user, question). The first submission
    /// per question counts and, when correct, adds `points` to the score via
    /// an atomic increment; later submissions return the unchanged score.
    async fn record_answer(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        question_id: Uuid,
        choice_id: Uuid,
        correct: bool,
        points: i32,
    ) -> PortResult<AnswerOutcome>;

    /// Advances the round pointer under a row lock; ends the session when the
    /// new index reaches the question count. Fails with `Conflict` when the
    /// session is no longer active.
    async fn advance_session(&self, session_id: Uuid) -> PortResult<LiveSession>;

    /// Force-ends the session. Fails with `Conflict` when already ended.
    async fn end_session(&self, session_id: Uuid) -> PortResult<LiveSession>;

    async fn leaderboard(
        &self,
        session_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<LeaderboardEntry>>;
}

/// Extracts per-page text from raw document bytes.
#[async_trait]
pub trait TextExtractionService: Send + Sync {
    /// Best-effort extraction: unreadable pages are skipped, pages yielding
    /// empty text are dropped. The second return value is the total page
    /// count of the document, readable or not.
    async fn extract_pages(&self, data: &[u8]) -> PortResult<(Vec<ExtractedPage>, u32)>;
}

/// Produces prose from a prompt using a hosted generative model.
#[async_trait]
pub trait ContentGenerationService: Send + Sync {
    async fn generate(&self, prompt: &str) -> PortResult<String>;

    /// The identifier of the underlying model, recorded on completed requests.
    fn model_name(&self) -> &str;
}

/// Produces multiple-choice quiz questions for a topic.
#[async_trait]
pub trait QuestionGenerationService: Send + Sync {
    async fn generate_questions(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: usize,
    ) -> PortResult<Vec<GeneratedQuestion>>;
}
