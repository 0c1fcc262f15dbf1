//! services/api/src/web/quiz.rs
//!
//! Quiz creation: question generation (AI with a deterministic fallback),
//! normalization, join-code allocation and transactional persistence.
//! The live session endpoints reuse `build_quiz` for their question sets.

use crate::codes::numeric_code;
use crate::error::ApiError;
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use lms_core::domain::{Difficulty, Quiz};
use lms_core::ports::NewQuiz;
use lms_core::quiz::{fallback_questions, into_new_questions, normalize_questions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub const JOIN_CODE_LEN: usize = 6;
const CODE_ALLOCATION_ATTEMPTS: usize = 20;
const MAX_QUESTIONS: i32 = 50;
const MAX_TIME_LIMIT_MINUTES: i32 = 300;
const DEFAULT_TIME_LIMIT_MINUTES: i32 = 30;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The request payload for creating a quiz.
#[derive(Deserialize, ToSchema)]
pub struct CreateQuizRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub topic: String,
    pub difficulty: String,
    pub number_of_questions: i32,
    #[serde(default)]
    pub time_limit: Option<i32>,
}

/// A caller-facing view of a created quiz.
#[derive(Serialize, ToSchema)]
pub struct QuizView {
    pub id: Uuid,
    pub title: String,
    pub topic: String,
    pub difficulty: String,
    pub number_of_questions: i32,
    pub time_limit: i32,
    pub join_code: String,
    pub created_at: DateTime<Utc>,
}

impl QuizView {
    pub fn from_domain(quiz: Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title,
            topic: quiz.topic,
            difficulty: quiz.difficulty.as_str().to_string(),
            number_of_questions: quiz.question_count,
            time_limit: quiz.time_limit_minutes,
            join_code: quiz.join_code,
            created_at: quiz.created_at,
        }
    }
}

//=========================================================================================
// Quiz Assembly (shared with the live session endpoints)
//=========================================================================================

/// Validated inputs for one quiz build.
pub struct QuizPlan {
    pub title: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_count: i32,
    pub time_limit_minutes: i32,
}

pub fn validate_counts(question_count: i32, time_limit: i32) -> Result<(), ApiError> {
    if !(1..=MAX_QUESTIONS).contains(&question_count) {
        return Err(ApiError::Validation(format!(
            "Number of questions must be between 1 and {MAX_QUESTIONS}"
        )));
    }
    if !(1..=MAX_TIME_LIMIT_MINUTES).contains(&time_limit) {
        return Err(ApiError::Validation(format!(
            "Time limit must be between 1 and {MAX_TIME_LIMIT_MINUTES} minutes"
        )));
    }
    Ok(())
}

/// Generates, normalizes and persists a quiz in one transaction, returning
/// the stored quiz with its freshly allocated join code.
pub async fn build_quiz(
    state: &AppState,
    created_by: Uuid,
    plan: QuizPlan,
) -> Result<Quiz, ApiError> {
    let count = plan.question_count as usize;

    let raw = match state
        .questions
        .generate_questions(&plan.topic, plan.difficulty, count)
        .await
    {
        Ok(questions) => questions,
        Err(e) => {
            warn!(topic = %plan.topic, "question generation failed, using fallback: {e}");
            fallback_questions(&plan.topic, plan.difficulty, count)
        }
    };

    let normalized = normalize_questions(raw, &plan.topic, plan.difficulty, count);
    let questions = into_new_questions(normalized);

    let join_code = allocate_join_code(state).await?;

    let quiz = state
        .db
        .create_quiz(NewQuiz {
            title: plan.title,
            topic: plan.topic,
            difficulty: plan.difficulty,
            question_count: plan.question_count,
            time_limit_minutes: plan.time_limit_minutes,
            created_by,
            join_code,
            questions,
        })
        .await?;

    info!(quiz_id = %quiz.id, join_code = %quiz.join_code, "created quiz");
    Ok(quiz)
}

async fn allocate_join_code(state: &AppState) -> Result<String, ApiError> {
    for _ in 0..CODE_ALLOCATION_ATTEMPTS {
        let code = numeric_code(JOIN_CODE_LEN);
        if !state.db.join_code_in_use(&code).await? {
            return Ok(code);
        }
    }
    Err(ApiError::Internal(
        "Could not allocate a unique join code".to_string(),
    ))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a quiz with AI-generated questions.
///
/// Untitled quizzes are named after their topic. When question generation is
/// unavailable or fails, a deterministic templated set fills in.
#[utoipa::path(
    post,
    path = "/quizzes",
    request_body = CreateQuizRequest,
    responses(
        (status = 201, description = "Quiz created", body = QuizView),
        (status = 400, description = "Invalid difficulty, count or time limit")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller.")
    )
)]
pub async fn create_quiz_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let difficulty = Difficulty::parse(&payload.difficulty).ok_or_else(|| {
        ApiError::Validation(format!("Unknown difficulty '{}'", payload.difficulty))
    })?;

    let topic = payload.topic.trim().to_string();
    if topic.is_empty() {
        return Err(ApiError::Validation("topic is required".to_string()));
    }

    let time_limit = payload.time_limit.unwrap_or(DEFAULT_TIME_LIMIT_MINUTES);
    validate_counts(payload.number_of_questions, time_limit)?;

    let title = payload
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("{topic} Quiz"));

    let quiz = build_quiz(
        &state,
        user_id,
        QuizPlan {
            title,
            topic,
            difficulty,
            question_count: payload.number_of_questions,
            time_limit_minutes: time_limit,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(QuizView::from_domain(quiz))))
}
