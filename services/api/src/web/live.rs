//! services/api/src/web/live.rs
//!
//! The live quiz room endpoints: a host creates a room around a freshly
//! generated quiz, participants join with the room code, answer the current
//! question and watch the leaderboard while the host drives the rounds.

use crate::codes::numeric_code;
use crate::error::ApiError;
use crate::web::quiz::{build_quiz, validate_counts, QuizPlan, JOIN_CODE_LEN};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use lms_core::domain::{Difficulty, LiveSession, QuestionWithChoices};
use lms_core::live::question_in_range;
use lms_core::ports::{NewLiveSession, PortError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

const CODE_ALLOCATION_ATTEMPTS: usize = 20;
const LEADERBOARD_SIZE: i64 = 10;
const LIVE_TIME_LIMIT_MINUTES: i32 = 30;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LiveCreateRequest {
    pub topic: String,
    pub difficulty: String,
    pub number_of_questions: i32,
}

#[derive(Serialize, ToSchema)]
pub struct LiveCreateResponse {
    pub room_code: String,
    pub live_session_id: Uuid,
    pub quiz_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
pub struct LiveJoinRequest {
    pub room_code: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LiveJoinResponse {
    pub message: String,
    pub room_code: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LiveAnswerRequest {
    pub question_id: Uuid,
    pub selected_choice_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct LiveAnswerResponse {
    pub correct: bool,
    pub score: i32,
}

#[derive(Serialize, ToSchema)]
pub struct LiveAdvanceResponse {
    pub message: String,
    pub current_question_index: i32,
    pub is_active: bool,
}

#[derive(Serialize, ToSchema)]
pub struct LiveEndResponse {
    pub message: String,
}

/// A choice as shown to participants. Correctness stays server-side.
#[derive(Serialize, ToSchema)]
pub struct ChoiceView {
    pub id: Uuid,
    pub choice_text: String,
    pub position: i32,
}

#[derive(Serialize, ToSchema)]
pub struct QuestionView {
    pub id: Uuid,
    pub question_text: String,
    pub points: i32,
    pub position: i32,
    pub choices: Vec<ChoiceView>,
}

impl QuestionView {
    fn from_domain(q: &QuestionWithChoices) -> Self {
        Self {
            id: q.question.id,
            question_text: q.question.question_text.clone(),
            points: q.question.points,
            position: q.question.position,
            choices: q
                .choices
                .iter()
                .map(|c| ChoiceView {
                    id: c.id,
                    choice_text: c.choice_text.clone(),
                    position: c.position,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LeaderboardEntryView {
    pub display_name: String,
    pub score: i32,
}

#[derive(Serialize, ToSchema)]
pub struct LiveStateResponse {
    pub room_code: String,
    pub topic: String,
    pub difficulty: String,
    pub num_questions: i32,
    pub current_question_index: i32,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
    pub leaderboard: Vec<LeaderboardEntryView>,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Looks up the active session for a room code. A missing or ended room is
/// indistinguishable to callers.
async fn active_session(state: &AppState, room_code: &str) -> Result<LiveSession, ApiError> {
    state
        .db
        .get_active_session(room_code)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => ApiError::SessionNotJoinable,
            other => other.into(),
        })
}

fn require_host(session: &LiveSession, user_id: Uuid) -> Result<(), ApiError> {
    if session.host_id != user_id {
        return Err(ApiError::Forbidden(
            "Only the host can control the quiz".to_string(),
        ));
    }
    Ok(())
}

async fn allocate_room_code(state: &AppState) -> Result<String, ApiError> {
    // Room codes only need to be unique among active rooms; an ended room
    // frees its code for reuse.
    for _ in 0..CODE_ALLOCATION_ATTEMPTS {
        let code = numeric_code(JOIN_CODE_LEN);
        if !state.db.room_code_active(&code).await? {
            return Ok(code);
        }
    }
    Err(ApiError::Internal(
        "Could not allocate a unique room code".to_string(),
    ))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a live quiz room.
///
/// Generates a quiz for the topic and opens a session on it with the caller
/// as host, starting at question index 0.
#[utoipa::path(
    post,
    path = "/live/create",
    request_body = LiveCreateRequest,
    responses(
        (status = 201, description = "Room created", body = LiveCreateResponse),
        (status = 400, description = "Invalid difficulty or question count")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the host.")
    )
)]
pub async fn live_create_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<LiveCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let difficulty = Difficulty::parse(&payload.difficulty).ok_or_else(|| {
        ApiError::Validation(format!("Unknown difficulty '{}'", payload.difficulty))
    })?;
    let topic = payload.topic.trim().to_string();
    if topic.is_empty() {
        return Err(ApiError::Validation("topic is required".to_string()));
    }
    validate_counts(payload.number_of_questions, LIVE_TIME_LIMIT_MINUTES)?;

    let quiz = build_quiz(
        &state,
        user_id,
        QuizPlan {
            title: format!("Live: {topic} ({})", difficulty.as_str()),
            topic: topic.clone(),
            difficulty,
            question_count: payload.number_of_questions,
            time_limit_minutes: LIVE_TIME_LIMIT_MINUTES,
        },
    )
    .await?;

    let room_code = allocate_room_code(&state).await?;
    let session = state
        .db
        .create_live_session(NewLiveSession {
            quiz_id: quiz.id,
            room_code,
            host_id: user_id,
            topic,
            difficulty,
            question_count: quiz.question_count,
        })
        .await?;

    info!(room_code = %session.room_code, quiz_id = %quiz.id, "opened live room");

    Ok((
        StatusCode::CREATED,
        Json(LiveCreateResponse {
            room_code: session.room_code,
            live_session_id: session.id,
            quiz_id: quiz.id,
        }),
    ))
}

/// Join an active live room. Re-joining is a no-op.
#[utoipa::path(
    post,
    path = "/live/join",
    request_body = LiveJoinRequest,
    responses(
        (status = 200, description = "Joined", body = LiveJoinResponse),
        (status = 404, description = "No active room with that code")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the participant.")
    )
)]
pub async fn live_join_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<LiveJoinRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let room_code = payload.room_code.trim();
    if room_code.is_empty() {
        return Err(ApiError::Validation("room_code is required".to_string()));
    }

    let session = active_session(&state, room_code).await?;

    let questions = state.db.get_quiz_questions(session.quiz_id).await?;
    if questions.is_empty() {
        return Err(ApiError::Validation(
            "This quiz has no questions".to_string(),
        ));
    }

    let display_name = payload
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("player-{}", &user_id.to_string()[..8]));

    state
        .db
        .join_session(session.id, user_id, &display_name)
        .await?;

    Ok(Json(LiveJoinResponse {
        message: "Joined".to_string(),
        room_code: room_code.to_string(),
    }))
}

/// Read the current state of an active room: snapshot, current question
/// (without correctness) and the top of the leaderboard.
#[utoipa::path(
    get,
    path = "/live/{room_code}/state",
    responses(
        (status = 200, description = "Current room state", body = LiveStateResponse),
        (status = 404, description = "No active room with that code")
    ),
    params(
        ("room_code" = String, Path, description = "The room code."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller.")
    )
)]
pub async fn live_state_handler(
    State(state): State<Arc<AppState>>,
    Path(room_code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = active_session(&state, &room_code).await?;

    let questions = state.db.get_quiz_questions(session.quiz_id).await?;
    let question = if question_in_range(session.current_question_index, questions.len() as i32) {
        questions
            .get(session.current_question_index as usize)
            .map(QuestionView::from_domain)
    } else {
        None
    };

    let leaderboard = state
        .db
        .leaderboard(session.id, LEADERBOARD_SIZE)
        .await?
        .into_iter()
        .map(|e| LeaderboardEntryView {
            display_name: e.display_name,
            score: e.score,
        })
        .collect();

    Ok(Json(LiveStateResponse {
        room_code: session.room_code,
        topic: session.topic,
        difficulty: session.difficulty.as_str().to_string(),
        num_questions: session.question_count,
        current_question_index: session.current_question_index,
        is_active: session.is_active,
        question,
        leaderboard,
    }))
}

/// Answer a question in an active room.
///
/// Only the first answer per question counts; repeats return the unchanged
/// score. Correct answers add the question's points atomically.
#[utoipa::path(
    post,
    path = "/live/{room_code}/answer",
    request_body = LiveAnswerRequest,
    responses(
        (status = 200, description = "Answer evaluated", body = LiveAnswerResponse),
        (status = 400, description = "Question or choice not part of this quiz"),
        (status = 404, description = "No active room, or caller has not joined")
    ),
    params(
        ("room_code" = String, Path, description = "The room code."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the participant.")
    )
)]
pub async fn live_answer_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(room_code): Path<String>,
    Json(payload): Json<LiveAnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = active_session(&state, &room_code).await?;

    let (question, choice) = state
        .db
        .get_question_choice(session.quiz_id, payload.question_id, payload.selected_choice_id)
        .await
        .map_err(|e| match e {
            // A question or choice outside this quiz is a malformed request,
            // not a missing resource.
            PortError::NotFound(msg) => ApiError::Validation(msg),
            other => other.into(),
        })?;

    // Participant lookup stays a 404: you cannot answer without joining.
    state.db.get_participant(session.id, user_id).await?;

    let outcome = state
        .db
        .record_answer(
            session.id,
            user_id,
            question.id,
            choice.id,
            choice.is_correct,
            question.points,
        )
        .await?;

    Ok(Json(LiveAnswerResponse {
        correct: outcome.correct,
        score: outcome.score,
    }))
}

/// Advance the room to the next question (host only). Running past the last
/// question ends the session.
#[utoipa::path(
    post,
    path = "/live/{room_code}/next",
    responses(
        (status = 200, description = "Advanced", body = LiveAdvanceResponse),
        (status = 403, description = "Caller is not the host"),
        (status = 404, description = "No active room with that code")
    ),
    params(
        ("room_code" = String, Path, description = "The room code."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the host.")
    )
)]
pub async fn live_next_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(room_code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = active_session(&state, &room_code).await?;
    require_host(&session, user_id)?;

    let updated = state.db.advance_session(session.id).await?;

    Ok(Json(LiveAdvanceResponse {
        message: "advanced".to_string(),
        current_question_index: updated.current_question_index,
        is_active: updated.is_active,
    }))
}

/// End the room immediately (host only).
#[utoipa::path(
    post,
    path = "/live/{room_code}/end",
    responses(
        (status = 200, description = "Ended", body = LiveEndResponse),
        (status = 403, description = "Caller is not the host"),
        (status = 404, description = "No active room with that code")
    ),
    params(
        ("room_code" = String, Path, description = "The room code."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the host.")
    )
)]
pub async fn live_end_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(room_code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = active_session(&state, &room_code).await?;
    require_host(&session, user_id)?;

    state.db.end_session(session.id).await?;
    info!(room_code = %room_code, "live room ended by host");

    Ok(Json(LiveEndResponse {
        message: "ended".to_string(),
    }))
}
