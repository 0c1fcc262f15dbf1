//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lms_core::domain::{
    AnalysisDocument, AnalysisRequest, AnalysisResult, AnswerOutcome, Difficulty,
    LeaderboardEntry, LiveParticipant, LiveSession, QuestionWithChoices, Quiz, QuizChoice,
    QuizQuestion, RequestStatus, ResponseFormat, TaskKind, TaskOptions, User,
};
use lms_core::live::advance_round;
use lms_core::ports::{
    DatabaseService, NewAnalysisRequest, NewDocument, NewLiveSession, NewQuiz, PortError,
    PortResult,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or(entity: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(entity),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct DocumentRecord {
    id: Uuid,
    file_id: String,
    owner_id: Uuid,
    metadata: serde_json::Value,
    extracted_text: String,
    page_count: i32,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}
impl DocumentRecord {
    fn to_domain(self) -> AnalysisDocument {
        AnalysisDocument {
            id: self.id,
            file_id: self.file_id,
            owner_id: self.owner_id,
            metadata: self.metadata,
            extracted_text: self.extracted_text,
            page_count: self.page_count,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct RequestRecord {
    id: Uuid,
    document_id: Uuid,
    owner_id: Uuid,
    task: String,
    task_options: serde_json::Value,
    response_format: String,
    status: String,
    result: Option<serde_json::Value>,
    error: Option<String>,
    model_used: Option<String>,
    cost_estimate: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl RequestRecord {
    /// Stored enum strings come back through the same parsers the domain uses,
    /// so a corrupted row surfaces as an error instead of a silent default.
    fn to_domain(self) -> PortResult<AnalysisRequest> {
        let task = TaskKind::parse(&self.task)
            .ok_or_else(|| PortError::Unexpected(format!("unknown task '{}'", self.task)))?;
        let response_format = ResponseFormat::parse(&self.response_format).ok_or_else(|| {
            PortError::Unexpected(format!("unknown response_format '{}'", self.response_format))
        })?;
        let status = RequestStatus::parse(&self.status)
            .ok_or_else(|| PortError::Unexpected(format!("unknown status '{}'", self.status)))?;
        let task_options: TaskOptions = serde_json::from_value(self.task_options)
            .map_err(|e| PortError::Unexpected(format!("bad task_options: {e}")))?;
        let result: Option<AnalysisResult> = match self.result {
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| PortError::Unexpected(format!("bad result payload: {e}")))?,
            ),
            None => None,
        };

        Ok(AnalysisRequest {
            id: self.id,
            document_id: self.document_id,
            owner_id: self.owner_id,
            task,
            task_options,
            response_format,
            status,
            result,
            error: self.error,
            model_used: self.model_used,
            cost_estimate: self.cost_estimate,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct QuizRecord {
    id: Uuid,
    title: String,
    topic: String,
    difficulty: String,
    question_count: i32,
    time_limit_minutes: i32,
    created_by: Uuid,
    join_code: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}
impl QuizRecord {
    fn to_domain(self) -> PortResult<Quiz> {
        let difficulty = Difficulty::parse(&self.difficulty).ok_or_else(|| {
            PortError::Unexpected(format!("unknown difficulty '{}'", self.difficulty))
        })?;
        Ok(Quiz {
            id: self.id,
            title: self.title,
            topic: self.topic,
            difficulty,
            question_count: self.question_count,
            time_limit_minutes: self.time_limit_minutes,
            created_by: self.created_by,
            join_code: self.join_code,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct QuestionRecord {
    id: Uuid,
    quiz_id: Uuid,
    question_text: String,
    points: i32,
    position: i32,
}
impl QuestionRecord {
    fn to_domain(self) -> QuizQuestion {
        QuizQuestion {
            id: self.id,
            quiz_id: self.quiz_id,
            question_text: self.question_text,
            points: self.points,
            position: self.position,
        }
    }
}

#[derive(FromRow)]
struct ChoiceRecord {
    id: Uuid,
    question_id: Uuid,
    choice_text: String,
    is_correct: bool,
    position: i32,
}
impl ChoiceRecord {
    fn to_domain(self) -> QuizChoice {
        QuizChoice {
            id: self.id,
            question_id: self.question_id,
            choice_text: self.choice_text,
            is_correct: self.is_correct,
            position: self.position,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    quiz_id: Uuid,
    room_code: String,
    host_id: Uuid,
    topic: String,
    difficulty: String,
    question_count: i32,
    is_active: bool,
    current_question_index: i32,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}
impl SessionRecord {
    fn to_domain(self) -> PortResult<LiveSession> {
        let difficulty = Difficulty::parse(&self.difficulty).ok_or_else(|| {
            PortError::Unexpected(format!("unknown difficulty '{}'", self.difficulty))
        })?;
        Ok(LiveSession {
            id: self.id,
            quiz_id: self.quiz_id,
            room_code: self.room_code,
            host_id: self.host_id,
            topic: self.topic,
            difficulty,
            question_count: self.question_count,
            is_active: self.is_active,
            current_question_index: self.current_question_index,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
        })
    }
}

#[derive(FromRow)]
struct ParticipantRecord {
    session_id: Uuid,
    user_id: Uuid,
    display_name: String,
    score: i32,
    joined_at: DateTime<Utc>,
}
impl ParticipantRecord {
    fn to_domain(self) -> LiveParticipant {
        LiveParticipant {
            session_id: self.session_id,
            user_id: self.user_id,
            display_name: self.display_name,
            score: self.score,
            joined_at: self.joined_at,
        }
    }
}

#[derive(FromRow)]
struct LeaderboardRecord {
    display_name: String,
    score: i32,
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

const DOCUMENT_COLUMNS: &str =
    "id, file_id, owner_id, metadata, extracted_text, page_count, created_at, expires_at";
const REQUEST_COLUMNS: &str = "id, document_id, owner_id, task, task_options, response_format, \
     status, result, error, model_used, cost_estimate, created_at, updated_at";
const QUIZ_COLUMNS: &str = "id, title, topic, difficulty, question_count, time_limit_minutes, \
     created_by, join_code, is_active, created_at";
const SESSION_COLUMNS: &str = "id, quiz_id, room_code, host_id, topic, difficulty, \
     question_count, is_active, current_question_index, created_at, started_at, ended_at";

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn get_or_create_user(&self, user_id: Uuid) -> PortResult<User> {
        sqlx::query("INSERT INTO users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, created_at FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("User {} not found", user_id)))?;

        Ok(record.to_domain())
    }

    async fn create_document(&self, new: NewDocument) -> PortResult<AnalysisDocument> {
        let record = sqlx::query_as::<_, DocumentRecord>(&format!(
            "INSERT INTO analysis_documents \
             (id, file_id, owner_id, metadata, extracted_text, page_count, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.file_id)
        .bind(new.owner_id)
        .bind(&new.metadata)
        .bind(&new.extracted_text)
        .bind(new.page_count)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn get_document(&self, document_id: Uuid) -> PortResult<AnalysisDocument> {
        let record = sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM analysis_documents WHERE id = $1"
        ))
        .bind(document_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Document {} not found", document_id)))?;

        Ok(record.to_domain())
    }

    async fn get_document_for_owner(
        &self,
        file_id: &str,
        owner_id: Uuid,
    ) -> PortResult<AnalysisDocument> {
        let record = sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM analysis_documents \
             WHERE file_id = $1 AND owner_id = $2"
        ))
        .bind(file_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Document {} not found", file_id)))?;

        Ok(record.to_domain())
    }

    async fn list_documents_for_owner(
        &self,
        owner_id: Uuid,
    ) -> PortResult<Vec<AnalysisDocument>> {
        let records = sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM analysis_documents \
             WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn find_expired_documents(
        &self,
        now: DateTime<Utc>,
    ) -> PortResult<Vec<AnalysisDocument>> {
        let records = sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM analysis_documents WHERE expires_at < $1"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn delete_document(&self, document_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM analysis_documents WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_request(&self, new: NewAnalysisRequest) -> PortResult<AnalysisRequest> {
        let task_options = serde_json::to_value(&new.task_options)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let record = sqlx::query_as::<_, RequestRecord>(&format!(
            "INSERT INTO analysis_requests \
             (id, document_id, owner_id, task, task_options, response_format, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 'queued') RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.document_id)
        .bind(new.owner_id)
        .bind(new.task.as_str())
        .bind(&task_options)
        .bind(new.response_format.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        record.to_domain()
    }

    async fn get_request(&self, request_id: Uuid) -> PortResult<AnalysisRequest> {
        let record = sqlx::query_as::<_, RequestRecord>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM analysis_requests WHERE id = $1"
        ))
        .bind(request_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Request {} not found", request_id)))?;

        record.to_domain()
    }

    async fn get_request_for_owner(
        &self,
        request_id: Uuid,
        owner_id: Uuid,
    ) -> PortResult<AnalysisRequest> {
        let record = sqlx::query_as::<_, RequestRecord>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM analysis_requests WHERE id = $1 AND owner_id = $2"
        ))
        .bind(request_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Request {} not found", request_id)))?;

        record.to_domain()
    }

    async fn mark_request_processing(&self, request_id: Uuid) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE analysis_requests SET status = 'processing', updated_at = now() \
             WHERE id = $1 AND status = 'queued'",
        )
        .bind(request_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete_request(
        &self,
        request_id: Uuid,
        result: &AnalysisResult,
        model_used: &str,
        cost_estimate: Option<f64>,
    ) -> PortResult<bool> {
        let payload =
            serde_json::to_value(result).map_err(|e| PortError::Unexpected(e.to_string()))?;

        let outcome = sqlx::query(
            "UPDATE analysis_requests \
             SET status = 'done', result = $2, model_used = $3, cost_estimate = $4, \
                 updated_at = now() \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(request_id)
        .bind(&payload)
        .bind(model_used)
        .bind(cost_estimate)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(outcome.rows_affected() == 1)
    }

    async fn fail_request(&self, request_id: Uuid, error: &str) -> PortResult<bool> {
        let outcome = sqlx::query(
            "UPDATE analysis_requests SET status = 'error', error = $2, updated_at = now() \
             WHERE id = $1 AND status IN ('queued', 'processing')",
        )
        .bind(request_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(outcome.rows_affected() == 1)
    }

    async fn fail_stalled_requests(&self, stalled_before: DateTime<Utc>) -> PortResult<u64> {
        let outcome = sqlx::query(
            "UPDATE analysis_requests \
             SET status = 'error', \
                 error = 'analysis stalled: processing exceeded the deadline', \
                 updated_at = now() \
             WHERE status = 'processing' AND updated_at < $1",
        )
        .bind(stalled_before)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(outcome.rows_affected())
    }

    async fn join_code_in_use(&self, code: &str) -> PortResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM quizzes WHERE join_code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(exists)
    }

    async fn create_quiz(&self, new: NewQuiz) -> PortResult<Quiz> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let quiz = sqlx::query_as::<_, QuizRecord>(&format!(
            "INSERT INTO quizzes \
             (id, title, topic, difficulty, question_count, time_limit_minutes, created_by, \
              join_code) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {QUIZ_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.topic)
        .bind(new.difficulty.as_str())
        .bind(new.question_count)
        .bind(new.time_limit_minutes)
        .bind(new.created_by)
        .bind(&new.join_code)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        for (i, question) in new.questions.iter().enumerate() {
            let question_id: Uuid = sqlx::query_scalar(
                "INSERT INTO quiz_questions (id, quiz_id, question_text, points, position) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(quiz.id)
            .bind(&question.question_text)
            .bind(question.points)
            .bind(i as i32 + 1)
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;

            for (j, choice) in question.choices.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO quiz_choices (id, question_id, choice_text, is_correct, \
                     position) VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(Uuid::new_v4())
                .bind(question_id)
                .bind(&choice.choice_text)
                .bind(choice.is_correct)
                .bind(j as i32 + 1)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
            }
        }

        tx.commit().await.map_err(unexpected)?;
        quiz.to_domain()
    }

    async fn get_quiz(&self, quiz_id: Uuid) -> PortResult<Quiz> {
        let record = sqlx::query_as::<_, QuizRecord>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"
        ))
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Quiz {} not found", quiz_id)))?;

        record.to_domain()
    }

    async fn get_quiz_questions(&self, quiz_id: Uuid) -> PortResult<Vec<QuestionWithChoices>> {
        let questions = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, quiz_id, question_text, points, position FROM quiz_questions \
             WHERE quiz_id = $1 ORDER BY position ASC",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut out = Vec::with_capacity(questions.len());
        for question in questions {
            let choices = sqlx::query_as::<_, ChoiceRecord>(
                "SELECT id, question_id, choice_text, is_correct, position FROM quiz_choices \
                 WHERE question_id = $1 ORDER BY position ASC",
            )
            .bind(question.id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

            out.push(QuestionWithChoices {
                question: question.to_domain(),
                choices: choices.into_iter().map(|c| c.to_domain()).collect(),
            });
        }
        Ok(out)
    }

    async fn get_question_choice(
        &self,
        quiz_id: Uuid,
        question_id: Uuid,
        choice_id: Uuid,
    ) -> PortResult<(QuizQuestion, QuizChoice)> {
        let question = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, quiz_id, question_text, points, position FROM quiz_questions \
             WHERE id = $1 AND quiz_id = $2",
        )
        .bind(question_id)
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!(
            "Question {} not found in quiz {}",
            question_id, quiz_id
        )))?;

        let choice = sqlx::query_as::<_, ChoiceRecord>(
            "SELECT id, question_id, choice_text, is_correct, position FROM quiz_choices \
             WHERE id = $1 AND question_id = $2",
        )
        .bind(choice_id)
        .bind(question_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!(
            "Choice {} not found for question {}",
            choice_id, question_id
        )))?;

        Ok((question.to_domain(), choice.to_domain()))
    }

    async fn room_code_active(&self, code: &str) -> PortResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM live_sessions WHERE room_code = $1 AND is_active)",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(exists)
    }

    async fn create_live_session(&self, new: NewLiveSession) -> PortResult<LiveSession> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO live_sessions \
             (id, quiz_id, room_code, host_id, topic, difficulty, question_count, is_active, \
              current_question_index, started_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, 0, now()) RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.quiz_id)
        .bind(&new.room_code)
        .bind(new.host_id)
        .bind(&new.topic)
        .bind(new.difficulty.as_str())
        .bind(new.question_count)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        record.to_domain()
    }

    async fn get_active_session(&self, room_code: &str) -> PortResult<LiveSession> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM live_sessions WHERE room_code = $1 AND is_active"
        ))
        .bind(room_code)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!(
            "No active session for room {}",
            room_code
        )))?;

        record.to_domain()
    }

    async fn join_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        display_name: &str,
    ) -> PortResult<LiveParticipant> {
        // Create-if-absent: the primary key on (session_id, user_id) makes
        // re-joining a no-op instead of an error.
        sqlx::query(
            "INSERT INTO live_participants (session_id, user_id, display_name) \
             VALUES ($1, $2, $3) ON CONFLICT (session_id, user_id) DO NOTHING",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(display_name)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        self.get_participant(session_id, user_id).await
    }

    async fn get_participant(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<LiveParticipant> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            "SELECT session_id, user_id, display_name, score, joined_at \
             FROM live_participants WHERE session_id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!(
            "User {} has not joined session {}",
            user_id, session_id
        )))?;

        Ok(record.to_domain())
    }

    async fn record_answer(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        question_id: Uuid,
        choice_id: Uuid,
        correct: bool,
        points: i32,
    ) -> PortResult<AnswerOutcome> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // The primary key on (session_id, user_id, question_id) is the
        // one-answer-per-question rule; only the first insert counts.
        let inserted = sqlx::query(
            "INSERT INTO live_answers (session_id, user_id, question_id, choice_id, is_correct) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (session_id, user_id, question_id) DO NOTHING",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(question_id)
        .bind(choice_id)
        .bind(correct)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?
        .rows_affected()
            == 1;

        let score: i32 = if inserted && correct {
            sqlx::query_scalar(
                "UPDATE live_participants SET score = score + $3 \
                 WHERE session_id = $1 AND user_id = $2 RETURNING score",
            )
            .bind(session_id)
            .bind(user_id)
            .bind(points)
            .fetch_one(&mut *tx)
            .await
            .map_err(not_found_or(format!(
                "User {} has not joined session {}",
                user_id, session_id
            )))?
        } else {
            sqlx::query_scalar(
                "SELECT score FROM live_participants WHERE session_id = $1 AND user_id = $2",
            )
            .bind(session_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(not_found_or(format!(
                "User {} has not joined session {}",
                user_id, session_id
            )))?
        };

        tx.commit().await.map_err(unexpected)?;

        Ok(AnswerOutcome {
            correct,
            score,
            counted: inserted,
        })
    }

    async fn advance_session(&self, session_id: Uuid) -> PortResult<LiveSession> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Row lock: concurrent advances on the same room serialize here, so
        // the index can never double-increment.
        let current = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM live_sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(not_found_or(format!("Session {} not found", session_id)))?;

        if !current.is_active {
            return Err(PortError::Conflict(
                "session is no longer active".to_string(),
            ));
        }

        let advance = advance_round(current.current_question_index, current.question_count);

        let updated = sqlx::query_as::<_, SessionRecord>(&format!(
            "UPDATE live_sessions \
             SET current_question_index = $2, is_active = $3, \
                 ended_at = CASE WHEN $3 THEN ended_at ELSE now() END \
             WHERE id = $1 RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session_id)
        .bind(advance.next_index)
        .bind(!advance.finished)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        updated.to_domain()
    }

    async fn end_session(&self, session_id: Uuid) -> PortResult<LiveSession> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let current = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM live_sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(not_found_or(format!("Session {} not found", session_id)))?;

        if !current.is_active {
            return Err(PortError::Conflict("session already ended".to_string()));
        }

        let updated = sqlx::query_as::<_, SessionRecord>(&format!(
            "UPDATE live_sessions SET is_active = FALSE, ended_at = now() \
             WHERE id = $1 RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        updated.to_domain()
    }

    async fn leaderboard(
        &self,
        session_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<LeaderboardEntry>> {
        let records = sqlx::query_as::<_, LeaderboardRecord>(
            "SELECT display_name, score FROM live_participants \
             WHERE session_id = $1 ORDER BY score DESC, joined_at ASC LIMIT $2",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records
            .into_iter()
            .map(|r| LeaderboardEntry {
                display_name: r.display_name,
                score: r.score,
            })
            .collect())
    }
}
