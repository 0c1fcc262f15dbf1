//! services/api/src/web/analysis.rs
//!
//! Axum handlers for the PDF analysis endpoints: document upload, analysis
//! submission, status polling and the caller's document listing.

use crate::error::ApiError;
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Duration, Utc};
use lms_core::analysis::{join_pages, AnalysisTask};
use lms_core::domain::{
    AnalysisDocument, AnalysisResult, ResponseFormat, TaskKind, TaskOptions,
};
use lms_core::ports::{NewAnalysisRequest, NewDocument};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

const PDF_MAGIC: &[u8] = b"%PDF-";

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A caller-facing view of a stored document.
#[derive(Serialize, ToSchema)]
pub struct DocumentView {
    pub id: Uuid,
    pub file_id: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub page_count: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DocumentView {
    fn from_domain(doc: AnalysisDocument) -> Self {
        Self {
            id: doc.id,
            file_id: doc.file_id,
            metadata: doc.metadata,
            page_count: doc.page_count,
            created_at: doc.created_at,
            expires_at: doc.expires_at,
        }
    }
}

/// The response payload sent after a successful upload.
#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub file_id: String,
    pub status: String,
    pub message: String,
    pub pdf_document: DocumentView,
    /// Mirrors `file_id` for clients that track uploads as sessions.
    pub session_id: String,
}

/// The request payload for submitting an analysis.
#[derive(Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    pub file_id: String,
    pub task: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub task_options: TaskOptions,
    #[serde(default)]
    pub response_format: Option<String>,
}

/// The immediate response for an accepted analysis request.
#[derive(Serialize, ToSchema)]
pub struct AnalyzeResponse {
    pub request_id: Uuid,
    pub status: String,
    #[schema(value_type = Option<Object>)]
    pub result: Option<AnalysisResult>,
    pub model_used: Option<String>,
    pub cost_estimate: Option<f64>,
}

/// The polling payload for a single analysis request.
#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub request_id: Uuid,
    pub status: String,
    #[schema(value_type = Option<Object>)]
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Upload a PDF for later analysis.
///
/// Accepts multipart/form-data with a `file` part and an optional `metadata`
/// part containing a JSON object. The extracted text is kept server-side;
/// the returned `file_id` names the document in `/analysis/analyze` calls
/// until it expires.
#[utoipa::path(
    post,
    path = "/analysis/upload",
    request_body(content_type = "multipart/form-data", description = "The PDF to upload."),
    responses(
        (status = 201, description = "Document stored", body = UploadResponse),
        (status = 400, description = "Missing file, not a PDF, or over the size limit"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller.")
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file: Option<(String, bytes::Bytes)> = None;
    let mut metadata = serde_json::json!({});

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Failed to read multipart data: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Failed to read file bytes: {e}")))?;
                file = Some((name, data));
            }
            Some("metadata") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Failed to read metadata: {e}")))?;
                // Unparseable metadata degrades to an empty object rather
                // than failing the upload.
                metadata = serde_json::from_str(&raw).unwrap_or_else(|_| serde_json::json!({}));
            }
            _ => {}
        }
    }

    let (file_name, data) =
        file.ok_or_else(|| ApiError::Validation("file field is required".to_string()))?;

    if !file_name.to_lowercase().ends_with(".pdf") || !data.starts_with(PDF_MAGIC) {
        return Err(ApiError::Validation(
            "Only PDF files are allowed".to_string(),
        ));
    }
    if data.len() > state.config.max_upload_bytes {
        return Err(ApiError::Validation(format!(
            "File size should not exceed {}MB",
            state.config.max_upload_bytes / 1024 / 1024
        )));
    }

    let (pages, page_count) = state.extraction.extract_pages(&data).await?;
    let extracted_text = join_pages(&pages);

    let file_id = Uuid::new_v4().to_string();

    tokio::fs::create_dir_all(&state.config.upload_dir).await?;
    let path = state.config.upload_dir.join(format!("{file_id}.pdf"));
    tokio::fs::write(&path, &data).await?;

    let retention = Duration::from_std(state.config.retention_window)
        .map_err(|e| ApiError::Internal(format!("invalid retention window: {e}")))?;
    let document = state
        .db
        .create_document(NewDocument {
            file_id: file_id.clone(),
            owner_id: user_id,
            metadata,
            extracted_text,
            page_count: page_count as i32,
            expires_at: Utc::now() + retention,
        })
        .await?;

    info!(
        file_id = %file_id,
        pages = page_count,
        bytes = data.len(),
        "stored uploaded document"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            file_id: file_id.clone(),
            status: "success".to_string(),
            message: "PDF uploaded successfully".to_string(),
            pdf_document: DocumentView::from_domain(document),
            session_id: file_id,
        }),
    ))
}

/// Submit an analysis task against a previously uploaded document.
///
/// Validates the task options, records the request as `queued` and hands it
/// to the background worker pool. Poll `/analysis/status/{request_id}` for
/// the outcome.
#[utoipa::path(
    post,
    path = "/analysis/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 202, description = "Request accepted", body = AnalyzeResponse),
        (status = 400, description = "Invalid task, options or response format"),
        (status = 404, description = "Unknown document"),
        (status = 410, description = "Document has expired"),
        (status = 503, description = "Analysis queue is full")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller.")
    )
)]
pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = TaskKind::parse(&payload.task)
        .ok_or_else(|| ApiError::Validation(format!("Unknown task '{}'", payload.task)))?;

    let response_format = match payload.response_format.as_deref() {
        None => ResponseFormat::Text,
        Some(raw) => ResponseFormat::parse(raw)
            .ok_or_else(|| ApiError::Validation(format!("Unknown response_format '{raw}'")))?,
    };

    // Option validation happens up front so a bad request never reaches the
    // queue; workers re-parse the same pair and treat failure as a bug.
    AnalysisTask::from_parts(task, &payload.task_options)
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let document = state
        .db
        .get_document_for_owner(&payload.file_id, user_id)
        .await?;
    if document.is_expired(Utc::now()) {
        return Err(ApiError::Expired);
    }

    // Reserve a queue slot before creating the row; a saturated pipeline
    // refuses the submission instead of accumulating orphaned requests.
    let permit = state.analysis_queue.try_reserve().map_err(|_| {
        ApiError::ServiceUnavailable("Analysis queue is full, try again later".to_string())
    })?;

    let request = state
        .db
        .create_request(NewAnalysisRequest {
            document_id: document.id,
            owner_id: user_id,
            task,
            task_options: payload.task_options,
            response_format,
        })
        .await?;

    permit.send(request.id);
    info!(request_id = %request.id, task = task.as_str(), "queued analysis request");

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalyzeResponse {
            request_id: request.id,
            status: request.status.as_str().to_string(),
            result: None,
            model_used: None,
            cost_estimate: None,
        }),
    ))
}

/// Get status and result for an analysis request.
#[utoipa::path(
    get,
    path = "/analysis/status/{request_id}",
    responses(
        (status = 200, description = "Current request state", body = StatusResponse),
        (status = 404, description = "Unknown request")
    ),
    params(
        ("request_id" = Uuid, Path, description = "The analysis request to inspect."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller.")
    )
)]
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let request = state.db.get_request_for_owner(request_id, user_id).await?;

    Ok(Json(StatusResponse {
        request_id: request.id,
        status: request.status.as_str().to_string(),
        result: request.result,
        error: request.error,
    }))
}

/// List the caller's uploaded documents, newest first.
#[utoipa::path(
    get,
    path = "/analysis/documents",
    responses(
        (status = 200, description = "The caller's documents", body = [DocumentView])
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller.")
    )
)]
pub async fn documents_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let documents = state.db.list_documents_for_owner(user_id).await?;
    let views: Vec<DocumentView> = documents
        .into_iter()
        .map(DocumentView::from_domain)
        .collect();
    Ok(Json(views))
}
