//! services/api/src/web/analysis_worker.rs
//!
//! The background side of the analysis pipeline: a fixed pool of workers
//! draining the bounded request queue, plus a periodic reaper that fails
//! requests stuck in `processing`.
//!
//! Workers claim requests with a guarded queued-to-processing transition, so
//! a request delivered twice (or raced by the reaper) is processed at most
//! once.

use crate::web::state::AppState;
use chrono::{Duration as ChronoDuration, Utc};
use lms_core::analysis::{
    build_prompt, extract_page_references, render_content, AnalysisTask,
};
use lms_core::domain::AnalysisResult;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared receiving end of the analysis queue. Each worker locks it just
/// long enough to take the next request id.
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<Uuid>>>;

//=========================================================================================
// Worker Pool
//=========================================================================================

/// Runs one worker until the queue closes or shutdown is signalled.
pub async fn analysis_worker(
    worker_id: usize,
    state: Arc<AppState>,
    queue: SharedQueue,
    shutdown: CancellationToken,
) {
    info!(worker_id, "analysis worker started");
    loop {
        let next = {
            let mut rx = queue.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => None,
                received = rx.recv() => received,
            }
        };

        let Some(request_id) = next else {
            break;
        };

        if let Err(e) = process_request(&state, request_id).await {
            // The failure is recorded on the request row where possible;
            // this is the fallback for infrastructure errors.
            error!(worker_id, request_id = %request_id, "analysis failed: {e}");
        }
    }
    info!(worker_id, "analysis worker stopped");
}

/// Processes one queued request end to end.
async fn process_request(
    state: &AppState,
    request_id: Uuid,
) -> Result<(), lms_core::ports::PortError> {
    if !state.db.mark_request_processing(request_id).await? {
        // Already claimed, reaped or otherwise terminal.
        info!(request_id = %request_id, "skipping request not in queued state");
        return Ok(());
    }

    let request = state.db.get_request(request_id).await?;
    let document = state.db.get_document(request.document_id).await?;

    // Options were validated at submission; failing here means the stored
    // row was tampered with or the validation rules drifted.
    let task = match AnalysisTask::from_parts(request.task, &request.task_options) {
        Ok(task) => task,
        Err(e) => {
            state.db.fail_request(request_id, &e.to_string()).await?;
            return Ok(());
        }
    };

    let prompt = build_prompt(&task, &document.extracted_text);

    let generated = match timeout(state.config.analysis_timeout, state.generation.generate(&prompt))
        .await
    {
        Err(_) => {
            let message = format!(
                "analysis timed out after {}s",
                state.config.analysis_timeout.as_secs()
            );
            warn!(request_id = %request_id, "{message}");
            state.db.fail_request(request_id, &message).await?;
            return Ok(());
        }
        Ok(Err(e)) => {
            state.db.fail_request(request_id, &e.to_string()).await?;
            return Ok(());
        }
        Ok(Ok(content)) => content,
    };

    let content = render_content(&generated, request.response_format);
    let references = extract_page_references(&content, &document.extracted_text);
    let result = AnalysisResult {
        kind: request.task,
        content,
        references,
    };

    let completed = state
        .db
        .complete_request(request_id, &result, state.generation.model_name(), None)
        .await?;
    if completed {
        info!(request_id = %request_id, task = request.task.as_str(), "analysis done");
    } else {
        // The reaper beat us to it; the terminal state stands.
        warn!(request_id = %request_id, "request left processing before completion");
    }

    Ok(())
}

//=========================================================================================
// Stalled-request Reaper
//=========================================================================================

/// Periodically fails requests that have sat in `processing` longer than the
/// stall deadline, so a crashed worker cannot strand a request forever.
pub async fn stalled_request_reaper(state: Arc<AppState>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(state.config.reaper_interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let deadline = match ChronoDuration::from_std(state.config.stall_deadline) {
            Ok(d) => Utc::now() - d,
            Err(e) => {
                error!("invalid stall deadline: {e}");
                break;
            }
        };

        match state.db.fail_stalled_requests(deadline).await {
            Ok(0) => {}
            Ok(n) => warn!("reaped {n} stalled analysis requests"),
            Err(e) => error!("stalled-request sweep failed: {e}"),
        }
    }
    info!("stalled-request reaper stopped");
}
