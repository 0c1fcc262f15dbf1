//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use lms_core::ports::{
    ContentGenerationService, DatabaseService, QuestionGenerationService, TextExtractionService,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub extraction: Arc<dyn TextExtractionService>,
    pub generation: Arc<dyn ContentGenerationService>,
    pub questions: Arc<dyn QuestionGenerationService>,
    /// Bounded hand-off to the analysis worker pool. A full queue means the
    /// pipeline is saturated and submissions are refused with 503.
    pub analysis_queue: mpsc::Sender<Uuid>,
}
