//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        db::DbAdapter, generation_llm::OpenAiGenerationAdapter, pdf::LopdfExtractor,
        question_llm::OpenAiQuestionAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        analysis::{analyze_handler, documents_handler, status_handler, upload_handler},
        analysis_worker::{analysis_worker, stalled_request_reaper},
        live::{
            live_answer_handler, live_create_handler, live_end_handler, live_join_handler,
            live_next_handler, live_state_handler,
        },
        quiz::create_quiz_handler,
        require_identity,
        state::AppState,
        ApiDoc,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter
        .run_migrations()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let extraction = Arc::new(LopdfExtractor::new());
    let generation = Arc::new(OpenAiGenerationAdapter::new(
        openai_client.clone(),
        config.analysis_model.clone(),
    ));
    let questions = Arc::new(OpenAiQuestionAdapter::new(
        openai_client.clone(),
        config.question_model.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let (queue_tx, queue_rx) = mpsc::channel(config.analysis_queue_capacity);
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        extraction,
        generation,
        questions,
        analysis_queue: queue_tx,
    });

    // --- 5. Spawn the Analysis Worker Pool & Reaper ---
    let shutdown = CancellationToken::new();
    let queue = Arc::new(Mutex::new(queue_rx));
    for worker_id in 0..config.analysis_workers {
        tokio::spawn(analysis_worker(
            worker_id,
            app_state.clone(),
            queue.clone(),
            shutdown.clone(),
        ));
    }
    tokio::spawn(stalled_request_reaper(app_state.clone(), shutdown.clone()));
    info!(
        "Spawned {} analysis workers (queue capacity {})",
        config.analysis_workers, config.analysis_queue_capacity
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static("x-user-id"),
        ]);

    // --- 6. Create the Web Router ---
    let api_router = Router::new()
        .route("/analysis/upload", post(upload_handler))
        .route("/analysis/analyze", post(analyze_handler))
        .route("/analysis/status/{request_id}", get(status_handler))
        .route("/analysis/documents", get(documents_handler))
        .route("/quizzes", post(create_quiz_handler))
        .route("/live/create", post(live_create_handler))
        .route("/live/join", post(live_join_handler))
        .route("/live/{room_code}/state", get(live_state_handler))
        .route("/live/{room_code}/answer", post(live_answer_handler))
        .route("/live/{room_code}/next", post(live_next_handler))
        .route("/live/{room_code}/end", post(live_end_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_identity,
        ))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes + 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    shutdown.cancel();
    Ok(())
}
