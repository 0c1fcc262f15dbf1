pub mod analysis;
pub mod analysis_worker;
pub mod live;
pub mod middleware;
pub mod quiz;
pub mod state;

pub use middleware::require_identity;
pub use state::AppState;

use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        analysis::upload_handler,
        analysis::analyze_handler,
        analysis::status_handler,
        analysis::documents_handler,
        quiz::create_quiz_handler,
        live::live_create_handler,
        live::live_join_handler,
        live::live_state_handler,
        live::live_answer_handler,
        live::live_next_handler,
        live::live_end_handler,
    ),
    components(
        schemas(
            analysis::DocumentView,
            analysis::UploadResponse,
            analysis::AnalyzeRequest,
            analysis::AnalyzeResponse,
            analysis::StatusResponse,
            quiz::CreateQuizRequest,
            quiz::QuizView,
            live::LiveCreateRequest,
            live::LiveCreateResponse,
            live::LiveJoinRequest,
            live::LiveJoinResponse,
            live::LiveAnswerRequest,
            live::LiveAnswerResponse,
            live::LiveAdvanceResponse,
            live::LiveEndResponse,
            live::ChoiceView,
            live::QuestionView,
            live::LeaderboardEntryView,
            live::LiveStateResponse,
        )
    ),
    tags(
        (name = "LMS Core API", description = "PDF analysis and live quiz endpoints.")
    )
)]
pub struct ApiDoc;
