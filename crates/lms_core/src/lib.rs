pub mod analysis;
pub mod domain;
pub mod live;
pub mod ports;
pub mod quiz;

pub use domain::{
    AnalysisDocument, AnalysisRequest, AnalysisResult, AnswerOutcome, Difficulty,
    LeaderboardEntry, LiveParticipant, LiveSession, QuestionWithChoices, Quiz, QuizChoice,
    QuizQuestion, RequestStatus, ResponseFormat, TaskKind, TaskOptions, User,
};
pub use ports::{
    ContentGenerationService, DatabaseService, PortError, PortResult, QuestionGenerationService,
    TextExtractionService,
};
