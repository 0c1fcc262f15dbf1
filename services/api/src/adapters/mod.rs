pub mod db;
pub mod generation_llm;
pub mod pdf;
pub mod question_llm;

pub use db::DbAdapter;
pub use generation_llm::OpenAiGenerationAdapter;
pub use pdf::LopdfExtractor;
pub use question_llm::OpenAiQuestionAdapter;
