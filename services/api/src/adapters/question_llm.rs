use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use lms_core::domain::Difficulty;
use lms_core::ports::{PortError, PortResult, QuestionGenerationService};
use lms_core::quiz::GeneratedQuestion;

/// Chat-completions adapter behind the `QuestionGenerationService` port.
///
/// The model is asked for a raw JSON array; the caller is responsible for
/// normalizing whatever comes back (see `lms_core::quiz::normalize_questions`).
pub struct OpenAiQuestionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiQuestionAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Models often wrap JSON in prose or markdown fences; keep only the
/// outermost `[...]` slice before parsing.
fn json_array_slice(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

#[async_trait]
impl QuestionGenerationService for OpenAiQuestionAdapter {
    async fn generate_questions(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: usize,
    ) -> PortResult<Vec<GeneratedQuestion>> {
        let prompt = format!(
            "Generate {count} multiple-choice quiz questions about \"{topic}\" at {} \
             difficulty.\n\
             Respond with ONLY a JSON array, no markdown, no explanation. Each element must \
             have exactly these keys:\n\
             - \"question\": the question text\n\
             - \"options\": an array of exactly 4 answer strings\n\
             - \"correct_answer\": the 0-based index of the correct option\n\
             - \"explanation\": one sentence explaining the correct answer",
            difficulty.as_str()
        );

        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(
                        "You are a quiz author. You always answer with strictly valid JSON \
                         and nothing else.",
                    )
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.7)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| PortError::Unexpected("No questions generated".to_string()))?;

        let slice = json_array_slice(&content)
            .ok_or_else(|| PortError::Unexpected("Response contained no JSON array".to_string()))?;

        serde_json::from_str(slice)
            .map_err(|e| PortError::Unexpected(format!("Could not parse question JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::json_array_slice;

    #[test]
    fn strips_markdown_fences_around_array() {
        let raw = "```json\n[{\"question\": \"q\"}]\n```";
        assert_eq!(json_array_slice(raw), Some("[{\"question\": \"q\"}]"));
    }

    #[test]
    fn rejects_text_without_array() {
        assert_eq!(json_array_slice("I cannot help with that."), None);
    }
}
