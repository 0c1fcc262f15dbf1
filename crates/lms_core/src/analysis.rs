//! crates/lms_core/src/analysis.rs
//!
//! Pure logic for the analysis pipeline: task validation, prompt
//! construction, response-format rendering, and best-effort page-reference
//! extraction. Everything here is synchronous and side-effect free so it can
//! be tested without a database or a model behind it.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{PageReference, ResponseFormat, SummarizeLength, TaskKind, TaskOptions};

/// Text recovered from one page of an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// 1-based page number.
    pub page: u32,
    pub text: String,
}

/// Concatenates extracted pages with the `Page N:` markers that the
/// page-snippet lookup relies on later.
pub fn join_pages(pages: &[ExtractedPage]) -> String {
    pages
        .iter()
        .map(|p| format!("Page {}:\n{}", p.page, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

//=========================================================================================
// Task validation
//=========================================================================================

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TaskValidationError {
    #[error("task_options.explain_topic is required for the 'explain' task")]
    MissingExplainTopic,
    #[error("task_options.question is required for the 'answer' task")]
    MissingQuestion,
}

/// A task whose required options have been checked. Requests are only
/// accepted once their raw `(kind, options)` pair parses into this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisTask {
    Summarize { length: SummarizeLength },
    Explain { topic: String },
    Answer { question: String },
}

impl AnalysisTask {
    pub fn from_parts(
        kind: TaskKind,
        options: &TaskOptions,
    ) -> Result<Self, TaskValidationError> {
        match kind {
            TaskKind::Summarize => Ok(Self::Summarize {
                length: options.summarize_length.unwrap_or_default(),
            }),
            TaskKind::Explain => {
                let topic = options
                    .explain_topic
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or(TaskValidationError::MissingExplainTopic)?;
                Ok(Self::Explain {
                    topic: topic.to_string(),
                })
            }
            TaskKind::Answer => {
                let question = options
                    .question
                    .as_deref()
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .ok_or(TaskValidationError::MissingQuestion)?;
                Ok(Self::Answer {
                    question: question.to_string(),
                })
            }
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Summarize { .. } => TaskKind::Summarize,
            Self::Explain { .. } => TaskKind::Explain,
            Self::Answer { .. } => TaskKind::Answer,
        }
    }
}

//=========================================================================================
// Prompt construction
//=========================================================================================

pub const PROMPT_PREAMBLE: &str = "You are a helpful assistant that analyzes PDF documents \
and provides accurate, well-referenced answers.";

/// Builds the full prompt sent to the content-generation service for one task
/// against the document's extracted text.
pub fn build_prompt(task: &AnalysisTask, document_text: &str) -> String {
    let body = match task {
        AnalysisTask::Summarize { length } => {
            let length_desc = match length {
                SummarizeLength::Short => "brief",
                SummarizeLength::Medium => "moderate",
                SummarizeLength::Long => "comprehensive",
            };
            format!(
                "Generate a {length_desc} summary of the provided PDF content.\n\
                 Keep references to page numbers for statements where possible.\n\n\
                 PDF Content:\n{document_text}\n\n\
                 Provide a {length_desc} summary with page references."
            )
        }
        AnalysisTask::Explain { topic } => format!(
            "Explain the following topic in the uploaded document: \"{topic}\"\n\n\
             Provide examples and point to page numbers where the topic appears.\n\n\
             PDF Content:\n{document_text}\n\n\
             Explain the topic \"{topic}\" with examples and page references."
        ),
        AnalysisTask::Answer { question } => format!(
            "Answer the user's question using only information from the supplied PDF content.\n\
             If the answer is not present, say 'I could not find that in the document.'\n\n\
             Question: {question}\n\n\
             PDF Content:\n{document_text}\n\n\
             Answer the question using only the provided content."
        ),
    };
    format!("{PROMPT_PREAMBLE}\n\n{body}")
}

//=========================================================================================
// Output post-processing
//=========================================================================================

/// Renders raw model output into the requested response format. `text` and
/// `json` leave the content untouched (the json structure is the result
/// envelope itself); `bulleted` rewrites each non-empty line as a bullet.
pub fn render_content(content: &str, format: ResponseFormat) -> String {
    match format {
        ResponseFormat::Text | ResponseFormat::Json => content.to_string(),
        ResponseFormat::Bulleted => content
            .lines()
            .map(|line| {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('•') {
                    line.to_string()
                } else {
                    format!("• {trimmed}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

static PAGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bpages?\s+(\d+)").unwrap(),
        Regex::new(r"(?i)\bp\.\s*(\d+)").unwrap(),
    ]
});

const SNIPPET_LEN: usize = 200;

/// Best-effort extraction of page references from generated prose, by
/// pattern-matching phrases like "page 3" or "p. 12". Not a contract; a
/// missed or spurious reference is acceptable.
pub fn extract_page_references(content: &str, document_text: &str) -> Vec<PageReference> {
    let mut found: Vec<u32> = Vec::new();
    for pattern in PAGE_PATTERNS.iter() {
        for captures in pattern.captures_iter(content) {
            if let Ok(page) = captures[1].parse::<u32>() {
                if !found.contains(&page) {
                    found.push(page);
                }
            }
        }
    }
    found.sort_unstable();

    found
        .into_iter()
        .map(|page| PageReference {
            page,
            text_snippet: page_snippet(document_text, page),
        })
        .collect()
}

/// Pulls the first `SNIPPET_LEN` characters of a page's text out of the
/// concatenated document, using the `Page N:` markers written at upload.
fn page_snippet(document_text: &str, page: u32) -> String {
    let marker = format!("Page {page}:");
    let Some(start) = document_text.find(&marker) else {
        return String::new();
    };
    let body = &document_text[start + marker.len()..];
    let body = body.trim_start_matches(['\n', ' ']);
    // The page runs until the next page marker or the end of the document.
    let end = body.find("\n\nPage ").unwrap_or(body.len());
    let page_text = body[..end].trim();
    page_text.chars().take(SNIPPET_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explain_without_topic_is_rejected() {
        let options = TaskOptions::default();
        assert_eq!(
            AnalysisTask::from_parts(TaskKind::Explain, &options),
            Err(TaskValidationError::MissingExplainTopic)
        );

        let blank = TaskOptions {
            explain_topic: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            AnalysisTask::from_parts(TaskKind::Explain, &blank),
            Err(TaskValidationError::MissingExplainTopic)
        );
    }

    #[test]
    fn answer_without_question_is_rejected() {
        assert_eq!(
            AnalysisTask::from_parts(TaskKind::Answer, &TaskOptions::default()),
            Err(TaskValidationError::MissingQuestion)
        );
    }

    #[test]
    fn summarize_defaults_to_medium_length() {
        let task = AnalysisTask::from_parts(TaskKind::Summarize, &TaskOptions::default()).unwrap();
        assert_eq!(
            task,
            AnalysisTask::Summarize {
                length: SummarizeLength::Medium
            }
        );
    }

    #[test]
    fn prompts_carry_the_task_specific_inputs() {
        let explain = AnalysisTask::Explain {
            topic: "photosynthesis".to_string(),
        };
        let prompt = build_prompt(&explain, "Page 1:\nplants");
        assert!(prompt.contains("\"photosynthesis\""));
        assert!(prompt.contains("plants"));

        let answer = AnalysisTask::Answer {
            question: "What year?".to_string(),
        };
        let prompt = build_prompt(&answer, "doc");
        assert!(prompt.contains("Question: What year?"));
        assert!(prompt.contains("I could not find that in the document."));
    }

    #[test]
    fn bulleted_rendering_prefixes_every_non_blank_line() {
        let raw = "First point\n\nSecond point\n• already bulleted";
        let rendered = render_content(raw, ResponseFormat::Bulleted);
        for line in rendered.lines().filter(|l| !l.trim().is_empty()) {
            assert!(line.trim_start().starts_with('•'), "line not bulleted: {line:?}");
        }
        assert_eq!(rendered, "• First point\n\n• Second point\n• already bulleted");
    }

    #[test]
    fn text_rendering_is_a_passthrough() {
        let raw = "one\ntwo";
        assert_eq!(render_content(raw, ResponseFormat::Text), raw);
        assert_eq!(render_content(raw, ResponseFormat::Json), raw);
    }

    #[test]
    fn page_references_are_deduplicated_and_sorted() {
        let doc = "Page 2:\nSecond page body.\n\nPage 7:\nSeventh page body.";
        let content = "See p. 7 for details; page 2 introduces it, and Page 2 repeats.";
        let refs = extract_page_references(content, doc);

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].page, 2);
        assert_eq!(refs[0].text_snippet, "Second page body.");
        assert_eq!(refs[1].page, 7);
        assert_eq!(refs[1].text_snippet, "Seventh page body.");
    }

    #[test]
    fn references_to_unknown_pages_get_empty_snippets() {
        let refs = extract_page_references("mentioned on page 42", "Page 1:\nonly page");
        assert_eq!(refs, vec![PageReference { page: 42, text_snippet: String::new() }]);
    }

    #[test]
    fn join_pages_writes_the_markers_snippets_depend_on() {
        let pages = vec![
            ExtractedPage { page: 1, text: "alpha".to_string() },
            ExtractedPage { page: 3, text: "gamma".to_string() },
        ];
        let joined = join_pages(&pages);
        assert_eq!(joined, "Page 1:\nalpha\n\nPage 3:\ngamma");
        assert_eq!(page_snippet(&joined, 3), "gamma");
    }

    #[test]
    fn long_page_text_is_truncated_in_snippets() {
        let long = "x".repeat(500);
        let doc = format!("Page 1:\n{long}");
        let snippet = page_snippet(&doc, 1);
        assert_eq!(snippet.len(), SNIPPET_LEN);
    }
}
