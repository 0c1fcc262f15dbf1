//! crates/lms_core/src/quiz.rs
//!
//! Pure logic for quiz creation: normalizing AI-generated question sets and
//! the deterministic templated fallback used when generation is unavailable
//! or failing.

use serde::Deserialize;

use crate::domain::Difficulty;
use crate::ports::{NewChoice, NewQuestion};

/// Every question is worth one point, matching the live-session scoring.
pub const POINTS_PER_QUESTION: i32 = 1;

const OPTIONS_PER_QUESTION: usize = 4;

/// One multiple-choice question as produced by a generation backend, before
/// normalization. `Deserialize` so the AI adapter can parse model JSON
/// straight into it.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: String,
}

//=========================================================================================
// Deterministic fallback
//=========================================================================================

const FALLBACK_STEMS: [&str; 4] = [
    "Which statement about {topic} is accurate?",
    "Which of the following best describes {topic}?",
    "Which option is most closely associated with {topic}?",
    "Which of these would an instructor accept as correct about {topic}?",
];

/// Produces `count` templated questions about `topic`. Fully deterministic:
/// the same inputs always yield the same questions, and question texts are
/// unique within one call.
pub fn fallback_questions(
    topic: &str,
    difficulty: Difficulty,
    count: usize,
) -> Vec<GeneratedQuestion> {
    (0..count)
        .map(|i| {
            let stem = FALLBACK_STEMS[i % FALLBACK_STEMS.len()].replace("{topic}", topic);
            let question = if i < FALLBACK_STEMS.len() {
                stem
            } else {
                format!("Review question {}: {stem}", i + 1)
            };
            GeneratedQuestion {
                question,
                options: vec![
                    format!("A common misconception about {topic}"),
                    format!("The generally accepted description of {topic}"),
                    format!("A statement unrelated to {topic}"),
                    format!("An outdated view of {topic}"),
                ],
                correct_answer: 1,
                explanation: format!(
                    "Placeholder {} question generated without AI assistance.",
                    difficulty.as_str()
                ),
            }
        })
        .collect()
}

//=========================================================================================
// Normalization
//=========================================================================================

/// Normalizes a raw generated set into exactly `count` well-formed questions:
/// malformed entries are dropped, options are truncated/padded to four with
/// the correct index clamped into range, duplicate question texts are
/// removed, and shortfalls are padded from the deterministic fallback.
pub fn normalize_questions(
    raw: Vec<GeneratedQuestion>,
    topic: &str,
    difficulty: Difficulty,
    count: usize,
) -> Vec<GeneratedQuestion> {
    let mut seen: Vec<String> = Vec::new();
    let mut normalized: Vec<GeneratedQuestion> = Vec::new();

    for mut q in raw {
        let text = q.question.trim();
        if text.is_empty() || q.options.len() < 2 {
            continue;
        }
        if seen.iter().any(|s| s == text) {
            continue;
        }
        seen.push(text.to_string());
        q.question = text.to_string();

        q.options.truncate(OPTIONS_PER_QUESTION);
        if q.correct_answer >= q.options.len() {
            q.correct_answer = 0;
        }
        let mut pad = 1;
        while q.options.len() < OPTIONS_PER_QUESTION {
            q.options.push(format!("None of the above ({pad})"));
            pad += 1;
        }

        normalized.push(q);
        if normalized.len() == count {
            break;
        }
    }

    if normalized.len() < count {
        for filler in fallback_questions(topic, difficulty, count) {
            if normalized.len() == count {
                break;
            }
            if !seen.iter().any(|s| s == &filler.question) {
                seen.push(filler.question.clone());
                normalized.push(filler);
            }
        }
    }

    normalized
}

/// Turns normalized questions into the write model persisted with the quiz.
/// Guarantees exactly one correct choice per question: if the correct index
/// somehow marks nothing, the first choice is forced correct.
pub fn into_new_questions(questions: Vec<GeneratedQuestion>) -> Vec<NewQuestion> {
    questions
        .into_iter()
        .map(|q| {
            let mut choices: Vec<NewChoice> = q
                .options
                .iter()
                .enumerate()
                .map(|(i, text)| NewChoice {
                    choice_text: text.clone(),
                    is_correct: i == q.correct_answer,
                })
                .collect();

            if !choices.iter().any(|c| c.is_correct) {
                if let Some(first) = choices.first_mut() {
                    first.is_correct = true;
                }
            }

            NewQuestion {
                question_text: q.question,
                points: POINTS_PER_QUESTION,
                choices,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generated(text: &str, options: &[&str], correct: usize) -> GeneratedQuestion {
        GeneratedQuestion {
            question: text.to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: correct,
            explanation: String::new(),
        }
    }

    #[test]
    fn fallback_produces_count_unique_questions_with_valid_correct_index() {
        let questions = fallback_questions("algebra", Difficulty::Mixed, 10);
        assert_eq!(questions.len(), 10);

        let mut texts: Vec<&str> = questions.iter().map(|q| q.question.as_str()).collect();
        texts.sort_unstable();
        texts.dedup();
        assert_eq!(texts.len(), 10);

        for q in &questions {
            assert!(q.correct_answer < q.options.len());
            assert_eq!(q.options.len(), OPTIONS_PER_QUESTION);
        }
    }

    #[test]
    fn fallback_is_deterministic() {
        let a = fallback_questions("history", Difficulty::Easy, 5);
        let b = fallback_questions("history", Difficulty::Easy, 5);
        let texts = |qs: &[GeneratedQuestion]| {
            qs.iter().map(|q| q.question.clone()).collect::<Vec<_>>()
        };
        assert_eq!(texts(&a), texts(&b));
    }

    #[test]
    fn normalize_drops_malformed_and_duplicate_entries() {
        let raw = vec![
            generated("", &["a", "b"], 0),
            generated("lonely option", &["only one"], 0),
            generated("keeper", &["a", "b", "c", "d"], 2),
            generated("keeper", &["a", "b", "c", "d"], 1),
        ];
        let out = normalize_questions(raw, "t", Difficulty::Easy, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].question, "keeper");
        assert_eq!(out[0].correct_answer, 2);
    }

    #[test]
    fn normalize_pads_options_and_clamps_the_correct_index() {
        let raw = vec![generated("short", &["yes", "no"], 7)];
        let out = normalize_questions(raw, "t", Difficulty::Easy, 1);
        assert_eq!(out[0].options.len(), OPTIONS_PER_QUESTION);
        assert_eq!(out[0].correct_answer, 0);
    }

    #[test]
    fn normalize_pads_shortfalls_from_the_fallback_and_truncates_excess() {
        let raw = vec![generated("real one", &["a", "b", "c", "d"], 0)];
        let out = normalize_questions(raw, "chemistry", Difficulty::Hard, 3);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].question, "real one");

        let many: Vec<_> = (0..8)
            .map(|i| generated(&format!("q{i}"), &["a", "b", "c", "d"], 0))
            .collect();
        assert_eq!(normalize_questions(many, "t", Difficulty::Easy, 5).len(), 5);
    }

    #[test]
    fn every_planned_question_has_exactly_one_correct_choice() {
        let questions = normalize_questions(
            vec![
                generated("q1", &["a", "b", "c", "d"], 3),
                generated("q2", &["a", "b"], 9),
            ],
            "t",
            Difficulty::Mixed,
            2,
        );
        for planned in into_new_questions(questions) {
            let correct = planned.choices.iter().filter(|c| c.is_correct).count();
            assert_eq!(correct, 1, "question {:?}", planned.question_text);
        }
    }

    #[test]
    fn unmarked_sets_force_the_first_choice_correct() {
        // Bypass normalization to simulate a generation bug where the index
        // marks nothing.
        let q = GeneratedQuestion {
            question: "odd".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            correct_answer: 5,
            explanation: String::new(),
        };
        let planned = into_new_questions(vec![q]);
        assert!(planned[0].choices[0].is_correct);
        assert_eq!(planned[0].choices.iter().filter(|c| c.is_correct).count(), 1);
    }
}
