//! crates/lms_core/src/live.rs
//!
//! Round arithmetic for live sessions. Kept out of the database adapter so
//! the advance/termination boundary can be tested directly.

/// The result of advancing a session's round pointer by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundAdvance {
    pub next_index: i32,
    /// True when the new index reaches or exceeds the question count, which
    /// transitions the session to `ended`.
    pub finished: bool,
}

pub fn advance_round(current_index: i32, question_count: i32) -> RoundAdvance {
    let next_index = current_index + 1;
    RoundAdvance {
        next_index,
        finished: next_index >= question_count,
    }
}

/// Whether `index` points at an actual question of a quiz with
/// `question_count` questions.
pub fn question_in_range(index: i32, question_count: i32) -> bool {
    index >= 0 && index < question_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_mid_quiz_keeps_the_session_running() {
        assert_eq!(
            advance_round(0, 3),
            RoundAdvance { next_index: 1, finished: false }
        );
        assert_eq!(
            advance_round(1, 3),
            RoundAdvance { next_index: 2, finished: false }
        );
    }

    #[test]
    fn advancing_past_the_last_question_finishes_the_session() {
        assert_eq!(
            advance_round(2, 3),
            RoundAdvance { next_index: 3, finished: true }
        );
        // An empty quiz finishes on the first advance.
        assert_eq!(
            advance_round(0, 0),
            RoundAdvance { next_index: 1, finished: true }
        );
    }

    #[test]
    fn range_check_matches_the_advance_boundary() {
        assert!(question_in_range(0, 3));
        assert!(question_in_range(2, 3));
        assert!(!question_in_range(3, 3));
        assert!(!question_in_range(-1, 3));
        assert!(!question_in_range(0, 0));
    }
}
