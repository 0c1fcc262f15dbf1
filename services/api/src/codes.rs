//! services/api/src/codes.rs
//!
//! Short numeric codes for joining quizzes and live rooms. Numeric only so
//! they are easy to type and read out loud.

use rand::Rng;

/// Generates a random numeric code of the given length. Uniqueness is the
/// caller's problem (checked against the database, regenerate on collision).
pub fn numeric_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(0..=9).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_have_requested_length() {
        assert_eq!(numeric_code(6).len(), 6);
        assert_eq!(numeric_code(8).len(), 8);
    }

    #[test]
    fn codes_are_digits_only() {
        let code = numeric_code(32);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
}
