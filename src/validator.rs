//! Request validation shared by both calculators.
//!
//! Validators are pure: they take raw request input and either return the
//! normalized value the engines expect or a [`ValidationError`] naming the
//! first problem found.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::ValidationError;

lazy_static! {
    static ref INVALID_CHAR_REGEX: Regex = Regex::new(r"[^a-zA-Z0-9\s.,!?-]").unwrap();
}

/// Largest integer a JSON number (IEEE double) represents exactly.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Size limits applied before any computation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum substring input length, in characters, after trimming.
    pub max_text_len: usize,
    /// Maximum number of slots in a flattened tree.
    pub max_tree_slots: usize,
    /// Maximum number of items in one batch request.
    pub max_batch_items: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_text_len: 1000,
            max_tree_slots: 65_536,
            max_batch_items: 100,
        }
    }
}

/// Validate text for the substring calculator.
///
/// Returns the trimmed text on success. Checks run in order: empty, length,
/// then the accepted character set (ASCII letters, digits, whitespace and
/// `. , ! ? -`).
///
/// # Examples
/// ```
/// use calculator::validator::{validate_substring_input, Limits};
///
/// let text = validate_substring_input("  pwwkew ", &Limits::default()).unwrap();
/// assert_eq!(text, "pwwkew");
/// ```
pub fn validate_substring_input(text: &str, limits: &Limits) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    let length = trimmed.chars().count();
    if length > limits.max_text_len {
        return Err(ValidationError::TooLong {
            length,
            max: limits.max_text_len,
        });
    }

    if let Some(m) = INVALID_CHAR_REGEX.find(trimmed) {
        let position = trimmed[..m.start()].chars().count();
        // A match always covers at least one character
        let character = m.as_str().chars().next().unwrap_or_default();
        return Err(ValidationError::InvalidCharacter {
            character,
            position,
        });
    }

    Ok(trimmed.to_string())
}

/// Validate flattened tree slots.
///
/// `None` is the absence marker. Present values must be finite, integral and
/// within `±MAX_SAFE_INTEGER`.
pub fn validate_tree_input(
    slots: &[Option<f64>],
    limits: &Limits,
) -> Result<Vec<Option<i64>>, ValidationError> {
    if slots.is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    if slots.len() > limits.max_tree_slots {
        return Err(ValidationError::TooLong {
            length: slots.len(),
            max: limits.max_tree_slots,
        });
    }

    slots
        .iter()
        .enumerate()
        .map(|(index, slot)| match slot {
            None => Ok(None),
            Some(v) if v.is_finite() && v.fract() == 0.0 && v.abs() <= MAX_SAFE_INTEGER => {
                Ok(Some(*v as i64))
            }
            Some(_) => Err(ValidationError::InvalidValue { index }),
        })
        .collect()
}

/// Convert the JSON `nodes` array of a request body into raw slots.
///
/// `null` becomes the absence marker; anything that is not a number is
/// rejected with its index.
pub fn slots_from_json(values: &[Value]) -> Result<Vec<Option<f64>>, ValidationError> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| match value {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_f64()
                .map(Some)
                .ok_or(ValidationError::InvalidValue { index }),
            _ => Err(ValidationError::InvalidValue { index }),
        })
        .collect()
}

/// Tokenize comma-separated tree text as typed into the client form.
///
/// `null` (any case) marks an absent slot; every other token must be a
/// decimal numeral, optionally negative. Blank input yields no slots.
///
/// # Examples
/// ```
/// use calculator::validator::parse_tree_text;
///
/// let slots = parse_tree_text("10, 5, NULL, -3").unwrap();
/// assert_eq!(slots, vec![Some(10.0), Some(5.0), None, Some(-3.0)]);
/// ```
pub fn parse_tree_text(text: &str) -> Result<Vec<Option<f64>>, ValidationError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    text.split(',')
        .enumerate()
        .map(|(index, token)| {
            let token = token.trim();
            if token.eq_ignore_ascii_case("null") {
                Ok(None)
            } else {
                token
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| ValidationError::InvalidValue { index })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", ValidationError::EmptyInput)]
    #[case("   \t\n", ValidationError::EmptyInput)]
    #[case("abc#def", ValidationError::InvalidCharacter { character: '#', position: 3 })]
    #[case("  é", ValidationError::InvalidCharacter { character: 'é', position: 0 })]
    #[case("ok; no", ValidationError::InvalidCharacter { character: ';', position: 2 })]
    fn rejects_bad_text(#[case] input: &str, #[case] expected: ValidationError) {
        assert_eq!(
            validate_substring_input(input, &Limits::default()),
            Err(expected)
        );
    }

    #[test]
    fn accepts_punctuation_and_inner_whitespace() {
        let text = validate_substring_input(" Hello, world! Is it 4-ever? yes. ", &Limits::default());
        assert_eq!(text.as_deref(), Ok("Hello, world! Is it 4-ever? yes."));
    }

    #[test]
    fn length_limit_counts_trimmed_characters() {
        let limits = Limits {
            max_text_len: 4,
            ..Limits::default()
        };
        assert!(validate_substring_input("  abcd  ", &limits).is_ok());
        assert_eq!(
            validate_substring_input("abcde", &limits),
            Err(ValidationError::TooLong { length: 5, max: 4 })
        );
    }

    #[test]
    fn default_text_limit_is_one_thousand() {
        let limits = Limits::default();
        assert!(validate_substring_input(&"a".repeat(1000), &limits).is_ok());
        assert!(matches!(
            validate_substring_input(&"a".repeat(1001), &limits),
            Err(ValidationError::TooLong { length: 1001, max: 1000 })
        ));
    }

    #[rstest]
    #[case(vec![Some(f64::NAN)], 0)]
    #[case(vec![Some(1.0), Some(f64::INFINITY)], 1)]
    #[case(vec![Some(1.0), None, Some(2.5)], 2)]
    #[case(vec![Some(1e300)], 0)]
    fn rejects_bad_slots(#[case] slots: Vec<Option<f64>>, #[case] index: usize) {
        assert_eq!(
            validate_tree_input(&slots, &Limits::default()),
            Err(ValidationError::InvalidValue { index })
        );
    }

    #[test]
    fn tree_input_normalizes_to_integers() {
        let slots = [Some(-10.0), Some(9.0), None, Some(0.0)];
        assert_eq!(
            validate_tree_input(&slots, &Limits::default()),
            Ok(vec![Some(-10), Some(9), None, Some(0)])
        );
        assert_eq!(
            validate_tree_input(&[], &Limits::default()),
            Err(ValidationError::EmptyInput)
        );
    }

    #[test]
    fn tree_slot_limit() {
        let limits = Limits {
            max_tree_slots: 2,
            ..Limits::default()
        };
        assert_eq!(
            validate_tree_input(&[None, None, None], &limits),
            Err(ValidationError::TooLong { length: 3, max: 2 })
        );
    }

    #[test]
    fn json_slots_reject_non_numbers() {
        let values: Vec<Value> = serde_json::from_str(r#"[1, null, -2.0, "3"]"#).unwrap();
        assert_eq!(
            slots_from_json(&values),
            Err(ValidationError::InvalidValue { index: 3 })
        );

        let values: Vec<Value> = serde_json::from_str("[1, null, -2]").unwrap();
        assert_eq!(
            slots_from_json(&values),
            Ok(vec![Some(1.0), None, Some(-2.0)])
        );
    }

    #[test]
    fn tree_text_tokens() {
        assert_eq!(parse_tree_text("  "), Ok(vec![]));
        assert_eq!(
            parse_tree_text("1,Null,nULL , 7"),
            Ok(vec![Some(1.0), None, None, Some(7.0)])
        );
        assert_eq!(
            parse_tree_text("1,,2"),
            Err(ValidationError::InvalidValue { index: 1 })
        );
        assert_eq!(
            parse_tree_text("1,two"),
            Err(ValidationError::InvalidValue { index: 1 })
        );
    }
}
