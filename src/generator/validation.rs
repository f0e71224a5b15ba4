//! Schema checks on a generated batch.

use std::collections::HashSet;

use serde_json::Value;

use crate::canon::canon;
use crate::error::{DailyKindError, Result};

/// Validate a generator payload and return its items.
///
/// The payload must be an array of non-blank strings, each at most
/// `max_words` whitespace-separated words, with pairwise distinct canonical
/// forms. When `expected` is given the array must have exactly that length.
///
/// # Errors
///
/// Returns [`DailyKindError::Schema`] describing the first violation found.
pub fn validate_tasks(payload: &Value, expected: Option<usize>, max_words: usize) -> Result<Vec<String>> {
    let Some(items) = payload.as_array() else {
        return Err(DailyKindError::Schema("tasks result is not an array".into()));
    };

    if let Some(expected) = expected
        && items.len() != expected
    {
        return Err(DailyKindError::Schema(format!(
            "expected {expected} items, got {}",
            items.len()
        )));
    }

    let mut seen = HashSet::with_capacity(items.len());
    let mut tasks = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(DailyKindError::Schema(format!("item {index} is not a string")));
        };
        if text.trim().is_empty() {
            return Err(DailyKindError::Schema(format!("item {index} is blank")));
        }
        let words = text.split_whitespace().count();
        if words > max_words {
            return Err(DailyKindError::Schema(format!(
                "item {index} exceeds {max_words} words ({words})"
            )));
        }
        if !seen.insert(canon(text)) {
            return Err(DailyKindError::Schema(format!(
                "item {index} is a duplicate or near-duplicate"
            )));
        }
        tasks.push(text.to_owned());
    }

    Ok(tasks)
}

/// Check an already-typed list for exact size and pairwise uniqueness.
pub fn validate_list(tasks: &[String], expected: usize, max_words: usize) -> Result<()> {
    let payload = Value::Array(tasks.iter().cloned().map(Value::String).collect());
    validate_tasks(&payload, Some(expected), max_words).map(|_| ())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_valid_batch() {
        let payload = json!(["Smile at a neighbour.", "Write a thank-you note."]);
        let tasks = validate_tasks(&payload, None, 15).unwrap();
        assert_eq!(tasks, vec!["Smile at a neighbour.", "Write a thank-you note."]);
    }

    #[test]
    fn rejects_non_array() {
        let err = validate_tasks(&json!({"tasks": []}), None, 15).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_INVALID");
        assert!(err.to_string().contains("not an array"));
    }

    #[test]
    fn rejects_non_string_item() {
        let err = validate_tasks(&json!(["ok", 42]), None, 15).unwrap_err();
        assert!(err.to_string().contains("item 1 is not a string"));
    }

    #[test]
    fn enforces_expected_length_only_when_given() {
        let payload = json!(["a", "b", "c"]);
        assert!(validate_tasks(&payload, None, 15).is_ok());
        assert!(validate_tasks(&payload, Some(3), 15).is_ok());
        let err = validate_tasks(&payload, Some(4), 15).unwrap_err();
        assert!(err.to_string().contains("expected 4 items, got 3"));
    }

    #[test]
    fn word_limit_is_inclusive() {
        let fifteen = vec!["word"; 15].join(" ");
        let sixteen = vec!["word"; 16].join(" ");
        assert!(validate_tasks(&json!([fifteen]), None, 15).is_ok());
        let err = validate_tasks(&json!([sixteen]), None, 15).unwrap_err();
        assert!(err.to_string().contains("exceeds 15 words"));
    }

    #[test]
    fn surrounding_whitespace_does_not_count_as_words() {
        let padded = format!("  {}  ", vec!["word"; 15].join(" "));
        assert!(validate_tasks(&json!([padded]), None, 15).is_ok());
    }

    #[test]
    fn rejects_case_insensitive_duplicates() {
        let payload = json!(["Hold the door.", "  hold THE door. "]);
        let err = validate_tasks(&payload, None, 15).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_blank_item() {
        let err = validate_tasks(&json!(["fine", "   "]), None, 15).unwrap_err();
        assert!(err.to_string().contains("blank"));
    }

    #[test]
    fn validate_list_checks_size_and_uniqueness() {
        let tasks = vec!["a".to_owned(), "b".to_owned()];
        assert!(validate_list(&tasks, 2, 15).is_ok());
        assert!(validate_list(&tasks, 3, 15).is_err());
        let dupes = vec!["a".to_owned(), "A".to_owned()];
        assert!(validate_list(&dupes, 2, 15).is_err());
    }
}
