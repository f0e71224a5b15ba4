//! Canonical form of a task, used for every equality check.
//!
//! Two tasks are "the same" when their canonical forms match. The canonical
//! form is never shown to users.

/// Trim surrounding whitespace and lowercase.
pub fn canon(text: &str) -> String {
    text.trim().to_lowercase()
}
