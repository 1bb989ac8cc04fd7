//! Field identifier sanitization.
//!
//! Field identifiers name dynamic keys inside a response's answer blob.
//! The relational compiler interpolates them directly into SQL as
//! `data->'<field>'` path fragments — JSON path keys cannot be bound as
//! parameters in standard SQL — so an identifier that fails this check
//! aborts compilation for the whole request. Values, in contrast, are
//! always bound as parameters and never pass through here.

use formhub_core::{AppError, AppResult};

/// Whether a field identifier consists solely of `[A-Za-z0-9_-]`.
pub fn is_safe_field_id(field_id: &str) -> bool {
    !field_id.is_empty()
        && field_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Validate a field identifier before it is rendered into query text.
///
/// Returns the identifier unchanged on success. Any character outside
/// `[A-Za-z0-9_-]` (and the empty string) is rejected with a fatal
/// validation error; this is a security boundary, not a recoverable
/// condition.
pub fn ensure_safe_field_id(field_id: &str) -> AppResult<&str> {
    if is_safe_field_id(field_id) {
        Ok(field_id)
    } else {
        Err(AppError::validation(format!(
            "Unsafe field identifier: {field_id:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_word_characters() {
        assert_eq!(ensure_safe_field_id("field-1_2").expect("safe"), "field-1_2");
        assert!(ensure_safe_field_id("ABCxyz09").is_ok());
    }

    #[test]
    fn test_rejects_injection_attempt() {
        assert!(ensure_safe_field_id("field'); DROP TABLE response;--").is_err());
    }

    #[test]
    fn test_rejects_path_and_quote_characters() {
        for bad in ["a.b", "a b", "a'b", "a\"b", "a->b", "data'||'", "a\\b", "a\u{0}b", "émoji"] {
            assert!(ensure_safe_field_id(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_rejects_empty() {
        assert!(ensure_safe_field_id("").is_err());
    }
}
