//! Form response entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single submitted response to a form.
///
/// The `data` blob holds the respondent's answers keyed by field identifier.
/// Field identifiers are chosen by the form designer at design time, so the
/// blob is schemaless from this crate's point of view; the filter compilers
/// in `formhub-query` address keys inside it dynamically.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FormResponse {
    /// Unique response identifier.
    pub id: Uuid,
    /// The form this response was submitted to.
    pub form_id: Uuid,
    /// Answers keyed by field identifier.
    pub data: serde_json::Value,
    /// Respondent metadata (user agent, referrer, etc.).
    pub metadata: Option<serde_json::Value>,
    /// When the respondent submitted the response.
    pub submitted_at: DateTime<Utc>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl FormResponse {
    /// Look up the raw answer value for a field, if present.
    pub fn answer(&self, field_id: &str) -> Option<&serde_json::Value> {
        self.data.get(field_id)
    }

    /// Look up a field's answer rendered as text.
    ///
    /// Strings are returned as-is; numbers and booleans are stringified the
    /// way the storage engines render them; null, arrays, and objects yield
    /// `None`.
    pub fn answer_text(&self, field_id: &str) -> Option<String> {
        match self.answer(field_id)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Payload for inserting a new form response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFormResponse {
    /// The form being responded to.
    pub form_id: Uuid,
    /// Answers keyed by field identifier.
    pub data: serde_json::Value,
    /// Respondent metadata.
    pub metadata: Option<serde_json::Value>,
    /// Submission timestamp.
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FormResponse {
        FormResponse {
            id: Uuid::new_v4(),
            form_id: Uuid::new_v4(),
            data: serde_json::json!({
                "color": "red",
                "rating": 4,
                "subscribed": true,
                "toppings": ["cheese", "olives"]
            }),
            metadata: None,
            submitted_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_answer_lookup() {
        let response = sample();
        assert!(response.answer("color").is_some());
        assert!(response.answer("missing").is_none());
    }

    #[test]
    fn test_answer_text() {
        let response = sample();
        assert_eq!(response.answer_text("color").as_deref(), Some("red"));
        assert_eq!(response.answer_text("rating").as_deref(), Some("4"));
        assert_eq!(response.answer_text("subscribed").as_deref(), Some("true"));
        assert_eq!(response.answer_text("toppings"), None);
        assert_eq!(response.answer_text("missing"), None);
    }
}
