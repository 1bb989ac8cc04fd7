//! Sort resolution for response listings.
//!
//! Callers sort either by a fixed response column or by a dynamic field
//! inside the answer blob, referenced as `data.<fieldId>`. Invalid input
//! never fails the request: anything unrecognized falls back to the
//! default `submittedAt desc`.
//!
//! Dynamic-field ordering compares extracted values as raw text on every
//! backend, so numeric answers sort lexicographically ("10" < "15" < "5").
//! Legacy behavior, kept deliberately.

use bson::{Document, doc};

use formhub_core::types::sorting::SortDirection;

use crate::ident::is_safe_field_id;

/// Prefix marking a dynamic-field sort reference.
const DATA_FIELD_PREFIX: &str = "data.";

/// What a response listing is ordered by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSortKey {
    /// The submission timestamp column.
    SubmittedAt,
    /// The record creation timestamp column.
    CreatedAt,
    /// The record update timestamp column.
    UpdatedAt,
    /// A dynamic field extracted from the answer blob. The identifier has
    /// passed the safe-character check during resolution.
    DataField(String),
}

/// A resolved, always-valid sort specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSort {
    /// The resolved sort key.
    pub key: ResponseSortKey,
    /// The resolved direction.
    pub direction: SortDirection,
}

impl Default for ResponseSort {
    fn default() -> Self {
        Self {
            key: ResponseSortKey::SubmittedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl ResponseSort {
    /// Resolve raw caller input into a valid sort.
    ///
    /// Recognized keys are the fixed columns and `data.<fieldId>` references
    /// whose field identifier passes the safe-character check; everything
    /// else resolves to the default key. Directions other than
    /// `asc` / `desc` resolve to descending.
    pub fn resolve(sort_by: Option<&str>, sort_order: Option<&str>) -> Self {
        let key = match sort_by {
            Some("submittedAt") => ResponseSortKey::SubmittedAt,
            Some("createdAt") => ResponseSortKey::CreatedAt,
            Some("updatedAt") => ResponseSortKey::UpdatedAt,
            Some(raw) => match raw.strip_prefix(DATA_FIELD_PREFIX) {
                Some(field) if is_safe_field_id(field) => {
                    ResponseSortKey::DataField(field.to_string())
                }
                _ => ResponseSortKey::SubmittedAt,
            },
            None => ResponseSortKey::SubmittedAt,
        };
        let direction = sort_order
            .and_then(SortDirection::parse)
            .unwrap_or(SortDirection::Desc);
        Self { key, direction }
    }

    /// Render the SQL `ORDER BY` expression.
    ///
    /// Dynamic fields order by the text accessor, so values compare as raw
    /// strings. The identifier was sanitized during resolution.
    pub fn order_by_sql(&self) -> String {
        let expression = match &self.key {
            ResponseSortKey::SubmittedAt => "submitted_at".to_string(),
            ResponseSortKey::CreatedAt => "created_at".to_string(),
            ResponseSortKey::UpdatedAt => "updated_at".to_string(),
            ResponseSortKey::DataField(field) => format!("data->>'{field}'"),
        };
        format!("{expression} {}", self.direction.as_sql())
    }

    /// Render the document-store sort specification.
    pub fn document_sort(&self) -> Document {
        let path = match &self.key {
            ResponseSortKey::SubmittedAt => "submittedAt".to_string(),
            ResponseSortKey::CreatedAt => "createdAt".to_string(),
            ResponseSortKey::UpdatedAt => "updatedAt".to_string(),
            ResponseSortKey::DataField(field) => format!("data.{field}"),
        };
        doc! { path: self.direction.as_document() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_on_invalid_input() {
        let sort = ResponseSort::resolve(Some("secret_column"), Some("upward"));
        assert_eq!(sort.key, ResponseSortKey::SubmittedAt);
        assert_eq!(sort.direction, SortDirection::Desc);
        assert_eq!(ResponseSort::resolve(None, None), ResponseSort::default());
    }

    #[test]
    fn test_resolves_fixed_columns() {
        let sort = ResponseSort::resolve(Some("createdAt"), Some("asc"));
        assert_eq!(sort.key, ResponseSortKey::CreatedAt);
        assert_eq!(sort.direction, SortDirection::Asc);
        assert_eq!(sort.order_by_sql(), "created_at ASC");
    }

    #[test]
    fn test_resolves_dynamic_field() {
        let sort = ResponseSort::resolve(Some("data.favorite-color"), Some("asc"));
        assert_eq!(
            sort.key,
            ResponseSortKey::DataField("favorite-color".to_string())
        );
        assert_eq!(sort.order_by_sql(), "data->>'favorite-color' ASC");
        assert_eq!(
            sort.document_sort(),
            doc! { "data.favorite-color": 1 }
        );
    }

    #[test]
    fn test_unsafe_dynamic_field_falls_back() {
        let sort = ResponseSort::resolve(Some("data.x'); DROP TABLE--"), None);
        assert_eq!(sort.key, ResponseSortKey::SubmittedAt);
        let sort = ResponseSort::resolve(Some("data."), None);
        assert_eq!(sort.key, ResponseSortKey::SubmittedAt);
    }

    #[test]
    fn test_default_document_sort() {
        assert_eq!(
            ResponseSort::default().document_sort(),
            doc! { "submittedAt": -1 }
        );
    }
}
