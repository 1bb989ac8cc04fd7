//! Pushdown capability classification.
//!
//! Decides, per storage backend, which predicates can execute inside the
//! database and which must fall back to in-memory evaluation. The document
//! store cannot express the four date operators; raw SQL expresses every
//! operator via guarded casts, so the relational path never needs a
//! fallback. This asymmetry is intentional: the document-store path is a
//! hybrid DB+memory strategy, the relational path is not.

use serde::{Deserialize, Serialize};

use formhub_core::types::filter::ResponseFilter;

/// The storage engine a filter set is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryBackend {
    /// Schemaless document store.
    Document,
    /// Relational store with a JSON-typed answer column.
    Relational,
}

/// Result of splitting a filter set by pushdown capability.
#[derive(Debug, Clone, Default)]
pub struct FilterPartition {
    /// Filters the document store can evaluate natively.
    pub pushable: Vec<ResponseFilter>,
    /// Filters that must run in memory after the page is fetched.
    pub memory_only: Vec<ResponseFilter>,
}

/// Whether every filter in the set can be evaluated by the given backend.
pub fn can_filter_at_database(filters: &[ResponseFilter], backend: QueryBackend) -> bool {
    match backend {
        QueryBackend::Relational => true,
        QueryBackend::Document => filters
            .iter()
            .all(|filter| !filter.operator.is_date_operator()),
    }
}

/// Split filters into document-store-pushable and memory-only subsets.
///
/// Used by the orchestrator for the hybrid document-store path; the
/// relational path compiles everything and never calls this.
pub fn partition_filters(filters: &[ResponseFilter]) -> FilterPartition {
    let mut partition = FilterPartition::default();
    for filter in filters {
        if filter.operator.is_date_operator() {
            partition.memory_only.push(filter.clone());
        } else {
            partition.pushable.push(filter.clone());
        }
    }
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use formhub_core::types::filter::FilterOperator;

    #[test]
    fn test_relational_supports_everything() {
        let filters = vec![
            ResponseFilter::with_value("due", FilterOperator::DateBefore, "2026-01-01"),
            ResponseFilter::with_value("color", FilterOperator::Equals, "red"),
        ];
        assert!(can_filter_at_database(&filters, QueryBackend::Relational));
    }

    #[test]
    fn test_document_rejects_date_operators() {
        let filters = vec![
            ResponseFilter::with_value("color", FilterOperator::Equals, "red"),
            ResponseFilter::with_value("due", FilterOperator::DateBetween, ""),
        ];
        assert!(!can_filter_at_database(&filters, QueryBackend::Document));
        assert!(can_filter_at_database(&filters[..1], QueryBackend::Document));
    }

    #[test]
    fn test_document_accepts_empty_set() {
        assert!(can_filter_at_database(&[], QueryBackend::Document));
    }

    #[test]
    fn test_partition() {
        let filters = vec![
            ResponseFilter::with_value("color", FilterOperator::Contains, "red"),
            ResponseFilter::with_value("due", FilterOperator::DateAfter, "2026-01-01"),
            ResponseFilter::new("note", FilterOperator::IsEmpty),
        ];
        let partition = partition_filters(&filters);
        assert_eq!(partition.pushable.len(), 2);
        assert_eq!(partition.memory_only.len(), 1);
        assert_eq!(partition.memory_only[0].field_id, "due");
    }
}
