//! The response filter orchestrator.
//!
//! Caller-facing entry point for filtered, sorted, paginated response
//! listings. Classifies the incoming filters, compiles them for the
//! configured backend, executes the page and count queries, and applies
//! the memory evaluator to whatever could not be pushed down.
//!
//! The relational backend expresses every operator in SQL and never needs
//! the memory fallback; the document backend cannot push down date
//! predicates, so those are evaluated in-process over the returned page.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use formhub_core::result::AppResult;
use formhub_core::types::filter::ResponseFilter;
use formhub_core::types::pagination::{PageRequest, PageResponse};
use formhub_database::repositories::response::{FILTER_PARAMS_START, ResponseRepository};
use formhub_entity::response::FormResponse;
use formhub_query::memory::{MemoryFilterEvaluator, ResponseFilterEvaluator};
use formhub_query::sort::ResponseSort;
use formhub_query::{classify, document, relational};

use crate::response::store::DocumentResponseStore;

/// Raw listing parameters as received from the caller.
///
/// Everything is optional and nothing is validated up front: pages and
/// sizes are clamped, unknown sort input falls back to the default, and
/// incomplete filters compile to no condition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponsesParams {
    /// Predicates over dynamic answer fields.
    #[serde(default)]
    pub filters: Vec<ResponseFilter>,
    /// Column name or `data.<fieldId>` reference.
    pub sort_by: Option<String>,
    /// `"asc"` or `"desc"`.
    pub sort_order: Option<String>,
    /// 1-based page number.
    pub page: Option<u64>,
    /// Page size, clamped to `[1, 100]`.
    pub page_size: Option<u64>,
}

/// The storage engine a deployment keeps its responses in.
#[derive(Clone)]
pub enum ResponseBackend {
    /// Relational store; full filter pushdown.
    Relational(Arc<ResponseRepository>),
    /// Document store; hybrid pushdown plus memory evaluation.
    Document(Arc<dyn DocumentResponseStore>),
}

/// Filtered response listing service.
#[derive(Clone)]
pub struct ResponseQueryService {
    backend: ResponseBackend,
    evaluator: Arc<dyn ResponseFilterEvaluator>,
}

impl ResponseQueryService {
    /// Create a service with the default in-memory evaluator.
    pub fn new(backend: ResponseBackend) -> Self {
        Self::with_evaluator(backend, Arc::new(MemoryFilterEvaluator))
    }

    /// Create a service with an injected memory evaluator.
    pub fn with_evaluator(
        backend: ResponseBackend,
        evaluator: Arc<dyn ResponseFilterEvaluator>,
    ) -> Self {
        Self { backend, evaluator }
    }

    /// List one page of a form's responses.
    ///
    /// Storage I/O failures propagate unchanged; the only other error is
    /// an unsafe field identifier, rejected before any query text is
    /// built.
    pub async fn list_responses(
        &self,
        form_id: Uuid,
        params: ListResponsesParams,
    ) -> AppResult<PageResponse<FormResponse>> {
        let defaults = PageRequest::default();
        let page = PageRequest::new(
            params.page.unwrap_or(defaults.page),
            params.page_size.unwrap_or(defaults.page_size),
        );
        let sort = ResponseSort::resolve(params.sort_by.as_deref(), params.sort_order.as_deref());

        match &self.backend {
            ResponseBackend::Relational(repo) => {
                let compiled = relational::compile(&params.filters, FILTER_PARAMS_START)?;
                let (rows, total) = repo.list_filtered(form_id, &compiled, &sort, &page).await?;
                Ok(PageResponse::new(rows, page.page, page.page_size, total))
            }
            ResponseBackend::Document(store) => {
                let partition = classify::partition_filters(&params.filters);
                let query = document::compile(form_id, &partition.pushable);

                let records = store.find(
                    query.clone(),
                    sort.document_sort(),
                    page.offset(),
                    page.limit(),
                );
                let total = store.count(query);
                let (records, total) = futures::try_join!(records, total)?;

                let data = if partition.memory_only.is_empty() {
                    records
                } else {
                    debug!(
                        memory_only = partition.memory_only.len(),
                        "evaluating non-pushable filters over the fetched page"
                    );
                    self.evaluator.apply(records, &partition.memory_only)
                };
                Ok(PageResponse::new(data, page.page, page.page_size, total))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bson::{Document, doc};
    use chrono::Utc;
    use serde_json::json;

    use formhub_core::types::filter::FilterOperator;

    /// Fake document store: records the query it receives and serves a
    /// canned page.
    #[derive(Default)]
    struct FakeDocumentStore {
        responses: Vec<FormResponse>,
        seen: Mutex<Vec<(Document, Document, u64, u64)>>,
    }

    #[async_trait]
    impl DocumentResponseStore for FakeDocumentStore {
        async fn find(
            &self,
            query: Document,
            sort: Document,
            skip: u64,
            limit: u64,
        ) -> AppResult<Vec<FormResponse>> {
            self.seen
                .lock()
                .expect("lock")
                .push((query, sort, skip, limit));
            Ok(self.responses.clone())
        }

        async fn count(&self, _query: Document) -> AppResult<u64> {
            Ok(self.responses.len() as u64)
        }
    }

    fn response(data: serde_json::Value) -> FormResponse {
        FormResponse {
            id: Uuid::new_v4(),
            form_id: Uuid::nil(),
            data,
            metadata: None,
            submitted_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(store: Arc<FakeDocumentStore>) -> ResponseQueryService {
        ResponseQueryService::new(ResponseBackend::Document(store))
    }

    #[tokio::test]
    async fn test_date_filters_run_in_memory_over_the_page() {
        let store = Arc::new(FakeDocumentStore {
            responses: vec![
                response(json!({ "due": "2026-01-15" })),
                response(json!({ "due": "2026-06-15" })),
                response(json!({ "due": "garbage" })),
            ],
            ..Default::default()
        });
        let service = service(store.clone());

        let params = ListResponsesParams {
            filters: vec![ResponseFilter::with_value(
                "due",
                FilterOperator::DateBefore,
                "2026-02-01",
            )],
            ..Default::default()
        };
        let result = service
            .list_responses(Uuid::nil(), params)
            .await
            .expect("list");

        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].data["due"], "2026-01-15");
        // The date predicate never reaches the pushed-down query.
        let seen = store.seen.lock().expect("lock");
        assert!(!seen[0].0.contains_key("$and"));
    }

    #[tokio::test]
    async fn test_pushable_filters_reach_the_store() {
        let store = Arc::new(FakeDocumentStore::default());
        let service = service(store.clone());

        let params = ListResponsesParams {
            filters: vec![ResponseFilter::with_value(
                "color",
                FilterOperator::Equals,
                "red",
            )],
            ..Default::default()
        };
        service
            .list_responses(Uuid::nil(), params)
            .await
            .expect("list");

        let seen = store.seen.lock().expect("lock");
        let (query, sort, skip, limit) = &seen[0];
        assert_eq!(query.get_array("$and").expect("$and").len(), 1);
        assert_eq!(sort, &doc! { "submittedAt": -1 });
        assert_eq!((*skip, *limit), (0, 10));
    }

    #[tokio::test]
    async fn test_pagination_clamps() {
        let store = Arc::new(FakeDocumentStore::default());
        let service = service(store.clone());

        let params = ListResponsesParams {
            page: Some(0),
            page_size: Some(200),
            ..Default::default()
        };
        let result = service
            .list_responses(Uuid::nil(), params)
            .await
            .expect("list");

        assert_eq!(result.page, 1);
        assert_eq!(result.page_size, 100);
        let seen = store.seen.lock().expect("lock");
        assert_eq!((seen[0].2, seen[0].3), (0, 100));
    }

    #[tokio::test]
    async fn test_sort_resolution_falls_back_on_invalid_input() {
        let store = Arc::new(FakeDocumentStore::default());
        let service = service(store.clone());

        let params = ListResponsesParams {
            sort_by: Some("data.bad field".to_string()),
            sort_order: Some("upward".to_string()),
            ..Default::default()
        };
        service
            .list_responses(Uuid::nil(), params)
            .await
            .expect("list");

        let seen = store.seen.lock().expect("lock");
        assert_eq!(seen[0].1, doc! { "submittedAt": -1 });
    }

    #[tokio::test]
    async fn test_dynamic_sort_reaches_the_store() {
        let store = Arc::new(FakeDocumentStore::default());
        let service = service(store.clone());

        let params = ListResponsesParams {
            sort_by: Some("data.score".to_string()),
            sort_order: Some("asc".to_string()),
            ..Default::default()
        };
        service
            .list_responses(Uuid::nil(), params)
            .await
            .expect("list");

        let seen = store.seen.lock().expect("lock");
        assert_eq!(seen[0].1, doc! { "data.score": 1 });
    }

    #[tokio::test]
    async fn test_total_reflects_pushed_down_count() {
        let store = Arc::new(FakeDocumentStore {
            responses: vec![
                response(json!({ "due": "2026-01-15" })),
                response(json!({ "due": "2026-06-15" })),
            ],
            ..Default::default()
        });
        let service = service(store);

        let params = ListResponsesParams {
            filters: vec![ResponseFilter::with_value(
                "due",
                FilterOperator::DateBefore,
                "2026-02-01",
            )],
            ..Default::default()
        };
        let result = service
            .list_responses(Uuid::nil(), params)
            .await
            .expect("list");

        // Memory-only filters narrow the page, not the stored total.
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.total_items, 2);
    }
}
