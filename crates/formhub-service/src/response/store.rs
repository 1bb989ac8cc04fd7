//! Document-store access interface.
//!
//! The document engine itself is an external collaborator; the orchestrator
//! only needs the ability to execute a compiled query. Implementations wrap
//! the deployment's actual driver and are injected at construction time.

use async_trait::async_trait;
use bson::Document;

use formhub_core::result::AppResult;
use formhub_entity::response::FormResponse;

/// Executes compiled document-store queries over the responses collection.
#[async_trait]
pub trait DocumentResponseStore: Send + Sync {
    /// Fetch one page of responses matching the compiled query.
    async fn find(
        &self,
        query: Document,
        sort: Document,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<FormResponse>>;

    /// Count all responses matching the compiled query.
    async fn count(&self, query: Document) -> AppResult<u64>;
}
