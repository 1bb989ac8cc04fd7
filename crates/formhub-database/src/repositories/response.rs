//! Form response repository.
//!
//! The listing queries splice pre-compiled filter conditions from
//! `formhub_query::relational` into `WHERE form_id = $1 AND <conditions>`.
//! The compiler has already sanitized every field identifier and bound
//! every operand value to an ordinal placeholder starting at `$2`.

use sqlx::PgPool;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use uuid::Uuid;

use formhub_core::error::{AppError, ErrorKind};
use formhub_core::result::AppResult;
use formhub_core::types::pagination::PageRequest;
use formhub_entity::response::{CreateFormResponse, FormResponse};
use formhub_query::relational::{SqlConditions, SqlParam};
use formhub_query::sort::ResponseSort;

/// Ordinal of the first filter placeholder; `$1` carries the form id.
pub const FILTER_PARAMS_START: usize = 2;

/// Repository for form response persistence and filtered listing.
#[derive(Debug, Clone)]
pub struct ResponseRepository {
    pool: PgPool,
}

impl ResponseRepository {
    /// Create a new response repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a response by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<FormResponse>> {
        sqlx::query_as::<_, FormResponse>("SELECT * FROM form_responses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find response", e))
    }

    /// Insert a new response record.
    pub async fn insert(&self, data: &CreateFormResponse) -> AppResult<FormResponse> {
        sqlx::query_as::<_, FormResponse>(
            "INSERT INTO form_responses (form_id, data, metadata, submitted_at) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(data.form_id)
        .bind(&data.data)
        .bind(&data.metadata)
        .bind(data.submitted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert response", e))
    }

    /// Delete a response. Returns `true` if a row was removed.
    pub async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM form_responses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete response", e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// Count all responses for a form, unfiltered.
    pub async fn count_by_form(&self, form_id: Uuid) -> AppResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM form_responses WHERE form_id = $1")
                .bind(form_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to count responses", e)
                })?;
        Ok(count as u64)
    }

    /// List one page of a form's responses matching the compiled filter,
    /// together with the total match count.
    ///
    /// The page query and the count query have no data dependency and run
    /// concurrently.
    pub async fn list_filtered(
        &self,
        form_id: Uuid,
        filter: &SqlConditions,
        sort: &ResponseSort,
        page: &PageRequest,
    ) -> AppResult<(Vec<FormResponse>, u64)> {
        let (list_sql, count_sql) = build_list_queries(filter, sort);

        let rows = async {
            let query = sqlx::query_as::<_, FormResponse>(&list_sql).bind(form_id);
            bind_filter_params(query, &filter.params)
                .bind(page.limit() as i64)
                .bind(page.offset() as i64)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to list responses", e)
                })
        };
        let total = async {
            let mut query = sqlx::query_scalar::<_, i64>(&count_sql).bind(form_id);
            for param in &filter.params {
                query = match param {
                    SqlParam::Text(v) => query.bind(v.clone()),
                    SqlParam::TextArray(v) => query.bind(v.clone()),
                    SqlParam::Number(v) => query.bind(*v),
                    SqlParam::Int(v) => query.bind(*v),
                };
            }
            query.fetch_one(&self.pool).await.map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count responses", e)
            })
        };

        let (rows, total) = futures::try_join!(rows, total)?;
        Ok((rows, total as u64))
    }
}

/// Assemble the page and count statements for a compiled filter.
///
/// Filter placeholders start at `$2`; the limit and offset placeholders
/// follow the last filter parameter.
fn build_list_queries(filter: &SqlConditions, sort: &ResponseSort) -> (String, String) {
    let mut where_clause = String::from("form_id = $1");
    for condition in &filter.conditions {
        where_clause.push_str(" AND ");
        where_clause.push_str(condition);
    }

    let limit_ordinal = FILTER_PARAMS_START + filter.params.len();
    let list_sql = format!(
        "SELECT * FROM form_responses WHERE {where_clause} \
         ORDER BY {} LIMIT ${limit_ordinal} OFFSET ${}",
        sort.order_by_sql(),
        limit_ordinal + 1
    );
    let count_sql = format!("SELECT COUNT(*) FROM form_responses WHERE {where_clause}");
    (list_sql, count_sql)
}

fn bind_filter_params<'q>(
    query: QueryAs<'q, sqlx::Postgres, FormResponse, PgArguments>,
    params: &[SqlParam],
) -> QueryAs<'q, sqlx::Postgres, FormResponse, PgArguments> {
    params.iter().fold(query, |query, param| match param {
        SqlParam::Text(v) => query.bind(v.clone()),
        SqlParam::TextArray(v) => query.bind(v.clone()),
        SqlParam::Number(v) => query.bind(*v),
        SqlParam::Int(v) => query.bind(*v),
    })
}
