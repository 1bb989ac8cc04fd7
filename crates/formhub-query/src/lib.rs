//! # formhub-query
//!
//! The response filter compiler. Turns backend-agnostic
//! [`ResponseFilter`](formhub_core::types::filter::ResponseFilter)
//! predicates into safe, efficient queries against two structurally
//! different storage engines, plus a deterministic in-memory fallback
//! evaluator for predicates that cannot be pushed to either database.
//!
//! Three execution strategies share one semantic contract:
//!
//! - [`document`] compiles to a nested document-store query (`$and` of
//!   per-predicate subtrees). All operators except the four date operators
//!   are expressible.
//! - [`relational`] compiles to parameterized SQL fragments over a
//!   JSON-typed column. Every operator is expressible thanks to guarded
//!   casts, so this path needs no memory fallback.
//! - [`memory`] evaluates predicates in-process over already-fetched
//!   records with the same operator semantics.
//!
//! Field identifiers are the sole injection surface (they become SQL path
//! fragments) and pass through [`ident::ensure_safe_field_id`] before any
//! query text is built. Operand values are always bound as parameters.
//! Missing or malformed operands compile to no condition rather than an
//! error; malformed stored data fails the predicate rather than the
//! request.

pub mod classify;
pub mod document;
pub mod ident;
pub mod memory;
pub mod relational;
pub mod sort;

pub use classify::{FilterPartition, QueryBackend, can_filter_at_database, partition_filters};
pub use ident::ensure_safe_field_id;
pub use memory::{MemoryFilterEvaluator, ResponseFilterEvaluator, apply_response_filters};
pub use relational::{SqlConditions, SqlParam};
pub use sort::{ResponseSort, ResponseSortKey};
