//! Core type definitions used across the FormHub workspace.

pub mod filter;
pub mod pagination;
pub mod sorting;

pub use filter::{DateRange, FilterOperator, NumberRange, ResponseFilter};
pub use pagination::{PageRequest, PageResponse};
pub use sorting::SortDirection;
