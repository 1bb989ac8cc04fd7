//! # formhub-service
//!
//! Business logic service layer for FormHub. Services orchestrate
//! repositories, storage backends, and the filter compilers to implement
//! application-level use cases.
//!
//! Services follow constructor injection — all dependencies are provided
//! at construction time via `Arc` references.

pub mod response;

pub use response::{
    DocumentResponseStore, ListResponsesParams, ResponseBackend, ResponseQueryService,
};
