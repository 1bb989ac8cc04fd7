//! # formhub-core
//!
//! Core crate for FormHub. Contains configuration schemas, the response
//! filter model, pagination/sorting types, and the unified error system.
//!
//! This crate has **no** internal dependencies on other FormHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
