//! Form response domain entities.

pub mod model;

pub use model::{CreateFormResponse, FormResponse};
