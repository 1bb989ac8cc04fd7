//! Concrete repository implementations.

pub mod response;

pub use response::ResponseRepository;
