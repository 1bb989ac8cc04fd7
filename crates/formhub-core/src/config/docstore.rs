//! Document-store configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for the document-store backend.
///
/// Only present when a deployment keeps responses in the document store;
/// relational-only deployments omit this section entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    /// Connection URL of the document store.
    pub url: String,
    /// Database name.
    pub database: String,
    /// Collection holding form responses.
    #[serde(default = "default_collection")]
    pub responses_collection: String,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_collection() -> String {
    "responses".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}
