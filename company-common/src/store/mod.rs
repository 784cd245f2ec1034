//! Document store access.
//!
//! The pipeline and the lookup API only need four operations from the store,
//! captured by [`DocumentStore`]. [`ElasticsearchClient`] talks to a real
//! cluster over its REST API; [`MemoryStore`] keeps documents in process and
//! is what the tests run against.
use async_trait::async_trait;
use envconfig::Envconfig;
use serde_json::Value;
use thiserror::Error;

mod elasticsearch;
mod memory;

pub use elasticsearch::ElasticsearchClient;
pub use memory::{MemoryStore, StoreCall};

#[derive(Envconfig, Clone, Debug)]
pub struct StoreConfig {
    /// Comma separated list of node urls.
    #[envconfig(from = "ES_HOST")]
    pub es_host: String,

    #[envconfig(from = "ES_REQUEST_TIMEOUT_MS", default = "5000")]
    pub request_timeout_ms: u64,
}

impl StoreConfig {
    pub fn nodes(&self) -> Vec<String> {
        self.es_host
            .split(',')
            .map(str::trim)
            .filter(|node| !node.is_empty())
            .map(|node| node.trim_end_matches('/').to_owned())
            .collect()
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// The document (or the index holding it) does not exist.
    #[error("document {id} not found in {index}")]
    NotFound { index: String, id: String },
    #[error("document {id} already exists in {index}")]
    Conflict { index: String, id: String },
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store responded with {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("could not decode store response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// What an update did to the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    Created,
    Updated,
    /// The partial document matched what was already stored.
    Unchanged,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Merge `partial` into the document `id`. When `upsert` is given, a
    /// missing document is created with exactly that body; without it, a
    /// missing document is reported as [`StoreError::NotFound`].
    async fn update(
        &self,
        index: &str,
        id: &str,
        partial: &Value,
        upsert: Option<&Value>,
    ) -> Result<WriteResult, StoreError>;

    /// Create `id` with exactly `document` as its body. Fails with
    /// [`StoreError::Conflict`] if the document already exists.
    async fn create(&self, index: &str, id: &str, document: &Value) -> Result<(), StoreError>;

    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Run a query and return up to `size` matching document bodies, best match first.
    async fn search(&self, index: &str, query: &Value, size: usize)
        -> Result<Vec<Value>, StoreError>;
}
