use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use super::{DocumentStore, StoreConfig, StoreError, WriteResult};

/// Elasticsearch over its REST API.
///
/// Requests are spread round-robin over the configured nodes. When a node
/// refuses the connection the same request is tried on the next one; any
/// other failure is returned as is.
pub struct ElasticsearchClient {
    client: reqwest::Client,
    nodes: Vec<String>,
    next_node: AtomicUsize,
}

#[derive(Deserialize)]
struct UpdateResponse {
    result: String,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: Value,
}

impl ElasticsearchClient {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let nodes = config.nodes();
        if nodes.is_empty() {
            return Err(StoreError::Config("no store nodes configured".to_owned()));
        }
        for node in &nodes {
            Url::parse(node).map_err(|e| StoreError::Config(format!("{node}: {e}")))?;
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            nodes,
            next_node: AtomicUsize::new(0),
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, StoreError> {
        let start = self.next_node.fetch_add(1, Ordering::Relaxed);
        let mut last_error = None;

        for attempt in 0..self.nodes.len() {
            let node = &self.nodes[(start + attempt) % self.nodes.len()];
            let mut request = self.client.request(method.clone(), format!("{node}/{path}"));
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() => {
                    warn!(node = %node, error = %e, "store node unreachable, trying the next one");
                    last_error = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_error
            .map(StoreError::Transport)
            .unwrap_or_else(|| StoreError::Config("no store nodes configured".to_owned())))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

async fn rejected(response: Response) -> StoreError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    StoreError::Rejected { status, body }
}

#[async_trait]
impl DocumentStore for ElasticsearchClient {
    async fn update(
        &self,
        index: &str,
        id: &str,
        partial: &Value,
        upsert: Option<&Value>,
    ) -> Result<WriteResult, StoreError> {
        let body = match upsert {
            Some(document) => json!({ "doc": partial, "upsert": document }),
            None => json!({ "doc": partial }),
        };
        let response = self
            .send(Method::POST, &format!("{index}/_update/{id}"), Some(&body))
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let update: UpdateResponse = decode(response).await?;
                debug!(index, id, result = %update.result, "store update acknowledged");
                Ok(match update.result.as_str() {
                    "created" => WriteResult::Created,
                    "noop" => WriteResult::Unchanged,
                    _ => WriteResult::Updated,
                })
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                index: index.to_owned(),
                id: id.to_owned(),
            }),
            _ => Err(rejected(response).await),
        }
    }

    async fn create(&self, index: &str, id: &str, document: &Value) -> Result<(), StoreError> {
        let response = self
            .send(Method::PUT, &format!("{index}/_create/{id}"), Some(document))
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            StatusCode::CONFLICT => Err(StoreError::Conflict {
                index: index.to_owned(),
                id: id.to_owned(),
            }),
            _ => Err(rejected(response).await),
        }
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let response = self
            .send(Method::GET, &format!("{index}/_doc/{id}"), None)
            .await?;

        match response.status() {
            StatusCode::OK => {
                let found: GetResponse = decode(response).await?;
                Ok(found.source.filter(|_| found.found))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(rejected(response).await),
        }
    }

    async fn search(
        &self,
        index: &str,
        query: &Value,
        size: usize,
    ) -> Result<Vec<Value>, StoreError> {
        let body = json!({ "query": query, "size": size });
        let response = self
            .send(Method::POST, &format!("{index}/_search"), Some(&body))
            .await?;

        match response.status() {
            StatusCode::OK => {
                let found: SearchResponse = decode(response).await?;
                Ok(found.hits.hits.into_iter().map(|hit| hit.source).collect())
            }
            // An index that was never written to holds no companies
            StatusCode::NOT_FOUND => Ok(vec![]),
            _ => Err(rejected(response).await),
        }
    }
}
