use company_common::kafka::RecvErr;
use company_common::store::StoreError;
use metrics_exporter_prometheus::BuildError;
use rdkafka::error::KafkaError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::reference::ReferenceError;

/// Anything that stops the service. Per-message failures never end up here.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Env(#[from] envconfig::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to load reference data: {0}")]
    Reference(#[from] ReferenceError),
    #[error("failed to create store client: {0}")]
    Store(#[from] StoreError),
    #[error("failed to create kafka consumer: {0}")]
    Kafka(#[from] KafkaError),
    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] BuildError),
    #[error("consumer failed: {0}")]
    Consumer(#[from] RecvErr),
}
