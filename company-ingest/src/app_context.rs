use std::sync::Arc;

use company_common::health::{HealthHandle, HealthRegistry};
use company_common::store::{DocumentStore, ElasticsearchClient, StoreError};
use time::Duration;

use crate::config::Config;
use crate::upsert::Upserter;

pub struct AppContext {
    pub liveness: HealthRegistry,
    pub worker_liveness: HealthHandle,
    pub store: Arc<dyn DocumentStore>,
}

impl AppContext {
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        let store = Arc::new(ElasticsearchClient::new(&config.store)?);
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: &Config, store: Arc<dyn DocumentStore>) -> Self {
        let liveness = HealthRegistry::new("liveness");
        let worker_liveness = liveness.register(
            "worker",
            Duration::seconds(config.worker_liveness_deadline_secs as i64),
        );

        Self {
            liveness,
            worker_liveness,
            store,
        }
    }

    pub fn upserter(&self, config: &Config) -> Upserter {
        Upserter::new(
            self.store.clone(),
            config.company_index.as_str(),
            config.doc_as_upsert,
        )
    }
}
