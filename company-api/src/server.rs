use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use company_common::health::{HealthHandle, HealthRegistry};
use company_common::metrics::setup_metrics_routes;
use company_common::store::{ElasticsearchClient, StoreError};
use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::router;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Env(#[from] envconfig::Error),
    #[error("failed to create store client: {0}")]
    Store(#[from] StoreError),
    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] BuildError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

async fn liveness_loop(handle: HealthHandle) {
    loop {
        handle.report_healthy();
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
}

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = Arc::new(ElasticsearchClient::new(&config.store)?);

    let health = HealthRegistry::new("liveness");
    let simple_loop = health.register("simple_loop", time::Duration::seconds(30));
    tokio::spawn(liveness_loop(simple_loop));

    let app = router::router(store, &config.company_index, health);
    let app = setup_metrics_routes(app)?;

    tracing::info!(
        address = %listener.local_addr()?,
        index = %config.company_index,
        "listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("company api stopped");
    Ok(())
}
