use std::{sync::Arc, time::Duration};

use axum::{routing::get, Router};
use company_common::kafka::SingleTopicConsumer;
use company_common::metrics::{serve, setup_metrics_routes};
use company_common::shutdown::wait_for_shutdown_signal;
use company_ingest::{
    app_context::AppContext,
    config::Config,
    consumer,
    error::StartupError,
    metrics_consts::{REFERENCE_RECORDS, REFERENCE_ROWS_SKIPPED},
    pipeline::Pipeline,
    reference::ReferenceData,
};
use envconfig::Envconfig;
use futures::future::ready;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn setup_tracing() {
    let log_layer: tracing_subscriber::filter::Filtered<
        tracing_subscriber::fmt::Layer<tracing_subscriber::Registry>,
        EnvFilter,
        tracing_subscriber::Registry,
    > = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

pub async fn index() -> &'static str {
    "company ingest service"
}

fn start_health_liveness_server(
    config: &Config,
    context: Arc<AppContext>,
) -> Result<JoinHandle<()>, StartupError> {
    let router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route(
            "/_liveness",
            get(move || ready(context.liveness.get_status())),
        );
    let router = setup_metrics_routes(router)?;
    let bind = config.bind();
    Ok(tokio::task::spawn(async move {
        if let Err(e) = serve(router, &bind).await {
            error!(bind = %bind, error = %e, "failed to serve health and metrics");
        }
    }))
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    setup_tracing();
    info!("Starting up...");

    let result = run().await;
    if let Err(e) = &result {
        error!(error = %e, "company ingest stopped");
    }
    result
}

async fn run() -> Result<(), StartupError> {
    let config = Config::init_from_env()?;
    let reference_path = config.reference_file_path()?;

    let context = Arc::new(AppContext::new(&config)?);
    start_health_liveness_server(&config, context.clone())?;

    let reference = ReferenceData::load(&reference_path)?;
    metrics::gauge!(REFERENCE_RECORDS).set(reference.len() as f64);
    metrics::gauge!(REFERENCE_ROWS_SKIPPED).set(reference.skipped_rows() as f64);

    let kafka_consumer = SingleTopicConsumer::new(&config.kafka, &config.consumer)?;
    info!(
        topic = kafka_consumer.topic(),
        index = config.company_index.as_str(),
        "consuming company events"
    );

    let pipeline = Pipeline::new(Arc::new(reference), context.upserter(&config));
    let idle_report = Duration::from_secs((config.worker_liveness_deadline_secs / 3).max(1));

    consumer::run(
        &kafka_consumer,
        &pipeline,
        &context.worker_liveness,
        idle_report,
        wait_for_shutdown_signal(),
    )
    .await?;

    info!("company ingest stopped cleanly");
    Ok(())
}
