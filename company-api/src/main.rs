use company_api::config::Config;
use company_api::server::{serve, ServerError};
use company_common::shutdown::wait_for_shutdown_signal;
use envconfig::Envconfig;
use tokio::net::TcpListener;
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

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    setup_tracing();
    info!("Starting up...");

    let result = run().await;
    if let Err(e) = &result {
        error!(error = %e, "company api stopped");
    }
    result
}

async fn run() -> Result<(), ServerError> {
    let config = Config::init_from_env()?;
    let listener = TcpListener::bind(config.bind()).await?;
    serve(config, listener, wait_for_shutdown_signal()).await
}
