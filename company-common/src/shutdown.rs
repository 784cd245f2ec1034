use tokio::signal::unix::SignalKind;

/// Resolves on the first SIGINT or SIGTERM.
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm = match tokio::signal::unix::signal(SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(e) => {
            tracing::warn!("could not install SIGTERM handler, only SIGINT stops the process: {e}");
            if let Err(e) = ctrl_c.await {
                tracing::error!("could not listen for SIGINT either: {e}");
            }
            return;
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT"),
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
    }
}
