use std::sync::Arc;

use axum::{routing::get, Router};
use company_common::health::HealthRegistry;
use company_common::store::DocumentStore;
use futures::future::ready;
use tower_http::trace::TraceLayer;

use crate::endpoint;

#[derive(Clone)]
pub struct State {
    pub store: Arc<dyn DocumentStore>,
    pub index: String,
}

pub async fn index() -> &'static str {
    "company api"
}

/// Lookup and status routes. The prometheus route and request metrics are
/// added separately, since the recorder is process global.
pub fn router(
    store: Arc<dyn DocumentStore>,
    company_index: &str,
    liveness: HealthRegistry,
) -> Router {
    let state = State {
        store,
        index: company_index.to_owned(),
    };

    let status_router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(move || ready(liveness.get_status())));

    let company_router = Router::new()
        .route("/company", get(endpoint::company))
        .with_state(state);

    Router::new()
        .merge(status_router)
        .merge(company_router)
        .layer(TraceLayer::new_for_http())
}
