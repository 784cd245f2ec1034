use std::time::Instant;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::ApiError;
use crate::lookup::{find_company, CompanyFilters};
use crate::metrics_consts::{LOOKUPS, LOOKUP_TIME};
use crate::router;

/// `GET /company`: the best matching company profile.
#[instrument(skip_all)]
pub async fn company(
    State(state): State<router::State>,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let start = Instant::now();
    let result = lookup(&state, params).await;

    let outcome = match &result {
        Ok(_) => "found",
        Err(ApiError::CompanyNotFound) => "not_found",
        Err(ApiError::Store(_)) => "error",
        Err(_) => "invalid",
    };
    metrics::counter!(LOOKUPS, "outcome" => outcome).increment(1);
    metrics::histogram!(LOOKUP_TIME).record(start.elapsed().as_millis() as f64);

    result.map(Json)
}

async fn lookup(
    state: &router::State,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Value, ApiError> {
    let Query(params) = params.map_err(|e| {
        debug!(error = %e, "unreadable query string");
        ApiError::InvalidParameter(e.body_text())
    })?;
    let filters = CompanyFilters::from_params(params)?;
    debug!(?filters, "looking up company");

    find_company(state.store.as_ref(), &state.index, &filters)
        .await?
        .ok_or(ApiError::CompanyNotFound)
}
