//! HTTP handlers for the fraud evaluator.

use axum::{extract::State, response::Response, routing::get, Router};
use http::StatusCode;
use payline_api::{error::ApiError, server::build_json_response};
use sqlx::PgPool;

use crate::store;

#[derive(Clone)]
pub struct ApiState {
    pub db: PgPool,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/fraud/stats", get(get_stats))
        .with_state(state)
}

/// `GET /fraud/stats`
async fn get_stats(
    State(state): State<ApiState>,
) -> Result<Response, ApiError> {
    let stats = store::stats(&state.db)
        .await
        .map_err(|e| ApiError::upstream(format!("{e:#}")))?;
    Ok(build_json_response(StatusCode::OK, &stats))
}
