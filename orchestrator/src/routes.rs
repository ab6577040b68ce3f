//! HTTP handlers for the orchestrator.

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Router,
};
use http::StatusCode;
use payline_api::{
    error::ApiError, models::PaymentStateResponse,
    server::build_json_response,
};
use payline_common::ids::PaymentId;
use sqlx::PgPool;

use crate::store;

#[derive(Clone)]
pub struct ApiState {
    pub db: PgPool,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/payments/{id}/state", get(get_payment_state))
        .with_state(state)
}

/// `GET /payments/{id}/state`
async fn get_payment_state(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = id.parse::<PaymentId>().map_err(ApiError::validation)?;
    let row = store::fetch_state(&state.db, id)
        .await
        .map_err(|e| ApiError::upstream(format!("{e:#}")))?
        .ok_or_else(|| ApiError::not_found(format!("No state for {id}")))?;

    let response = PaymentStateResponse {
        payment_id: row.payment_id,
        state: row.state,
        previous_state: row.previous_state,
        fraud_decision: row.fraud_decision,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };
    Ok(build_json_response(StatusCode::OK, &response))
}
