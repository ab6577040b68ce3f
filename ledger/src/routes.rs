//! HTTP handlers for the ledger.

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Router,
};
use http::StatusCode;
use payline_api::{
    error::ApiError,
    models::{BalanceResponse, EntriesResponse},
    server::build_json_response,
};
use payline_common::ids::{AccountId, PaymentId};
use sqlx::PgPool;

use crate::store;

#[derive(Clone)]
pub struct ApiState {
    pub db: PgPool,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/accounts/{id}/balance", get(get_balance))
        .route("/accounts/{id}/entries", get(get_account_entries))
        .route("/payments/{id}/entries", get(get_payment_entries))
        .with_state(state)
}

/// `GET /accounts/{id}/balance`
async fn get_balance(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = id.parse::<AccountId>().map_err(ApiError::validation)?;
    let account = store::fetch_account(&state.db, &id)
        .await
        .map_err(|e| ApiError::upstream(format!("{e:#}")))?
        .ok_or_else(|| ApiError::not_found(format!("No account {id}")))?;
    Ok(build_json_response(
        StatusCode::OK,
        &BalanceResponse::from(account),
    ))
}

/// `GET /accounts/{id}/entries` — latest 100 entries, newest first.
async fn get_account_entries(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = id.parse::<AccountId>().map_err(ApiError::validation)?;
    let entries = store::account_entries(&state.db, &id)
        .await
        .map_err(|e| ApiError::upstream(format!("{e:#}")))?;
    Ok(build_json_response(StatusCode::OK, &EntriesResponse { entries }))
}

/// `GET /payments/{id}/entries` — all entries for the payment, oldest first.
async fn get_payment_entries(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = id.parse::<PaymentId>().map_err(ApiError::validation)?;
    let entries = store::payment_entries(&state.db, id)
        .await
        .map_err(|e| ApiError::upstream(format!("{e:#}")))?;
    Ok(build_json_response(StatusCode::OK, &EntriesResponse { entries }))
}
