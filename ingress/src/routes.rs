//! HTTP handlers for the ingress.

use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Router,
};
use http::{HeaderMap, StatusCode};
use payline_api::{
    error::ApiError,
    models::CreatePaymentRequest,
    server::{build_json_response, ApiJson},
};
use payline_common::{
    ids::{IdempotencyKey, PaymentId},
    payment::{IntentStatus, PaymentIntent},
    time::TimestampMs,
};
use payline_infra::store::is_unique_violation;
use tracing::{info, warn};

use crate::{
    config::IDEMPOTENCY_CACHE_TTL, idempotency_cache_key, store, IngressState,
};

pub fn router(state: IngressState) -> Router {
    Router::new()
        .route("/payments", post(create_payment))
        .route("/payments/{id}", get(get_payment))
        .route("/payments/{id}/confirm", post(confirm_payment))
        .with_state(state)
}

/// Pulls the `Idempotency-Key` header off the request.
fn idempotency_key(headers: &HeaderMap) -> Result<IdempotencyKey, ApiError> {
    let value = headers
        .get("Idempotency-Key")
        .ok_or_else(ApiError::missing_key)?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::validation("Idempotency-Key is not UTF-8"))?;
    value.parse::<IdempotencyKey>().map_err(ApiError::validation)
}

/// `POST /payments`
///
/// 201 with a fresh intent on first sight of the idempotency key; 200 with
/// the previously admitted intent on any replay. The Store insert and the
/// `payment.created` outbox row commit atomically; the handler never blocks
/// on the Log itself.
async fn create_payment(
    State(state): State<IngressState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreatePaymentRequest>,
) -> Result<Response, ApiError> {
    let key = idempotency_key(&headers)?;
    let cache_key = idempotency_cache_key(&key);

    // 1. KV cache hit: replay the cached intent as-is.
    match state.kv.get_json::<PaymentIntent>(&cache_key).await {
        Ok(Some(cached)) => {
            metrics::counter!("payments_replayed_total").increment(1);
            return Ok(build_json_response(StatusCode::OK, &cached));
        }
        Ok(None) => (),
        // A KV outage only costs us the cache; the Store stays
        // authoritative for idempotency.
        Err(e) => warn!("KV idempotency lookup failed: {e:#}"),
    }

    // 2. Store hit: replay, and refresh the cache.
    let existing = store::fetch_by_idempotency_key(&state.db, &key)
        .await
        .map_err(|e| ApiError::upstream(format!("{e:#}")))?;
    if let Some(intent) = existing {
        cache_intent(&state, &cache_key, &intent).await;
        metrics::counter!("payments_replayed_total").increment(1);
        return Ok(build_json_response(StatusCode::OK, &intent));
    }

    // 3. Fresh admission.
    let intent = PaymentIntent {
        id: PaymentId::generate(),
        amount: req.amount,
        currency: req.currency,
        customer_id: req.customer_id,
        merchant_id: req.merchant_id,
        status: IntentStatus::New,
        idempotency_key: key.clone(),
        created_at: TimestampMs::now(),
    };

    match store::insert_intent_with_event(&state.db, &intent).await {
        Ok(()) => (),
        // Lost a same-key race; serve the winner's row.
        Err(e) if is_unique_violation(&e) => {
            let winner = store::fetch_by_idempotency_key(&state.db, &key)
                .await
                .map_err(|e| ApiError::upstream(format!("{e:#}")))?
                .ok_or_else(|| {
                    ApiError::internal(
                        "Idempotency key vanished after unique violation",
                    )
                })?;
            cache_intent(&state, &cache_key, &winner).await;
            metrics::counter!("payments_replayed_total").increment(1);
            return Ok(build_json_response(StatusCode::OK, &winner));
        }
        Err(e) => return Err(ApiError::upstream(format!("{e:#}"))),
    }

    cache_intent(&state, &cache_key, &intent).await;
    state.outbox_wake.send();
    metrics::counter!("payments_created_total").increment(1);
    info!("Admitted payment {} for {}", intent.id, intent.amount);

    Ok(build_json_response(StatusCode::CREATED, &intent))
}

/// Best-effort KV cache write; a failure only costs future cache hits.
async fn cache_intent(
    state: &IngressState,
    cache_key: &str,
    intent: &PaymentIntent,
) {
    if let Err(e) = state
        .kv
        .set_json_ex(cache_key, intent, IDEMPOTENCY_CACHE_TTL)
        .await
    {
        warn!("Could not cache intent under {cache_key}: {e:#}");
    }
}

/// `GET /payments/{id}`
async fn get_payment(
    State(state): State<IngressState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = id.parse::<PaymentId>().map_err(ApiError::validation)?;
    let intent = store::fetch_by_id(&state.db, id)
        .await
        .map_err(|e| ApiError::upstream(format!("{e:#}")))?
        .ok_or_else(|| ApiError::not_found(format!("No payment {id}")))?;
    Ok(build_json_response(StatusCode::OK, &intent))
}

/// `POST /payments/{id}/confirm` (admin)
async fn confirm_payment(
    State(state): State<IngressState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = id.parse::<PaymentId>().map_err(ApiError::validation)?;
    let intent = store::confirm(&state.db, id)
        .await
        .map_err(|e| ApiError::upstream(format!("{e:#}")))?
        .ok_or_else(|| ApiError::not_found(format!("No payment {id}")))?;

    // Keep the idempotency cache coherent with the new status.
    let cache_key = idempotency_cache_key(&intent.idempotency_key);
    cache_intent(&state, &cache_key, &intent).await;

    Ok(build_json_response(StatusCode::OK, &intent))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn idempotency_key_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            idempotency_key(&headers).unwrap_err(),
            ApiError::missing_key()
        );

        headers.insert("Idempotency-Key", "K1".parse().unwrap());
        assert_eq!(idempotency_key(&headers).unwrap().as_str(), "K1");

        let mut bad = HeaderMap::new();
        bad.insert("Idempotency-Key", "bad key!".parse().unwrap());
        assert!(idempotency_key(&bad).is_err());
    }

    #[test]
    fn header_name_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("idempotency-key", "K1".parse().unwrap());
        assert!(idempotency_key(&headers).is_ok());
    }
}
