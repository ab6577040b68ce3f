//! `/health` and `/metrics` routes, plus the metrics recorder.

use anyhow::Context as _;
use axum::{response::IntoResponse, routing::get, Router};
use http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;

use crate::server::build_json_response;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Installs the global Prometheus metrics recorder. Call once per process,
/// before any metrics are emitted.
pub fn install_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")
}

/// The admin routes every service exposes: `GET /health` and
/// `GET /metrics` (OpenMetrics text format).
pub fn routes<S>(metrics_handle: PrometheusHandle) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route(
            "/metrics",
            get(move || {
                let handle = metrics_handle.clone();
                async move {
                    let body = handle.render();
                    let mut response = body.into_response();
                    response.headers_mut().insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static(
                            "text/plain; version=0.0.4; charset=utf-8",
                        ),
                    );
                    response
                }
            }),
        )
}

async fn health() -> impl IntoResponse {
    build_json_response(StatusCode::OK, &HealthResponse { status: "ok" })
}
