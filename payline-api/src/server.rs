//! Axum server utilities.
//!
//! # Serving
//!
//! [`spawn_server_task`] binds a listener and spawns the server into a named
//! [`Task`] with graceful shutdown driven by a [`NotifyOnce`].
//!
//! # Extractors
//!
//! [`ApiJson`] deserializes a request body, mapping rejections (malformed
//! JSON, missing fields) to a `Validation` [`ApiError`] instead of axum's
//! default rejection, so clients always see the common error shape.

use std::net::SocketAddr;

use anyhow::Context as _;
use axum::{
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
    Router,
};
use http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use payline_tokio::{notify_once::NotifyOnce, task::Task};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info, warn};

use crate::error::{ApiError, ErrorResponse, ToHttpStatus};

/// Binds `0.0.0.0:{port}` and spawns the server into a named [`Task`].
/// Returns the task together with the bound socket address.
///
/// The server stops accepting new connections when `shutdown` fires and
/// finishes in-flight requests before the task completes; the per-service
/// drain timeout is enforced by the task joiner, not here.
pub async fn spawn_server_task(
    name: &'static str,
    port: u16,
    router: Router,
    shutdown: NotifyOnce,
) -> anyhow::Result<(Task<()>, SocketAddr)> {
    let bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .context("Could not bind TCP listener")?;
    let local_addr = listener
        .local_addr()
        .context("Could not get local address of TcpListener")?;
    info!("{name} listening on http://{local_addr}");

    let task = Task::spawn(name, async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.recv_owned())
            .await;
        match result {
            Ok(()) => info!("{name} shut down"),
            Err(e) => error!("{name} errored: {e:#}"),
        }
    });

    Ok((task, local_addr))
}

/// Constructs a JSON [`Response`] from the data and status code. If
/// serialization fails for some reason (very unlikely), log and return an
/// `Internal` [`ErrorResponse`] instead.
pub fn build_json_response(
    status: StatusCode,
    data: &impl Serialize,
) -> Response {
    // Most of the logic goes in this monomorphic fn to prevent binary bloat.
    fn inner(
        status: StatusCode,
        try_json_bytes: Result<Vec<u8>, serde_json::Error>,
    ) -> Response {
        let (status, json_bytes) = match try_json_bytes {
            Ok(json_bytes) => (status, json_bytes),
            Err(e) => {
                let msg = format!("Couldn't serialize response: {e:#}");
                error!(target: "http", "{msg}");
                let err_resp = ErrorResponse::from(ApiError::internal(msg));
                let json_bytes = serde_json::to_vec(&err_resp)
                    .expect("Serializing ErrorResponse really shouldn't fail");
                (StatusCode::INTERNAL_SERVER_ERROR, json_bytes)
            }
        };

        let mut response = (status, json_bytes).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }

    inner(status, serde_json::to_vec(data))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.to_http_status();

        if status.is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }

        build_json_response(status, &ErrorResponse::from(self))
    }
}

/// A request body extractor which maps all rejections (malformed JSON,
/// missing fields, wrong content type) to a `Validation` [`ApiError`].
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(
        req: Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::validation(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod test {
    use axum::routing::get;

    use super::*;

    async fn ok_handler() -> Result<axum::Json<&'static str>, ApiError> {
        Ok(axum::Json("ok"))
    }

    /// Server binds an ephemeral port, serves one request worth of routing
    /// table, and shuts down cleanly when signaled.
    #[tokio::test]
    async fn server_starts_and_shuts_down() {
        let router = Router::new().route("/ping", get(ok_handler));
        let shutdown = NotifyOnce::new();
        let (task, addr) =
            spawn_server_task("test server", 0, router, shutdown.clone())
                .await
                .unwrap();
        assert_ne!(addr.port(), 0);

        shutdown.send();
        task.await.unwrap();
    }
}
