//! API utilities shared by every Payline service: the serializable error
//! model, axum server helpers with graceful shutdown, the request/response
//! models for the public HTTP surface, and the `/health` + `/metrics` admin
//! routes.

/// `/health` and `/metrics` routes, plus the metrics recorder.
pub mod admin;
/// Serializable api error types and error kinds.
pub mod error;
/// Request and response models for the public HTTP surface.
pub mod models;
/// Axum server utilities: serving, extractors, response builders.
pub mod server;
