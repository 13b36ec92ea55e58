//! HTTP surface of the cell authority.
//!
//! - `POST /commands` takes a [`RequestEnvelope`] and answers the request's
//!   result as JSON.
//! - `GET /health` reports how many requests were applied.
//!
//! Errors are `{ "error": .., "code": .. }` with a status matching the
//! failure.

use super::CellAuthority;
use crate::core::CommandError;
use crate::transport::RequestEnvelope;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub type SharedAuthority = Arc<Mutex<CellAuthority>>;

pub const DEFAULT_PATH: &str = "/commands";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum WebError {
    Command(CommandError),
    Internal(String),
}

impl From<CommandError> for WebError {
    fn from(err: CommandError) -> Self {
        WebError::Command(err)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            WebError::Command(err @ CommandError::UnknownCommand(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string(), "unknown_command")
            }
            WebError::Command(err @ CommandError::MalformedDescriptor(..)) => {
                (StatusCode::BAD_REQUEST, err.to_string(), "malformed_request")
            }
            WebError::Command(err @ CommandError::InvalidReference(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string(), "invalid_reference")
            }
            WebError::Command(err @ CommandError::ItemNotFound(_)) => {
                (StatusCode::NOT_FOUND, err.to_string(), "not_found")
            }
            WebError::Command(err @ CommandError::InvalidState(_)) => {
                (StatusCode::CONFLICT, err.to_string(), "conflict")
            }
            WebError::Command(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                "command_error",
            ),
            WebError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, "internal_error"),
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;

pub fn router(authority: SharedAuthority) -> Router {
    router_at(DEFAULT_PATH, authority)
}

pub fn router_at(path: &str, authority: SharedAuthority) -> Router {
    Router::new()
        .route(path, post(handle_request))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(authority)
}

async fn handle_request(
    State(authority): State<SharedAuthority>,
    Json(envelope): Json<RequestEnvelope>,
) -> Result<Json<JsonValue>> {
    let mut authority = authority
        .lock()
        .map_err(|err| WebError::Internal(err.to_string()))?;
    let result = authority.handle(&envelope.request)?;
    Ok(Json(result))
}

async fn health(State(authority): State<SharedAuthority>) -> Result<Json<JsonValue>> {
    let authority = authority
        .lock()
        .map_err(|err| WebError::Internal(err.to_string()))?;
    Ok(Json(json!({ "status": "ok", "handled": authority.handled() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ItemId;

    #[test]
    fn test_error_status_mapping() {
        let response = WebError::from(CommandError::ItemNotFound(ItemId(3))).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = WebError::from(CommandError::UnknownCommand("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
