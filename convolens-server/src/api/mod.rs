// Copyright 2025 Convolens (https://github.com/convolens)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! HTTP API for the Convolens server.
//!
//! Clients (glasses, phone app, web UI) talk to these endpoints:
//!
//! - `POST /chat`: append a transcript fragment for a user
//! - `POST /ui_poll`: fetch undelivered results for a (user, device) pair
//! - `POST /rate_result`: record a thumbs up/down for a result
//! - `POST /button_event`: log a hardware button press
//! - `GET /health`: liveness and basic stats

pub mod chat;
pub mod feedback;
pub mod health;
pub mod poll;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use convolens_core::ConvolensError;
use convolens_storage::RecordStore;
use serde::Serialize;
use std::sync::Arc;

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<ConvolensError> for ApiError {
    fn from(err: ConvolensError) -> Self {
        match err {
            ConvolensError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            ConvolensError::StoreUnavailable(msg) => ApiError::Unavailable(msg),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    /// Expert agent names used to expand the proactive insight feature into
    /// its per-expert channels.
    pub experts: Arc<Vec<String>>,
}

/// Extracts a required string field from a request, rejecting missing or
/// empty values with the field name in the message.
pub(crate) fn require_field<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("no {} in request", name))),
    }
}

/// Builds the API router over the shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/chat", post(chat::ingest_chat))
        .route("/ui_poll", post(poll::ui_poll))
        .route("/rate_result", post(feedback::rate_result))
        .route("/button_event", post(feedback::button_event))
        .with_state(state)
}
