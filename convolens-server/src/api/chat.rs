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

//! Transcript ingestion endpoint.

use axum::{extract::State, Json};
use chrono::DateTime;
use convolens_core::TranscriptFragment;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{require_field, ApiError, AppState};

/// Request body for `POST /chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_id: Option<String>,
    pub text: Option<String>,
    /// Capture time as fractional seconds since the Unix epoch. Defaults to
    /// the server's receive time.
    pub timestamp: Option<f64>,
    /// Whether the recognizer finalized this utterance. Defaults to true.
    pub is_final: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
}

/// POST /chat
///
/// Appends one transcript fragment to the user's conversation window. The
/// user is created on first contact; once the window is at capacity the
/// oldest fragment is evicted.
pub async fn ingest_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let user_id = require_field(&request.user_id, "userId")?;
    let text = require_field(&request.text, "text")?;

    let mut fragment = TranscriptFragment::new(text);
    if let Some(seconds) = request.timestamp {
        if let Some(at) = DateTime::from_timestamp_millis((seconds * 1000.0) as i64) {
            fragment = fragment.with_timestamp(at);
        }
    }
    if let Some(is_final) = request.is_final {
        fragment = fragment.with_is_final(is_final);
    }

    state.store.append_transcript(user_id, fragment)?;
    debug!(user_id, "ingested transcript fragment");

    Ok(Json(ChatResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use convolens_storage::RecordStore;
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            store: Arc::new(RecordStore::in_memory(2)),
            experts: Arc::new(vec!["statistician".to_string()]),
        }
    }

    async fn post_json(
        state: AppState,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_chat_appends_fragment() {
        let state = test_state();
        let store = Arc::clone(&state.store);

        let (status, body) = post_json(
            state,
            "/chat",
            json!({"userId": "alex", "text": "hello there"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(store.peek_transcript_as_text("alex"), "hello there");
    }

    #[tokio::test]
    async fn test_chat_window_evicts_oldest() {
        let state = test_state();
        let store = Arc::clone(&state.store);

        for text in ["one", "two", "three"] {
            let (status, _) = post_json(
                AppState {
                    store: Arc::clone(&store),
                    experts: state.experts.clone(),
                },
                "/chat",
                json!({"userId": "alex", "text": text}),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        assert_eq!(store.peek_transcript_as_text("alex"), "two three");
    }

    #[tokio::test]
    async fn test_chat_missing_user_id_rejected() {
        let (status, body) = post_json(test_state(), "/chat", json!({"text": "hi"})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("no userId in request"));
    }

    #[tokio::test]
    async fn test_chat_missing_text_rejected() {
        let (status, body) = post_json(test_state(), "/chat", json!({"userId": "alex"})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("no text in request"));
    }

    #[tokio::test]
    async fn test_chat_epoch_timestamp_applied() {
        let state = test_state();
        let store = Arc::clone(&state.store);

        let (status, _) = post_json(
            state,
            "/chat",
            json!({"userId": "alex", "text": "stamped", "timestamp": 1700000000.5, "isFinal": false}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let fragments = store.drain_transcript("alex").unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].timestamp.timestamp_millis(), 1_700_000_000_500);
        assert!(!fragments[0].is_final);
    }
}
