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

//! User feedback endpoints: result ratings and hardware button events.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::{require_field, ApiError, AppState};

/// Request body for `POST /rate_result`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateResultRequest {
    pub user_id: Option<String>,
    pub result_uuid: Option<String>,
    pub rating: Option<i32>,
}

/// Request body for `POST /button_event`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonEventRequest {
    pub user_id: Option<String>,
    pub button_num: Option<i32>,
    pub button_activity: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub success: bool,
}

/// POST /rate_result
///
/// Records an integer rating for a previously delivered result. The result
/// id must be a well-formed UUID; ratings for ids that were never published
/// are stored anyway, since results may have been dropped by a channel
/// clear in the meantime.
pub async fn rate_result(
    State(state): State<AppState>,
    Json(request): Json<RateResultRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let user_id = require_field(&request.user_id, "userId")?;
    let raw_uuid = require_field(&request.result_uuid, "resultUuid")?;
    let rating = request
        .rating
        .ok_or_else(|| ApiError::BadRequest("no rating in request".to_string()))?;
    let result_id = Uuid::parse_str(raw_uuid)
        .map_err(|_| ApiError::BadRequest(format!("invalid resultUuid: {}", raw_uuid)))?;

    state.store.rate_result(user_id, result_id, rating)?;
    info!(user_id, result_id = %result_id, rating, "result rated");

    Ok(Json(FeedbackResponse { success: true }))
}

/// POST /button_event
///
/// Acknowledges a hardware button press from a device. Button events carry
/// no record-store semantics; they are logged for diagnostics only.
pub async fn button_event(
    Json(request): Json<ButtonEventRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let user_id = require_field(&request.user_id, "userId")?;
    let button_num = request
        .button_num
        .ok_or_else(|| ApiError::BadRequest("no buttonNum in request".to_string()))?;
    let button_activity = request
        .button_activity
        .ok_or_else(|| ApiError::BadRequest("no buttonActivity in request".to_string()))?;

    info!(user_id, button_num, button_activity, "button event");

    Ok(Json(FeedbackResponse { success: true }))
}
