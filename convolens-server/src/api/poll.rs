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

//! Result delivery endpoint.
//!
//! Clients poll by *feature* name; each feature expands to one or more
//! result channels, and everything undelivered on those channels comes back
//! under the feature's response field. Delivery is tracked per device, so
//! two devices of the same user each see every result exactly once.

use axum::{extract::State, Json};
use convolens_core::{expert_channel, Insight, CHANNEL_CSE, CHANNEL_DEFINER, CHANNEL_EXPLICIT};
use serde::{Deserialize, Serialize};

use crate::api::{require_field, ApiError, AppState};

/// Feature selecting contextual search results (the `cse` channel).
pub const FEATURE_CSE: &str = "contextual_search_engine";
/// Feature selecting entity definitions (the `definer` channel).
pub const FEATURE_DEFINER: &str = "intelligent_entity_definitions";
/// Feature selecting proactive expert output (one channel per expert).
pub const FEATURE_PROACTIVE: &str = "proactive_agent_insights";
/// Feature selecting wake-word query echoes and answers (the `explicit`
/// channel, split by payload kind).
pub const FEATURE_EXPLICIT: &str = "explicit_agent_insights";

const KNOWN_FEATURES: [&str; 4] = [
    FEATURE_CSE,
    FEATURE_DEFINER,
    FEATURE_PROACTIVE,
    FEATURE_EXPLICIT,
];

/// Request body for `POST /ui_poll`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiPollRequest {
    pub user_id: Option<String>,
    pub device_id: Option<String>,
    pub features: Option<Vec<String>>,
}

/// Response body for `POST /ui_poll`. Only the fields for requested
/// features are present.
#[derive(Debug, Serialize)]
pub struct UiPollResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<Insight>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_definitions: Option<Vec<Insight>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_proactive_agent_insights: Option<Vec<Insight>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explicit_insight_queries: Option<Vec<Insight>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explicit_insight_results: Option<Vec<Insight>>,
}

/// POST /ui_poll
///
/// Delivers every result the polling device has not seen yet on the channels
/// behind the requested features, marking them consumed for this device in
/// the same step. Polling registers the user and device if they are new, so
/// a fresh device simply receives the full backlog.
pub async fn ui_poll(
    State(state): State<AppState>,
    Json(request): Json<UiPollRequest>,
) -> Result<Json<UiPollResponse>, ApiError> {
    let user_id = require_field(&request.user_id, "userId")?;
    let device_id = require_field(&request.device_id, "deviceId")?;
    let features = match request.features.as_deref() {
        Some(features) if !features.is_empty() => features,
        _ => return Err(ApiError::BadRequest("no features in request".to_string())),
    };
    for feature in features {
        if !KNOWN_FEATURES.contains(&feature.as_str()) {
            return Err(ApiError::BadRequest(format!("unknown feature: {}", feature)));
        }
    }

    let mut response = UiPollResponse {
        success: true,
        result: None,
        entity_definitions: None,
        results_proactive_agent_insights: None,
        explicit_insight_queries: None,
        explicit_insight_results: None,
    };

    // A repeated feature must not poll its channels twice: the second pass
    // would find nothing and clobber the first delivery.
    if features.iter().any(|f| f == FEATURE_CSE) {
        let delivered = state
            .store
            .poll(user_id, device_id, &[CHANNEL_CSE.to_string()])?;
        response.result = Some(delivered);
    }

    if features.iter().any(|f| f == FEATURE_DEFINER) {
        let delivered = state
            .store
            .poll(user_id, device_id, &[CHANNEL_DEFINER.to_string()])?;
        response.entity_definitions = Some(delivered);
    }

    if features.iter().any(|f| f == FEATURE_PROACTIVE) {
        let channels: Vec<String> = state.experts.iter().map(|name| expert_channel(name)).collect();
        let delivered = state.store.poll(user_id, device_id, &channels)?;
        response.results_proactive_agent_insights = Some(delivered);
    }

    if features.iter().any(|f| f == FEATURE_EXPLICIT) {
        let delivered = state
            .store
            .poll(user_id, device_id, &[CHANNEL_EXPLICIT.to_string()])?;
        let (queries, answers) = split_explicit(delivered);
        response.explicit_insight_queries = Some(queries);
        response.explicit_insight_results = Some(answers);
    }

    Ok(Json(response))
}

/// Splits explicit-channel results into query echoes and answers. Payloads
/// marked `"kind": "query"` are echoes; everything else is an answer.
fn split_explicit(delivered: Vec<Insight>) -> (Vec<Insight>, Vec<Insight>) {
    let mut queries = Vec::new();
    let mut answers = Vec::new();
    for insight in delivered {
        let is_query = insight.payload.get("kind").and_then(|kind| kind.as_str()) == Some("query");
        if is_query {
            queries.push(insight);
        } else {
            answers.push(insight);
        }
    }
    (queries, answers)
}
