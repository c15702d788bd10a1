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

//! Published results and the named channels they travel on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Channel carrying contextual search results.
pub const CHANNEL_CSE: &str = "cse";

/// Channel carrying entity definitions.
pub const CHANNEL_DEFINER: &str = "definer";

/// Channel carrying explicit-query entries: the recognized queries and the
/// answers produced for them, distinguished by the payload's `kind` field.
pub const CHANNEL_EXPLICIT: &str = "explicit";

/// Channel name for one named expert agent.
pub fn expert_channel(name: &str) -> String {
    format!("expert:{}", name)
}

/// One result produced for a user, addressed to a single channel.
///
/// Results are immutable once published. Delivery state lives on the
/// per-device cursors, never on the result itself, so any number of devices
/// can consume the same result independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Unique id, assigned at publish time.
    pub id: Uuid,
    /// Channel the result was published to.
    pub channel: String,
    /// Producer-defined payload. Opaque to the store.
    pub payload: serde_json::Value,
    /// When the result was published.
    pub created_at: DateTime<Utc>,
}

impl Insight {
    /// Creates a result with a fresh id, stamped with the current time.
    pub fn new(channel: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_assigns_unique_ids() {
        let a = Insight::new(CHANNEL_CSE, json!({"title": "a"}));
        let b = Insight::new(CHANNEL_CSE, json!({"title": "b"}));
        assert_ne!(a.id, b.id);
        assert_eq!(a.channel, "cse");
    }

    #[test]
    fn test_expert_channel_name() {
        assert_eq!(expert_channel("statistician"), "expert:statistician");
        assert_eq!(expert_channel("fact_checker"), "expert:fact_checker");
    }

    #[test]
    fn test_serde_round_trip() {
        let insight = Insight::new(CHANNEL_DEFINER, json!({"term": "entropy"}));
        let raw = serde_json::to_string(&insight).unwrap();
        let back: Insight = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, insight);
    }
}
