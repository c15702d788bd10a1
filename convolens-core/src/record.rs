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

//! The per-user record: transcript window, published results, and device
//! cursors in one unit of state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::DeviceCursor;
use crate::insight::Insight;
use crate::transcript::{TranscriptFragment, TranscriptWindow};

/// Everything kept for one user.
///
/// A record is only ever touched under its owning store's per-user lock, so
/// the methods here assume exclusive access and stay synchronous. Nothing in
/// a record is shared across users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Caller-chosen user identifier.
    pub user_id: String,
    /// Most recent transcript fragments, oldest first.
    pub transcript_window: TranscriptWindow,
    /// Published results per channel, in publish order.
    pub results_by_channel: HashMap<String, Vec<Insight>>,
    /// Delivery cursors keyed by device id.
    pub devices: HashMap<String, DeviceCursor>,
    /// Caller feedback on individual results. Results themselves are
    /// immutable, so ratings live beside them rather than on them.
    pub ratings: HashMap<Uuid, i32>,
}

impl UserRecord {
    /// Creates an empty record for a user.
    pub fn new(user_id: impl Into<String>, window_capacity: usize) -> Self {
        Self {
            user_id: user_id.into(),
            transcript_window: TranscriptWindow::new(window_capacity),
            results_by_channel: HashMap::new(),
            devices: HashMap::new(),
            ratings: HashMap::new(),
        }
    }

    /// Appends a fragment, evicting the oldest if the window is full.
    pub fn push_fragment(&mut self, fragment: TranscriptFragment) {
        self.transcript_window.push(fragment);
    }

    /// Whether the transcript window currently holds any fragments.
    pub fn has_transcript(&self) -> bool {
        !self.transcript_window.is_empty()
    }

    /// Publishes a payload to a channel and returns the stored result.
    pub fn publish(&mut self, channel: &str, payload: serde_json::Value) -> Insight {
        let insight = Insight::new(channel, payload);
        self.results_by_channel
            .entry(channel.to_string())
            .or_default()
            .push(insight.clone());
        insight
    }

    /// Drops every result on a channel. Device cursors are left alone; ids
    /// already consumed stay consumed even if the same id could reappear.
    pub fn clear_channel(&mut self, channel: &str) {
        self.results_by_channel.remove(channel);
    }

    /// Number of results currently stored on a channel.
    pub fn channel_len(&self, channel: &str) -> usize {
        self.results_by_channel.get(channel).map_or(0, Vec::len)
    }

    /// Registers a device if unseen. Returns `true` when it was created.
    pub fn ensure_device(&mut self, device_id: &str) -> bool {
        if self.devices.contains_key(device_id) {
            return false;
        }
        self.devices
            .insert(device_id.to_string(), DeviceCursor::new(device_id));
        true
    }

    /// Marks a result consumed for a device, registering the device if
    /// needed. Returns `false` if the device had already consumed it.
    pub fn mark_consumed(&mut self, device_id: &str, result_id: Uuid) -> bool {
        self.ensure_device(device_id);
        self.devices
            .get_mut(device_id)
            .map_or(false, |cursor| cursor.mark_consumed(result_id))
    }

    /// Whether a device has already received a result.
    pub fn is_consumed(&self, device_id: &str, result_id: &Uuid) -> bool {
        self.devices
            .get(device_id)
            .map_or(false, |cursor| cursor.has_consumed(result_id))
    }

    /// Collects every result on `channels` that the device has not yet
    /// received, marking each one consumed as it is collected.
    ///
    /// Channels are visited in the order given; within a channel, results
    /// come back in publish order. The device is registered on first contact.
    pub fn take_unconsumed(&mut self, device_id: &str, channels: &[String]) -> Vec<Insight> {
        self.ensure_device(device_id);
        let mut delivered = Vec::new();
        if let Some(cursor) = self.devices.get_mut(device_id) {
            for channel in channels {
                if let Some(results) = self.results_by_channel.get(channel) {
                    for insight in results {
                        if cursor.mark_consumed(insight.id) {
                            delivered.push(insight.clone());
                        }
                    }
                }
            }
        }
        delivered
    }

    /// Records a rating for a result id. Ratings for ids that were never
    /// published are stored anyway; there is nothing to validate them
    /// against once a channel has been cleared.
    pub fn rate_result(&mut self, result_id: Uuid, rating: i32) {
        self.ratings.insert(result_id, rating);
    }
}
