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

//! The record store: per-user state behind per-user locks, with
//! write-through persistence.

use std::path::Path;
use std::sync::Arc;

use convolens_core::{ConvolensResult, Insight, TranscriptFragment, UserRecord};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::persistence::DocumentStore;

/// Store of per-user conversation state, published results, and device
/// delivery cursors.
///
/// Each user's record sits behind its own mutex inside a sharded map, so
/// operations on different users never contend and there is no store-wide
/// lock to convoy on. All mutation for one user runs in a single exclusive
/// section: readers of that user see either the state before a mutation or
/// after it, never a half-applied one.
///
/// Users and devices are created lazily on first contact. No operation here
/// fails because an id was never seen before.
pub struct RecordStore {
    users: DashMap<String, Arc<Mutex<UserRecord>>>,
    documents: Option<DocumentStore>,
    window_capacity: usize,
}

impl RecordStore {
    /// In-memory store with no persistence. State is lost on drop.
    pub fn in_memory(window_capacity: usize) -> Self {
        Self {
            users: DashMap::new(),
            documents: None,
            window_capacity,
        }
    }

    /// Store backed by JSON documents under `data_dir`.
    ///
    /// Existing documents are loaded eagerly so consumption cursors survive
    /// restarts and devices are not re-sent results they already saw.
    pub fn open(data_dir: impl AsRef<Path>, window_capacity: usize) -> ConvolensResult<Self> {
        let documents = DocumentStore::open(data_dir)?;
        let users = DashMap::new();
        for mut record in documents.load_all()? {
            // Window capacity follows current configuration, not whatever it
            // was when the document was written.
            record.transcript_window.set_capacity(window_capacity);
            users.insert(record.user_id.clone(), Arc::new(Mutex::new(record)));
        }
        info!(users = users.len(), "record store opened");
        Ok(Self {
            users,
            documents: Some(documents),
            window_capacity,
        })
    }

    /// Creates the user's record if this is their first contact. Idempotent.
    pub fn get_or_create_user(&self, user_id: &str) -> ConvolensResult<()> {
        if self.users.contains_key(user_id) {
            return Ok(());
        }
        self.with_user(user_id, |_| ())
    }

    /// Runs `f` with exclusive access to the user's record, creating the
    /// record on first contact, then write-through persists the result.
    ///
    /// The record is snapshotted before `f` runs; if the save fails the
    /// snapshot is restored and the error is returned, so a mutation that
    /// was not durably recorded is never observable. The per-user lock is
    /// held across the save to keep the document in step with memory.
    pub fn with_user<T>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut UserRecord) -> T,
    ) -> ConvolensResult<T> {
        let handle = self.handle(user_id);
        let mut record = handle.lock();
        let snapshot = self.documents.as_ref().map(|_| record.clone());
        let value = f(&mut record);
        if let Some(documents) = &self.documents {
            if let Err(err) = documents.save(&record) {
                warn!(user_id, error = %err, "write-through failed, rolling back");
                if let Some(snapshot) = snapshot {
                    *record = snapshot;
                }
                return Err(err);
            }
        }
        Ok(value)
    }

    /// Appends one fragment to the user's transcript window, evicting the
    /// oldest fragment if the window is at capacity.
    pub fn append_transcript(
        &self,
        user_id: &str,
        fragment: TranscriptFragment,
    ) -> ConvolensResult<()> {
        self.with_user(user_id, |record| record.push_fragment(fragment))
    }

    /// Removes and returns the user's retained fragments, oldest first.
    /// Unknown users yield an empty list without being created.
    pub fn drain_transcript(&self, user_id: &str) -> ConvolensResult<Vec<TranscriptFragment>> {
        if !self.users.contains_key(user_id) {
            return Ok(Vec::new());
        }
        self.with_user(user_id, |record| record.transcript_window.drain())
    }

    /// Joined text of the user's retained fragments, oldest first. Unknown
    /// users yield an empty string; nothing is created or mutated.
    pub fn peek_transcript_as_text(&self, user_id: &str) -> String {
        match self.users.get(user_id) {
            Some(handle) => handle.lock().transcript_window.as_text(),
            None => String::new(),
        }
    }

    /// Publishes a payload to one of the user's channels and returns the
    /// stored result. The result is durable before this returns.
    pub fn publish(
        &self,
        user_id: &str,
        channel: &str,
        payload: serde_json::Value,
    ) -> ConvolensResult<Insight> {
        let insight = self.with_user(user_id, |record| record.publish(channel, payload))?;
        debug!(user_id, channel, id = %insight.id, "published result");
        Ok(insight)
    }

    /// Drops every result on one of the user's channels. Device cursors are
    /// untouched. Unknown users are a no-op, not an error.
    pub fn clear_channel(&self, user_id: &str, channel: &str) -> ConvolensResult<()> {
        if !self.users.contains_key(user_id) {
            return Ok(());
        }
        self.with_user(user_id, |record| record.clear_channel(channel))
    }

    /// Registers a device for the user, creating both as needed. Idempotent.
    pub fn ensure_device(&self, user_id: &str, device_id: &str) -> ConvolensResult<()> {
        self.with_user(user_id, |record| {
            record.ensure_device(device_id);
        })
    }

    /// Marks one result as consumed by a device, registering the user and
    /// device as needed.
    pub fn mark_consumed(
        &self,
        user_id: &str,
        device_id: &str,
        result_id: Uuid,
    ) -> ConvolensResult<()> {
        self.with_user(user_id, |record| {
            record.mark_consumed(device_id, result_id);
        })
    }

    /// Whether the device has already received the result. Read-only;
    /// unknown users and devices simply report `false`.
    pub fn is_consumed(&self, user_id: &str, device_id: &str, result_id: &Uuid) -> bool {
        self.users
            .get(user_id)
            .map_or(false, |handle| handle.lock().is_consumed(device_id, result_id))
    }

    /// Delivers every not-yet-consumed result on `channels` to the device.
    ///
    /// Collection and consumption marking happen in one exclusive section,
    /// and the updated cursors are durable before anything is returned, so
    /// each result reaches each device at most once even under concurrent
    /// polls. Channels are visited in request order, results within a
    /// channel in publish order.
    pub fn poll(
        &self,
        user_id: &str,
        device_id: &str,
        channels: &[String],
    ) -> ConvolensResult<Vec<Insight>> {
        let delivered =
            self.with_user(user_id, |record| record.take_unconsumed(device_id, channels))?;
        if !delivered.is_empty() {
            debug!(
                user_id,
                device_id,
                delivered = delivered.len(),
                "delivered results"
            );
        }
        Ok(delivered)
    }

    /// Records a rating for one of the user's results.
    pub fn rate_result(&self, user_id: &str, result_id: Uuid, rating: i32) -> ConvolensResult<()> {
        self.with_user(user_id, |record| record.rate_result(result_id, rating))
    }

    /// Ids of users whose transcript window currently holds fragments.
    /// Producers use this to pick up users with fresh conversation context.
    pub fn user_ids_with_transcripts(&self) -> Vec<String> {
        self.users
            .iter()
            .filter(|entry| entry.value().lock().has_transcript())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of users the store currently knows.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn handle(&self, user_id: &str) -> Arc<Mutex<UserRecord>> {
        if let Some(existing) = self.users.get(user_id) {
            return existing.value().clone();
        }
        self.users
            .entry(user_id.to_string())
            .or_insert_with(|| {
                info!(user_id, "creating user record");
                Arc::new(Mutex::new(UserRecord::new(user_id, self.window_capacity)))
            })
            .value()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convolens_core::CHANNEL_CSE;
    use serde_json::json;

    fn channels(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_publish_then_poll_then_nothing() {
        let store = RecordStore::in_memory(2);
        let r1 = store.publish("alex", CHANNEL_CSE, json!({"n": 1})).unwrap();
        let r2 = store.publish("alex", CHANNEL_CSE, json!({"n": 2})).unwrap();

        let first = store.poll("alex", "pc", &channels(&[CHANNEL_CSE])).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id, r1.id);
        assert_eq!(first[1].id, r2.id);

        let second = store.poll("alex", "pc", &channels(&[CHANNEL_CSE])).unwrap();
        assert!(second.is_empty());

        let r3 = store.publish("alex", CHANNEL_CSE, json!({"n": 3})).unwrap();
        let third = store.poll("alex", "pc", &channels(&[CHANNEL_CSE])).unwrap();
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].id, r3.id);
    }

    #[test]
    fn test_each_device_gets_results_once() {
        let store = RecordStore::in_memory(2);
        let r1 = store.publish("alex", CHANNEL_CSE, json!({"n": 1})).unwrap();

        let on_pc = store.poll("alex", "pc", &channels(&[CHANNEL_CSE])).unwrap();
        let on_phone = store.poll("alex", "phone", &channels(&[CHANNEL_CSE])).unwrap();
        assert_eq!(on_pc.len(), 1);
        assert_eq!(on_phone.len(), 1);
        assert_eq!(on_pc[0].id, r1.id);
        assert_eq!(on_phone[0].id, r1.id);

        assert!(store.poll("alex", "pc", &channels(&[CHANNEL_CSE])).unwrap().is_empty());
        assert!(store.poll("alex", "phone", &channels(&[CHANNEL_CSE])).unwrap().is_empty());
    }

    #[test]
    fn test_users_are_isolated() {
        let store = RecordStore::in_memory(2);
        store.publish("alex", CHANNEL_CSE, json!({"n": 1})).unwrap();

        let other = store.poll("blake", "pc", &channels(&[CHANNEL_CSE])).unwrap();
        assert!(other.is_empty());
        assert_eq!(store.user_count(), 2);
    }

    #[test]
    fn test_poll_creates_user_and_device() {
        let store = RecordStore::in_memory(2);
        let delivered = store.poll("new-user", "pc", &channels(&[CHANNEL_CSE])).unwrap();
        assert!(delivered.is_empty());
        assert_eq!(store.user_count(), 1);
        // Subsequent publishes are seen by the registered device.
        let r = store.publish("new-user", CHANNEL_CSE, json!({"n": 1})).unwrap();
        let next = store.poll("new-user", "pc", &channels(&[CHANNEL_CSE])).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].id, r.id);
    }

    #[test]
    fn test_get_or_create_user_idempotent() {
        let store = RecordStore::in_memory(2);
        store.get_or_create_user("alex").unwrap();
        store.get_or_create_user("alex").unwrap();
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn test_transcript_window_evicts_oldest() {
        let store = RecordStore::in_memory(2);
        for text in ["one", "two", "three"] {
            store
                .append_transcript("alex", TranscriptFragment::new(text))
                .unwrap();
        }
        assert_eq!(store.peek_transcript_as_text("alex"), "two three");
    }

    #[test]
    fn test_drain_transcript_clears_window() {
        let store = RecordStore::in_memory(2);
        store
            .append_transcript("alex", TranscriptFragment::new("hello"))
            .unwrap();

        let drained = store.drain_transcript("alex").unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].text, "hello");
        assert_eq!(store.peek_transcript_as_text("alex"), "");
        assert!(store.user_ids_with_transcripts().is_empty());
    }

    #[test]
    fn test_reads_do_not_create_users() {
        let store = RecordStore::in_memory(2);
        assert_eq!(store.peek_transcript_as_text("ghost"), "");
        assert!(store.drain_transcript("ghost").unwrap().is_empty());
        assert!(!store.is_consumed("ghost", "pc", &Uuid::new_v4()));
        store.clear_channel("ghost", CHANNEL_CSE).unwrap();
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn test_clear_channel_keeps_consumption_state() {
        let store = RecordStore::in_memory(2);
        let r1 = store.publish("alex", CHANNEL_CSE, json!({"n": 1})).unwrap();
        store.poll("alex", "pc", &channels(&[CHANNEL_CSE])).unwrap();

        store.clear_channel("alex", CHANNEL_CSE).unwrap();
        assert!(store.poll("alex", "pc", &channels(&[CHANNEL_CSE])).unwrap().is_empty());
        assert!(store.is_consumed("alex", "pc", &r1.id));
    }

    #[test]
    fn test_user_ids_with_transcripts() {
        let store = RecordStore::in_memory(2);
        store
            .append_transcript("alex", TranscriptFragment::new("hi"))
            .unwrap();
        store.get_or_create_user("quiet").unwrap();

        let ids = store.user_ids_with_transcripts();
        assert_eq!(ids, vec!["alex".to_string()]);
    }

    #[test]
    fn test_mark_consumed_hides_result_from_poll() {
        let store = RecordStore::in_memory(2);
        let r1 = store.publish("alex", CHANNEL_CSE, json!({"n": 1})).unwrap();
        store.mark_consumed("alex", "pc", r1.id).unwrap();

        assert!(store.is_consumed("alex", "pc", &r1.id));
        assert!(store.poll("alex", "pc", &channels(&[CHANNEL_CSE])).unwrap().is_empty());
    }

    #[test]
    fn test_rate_result_persists_in_record() {
        let store = RecordStore::in_memory(2);
        let r1 = store.publish("alex", CHANNEL_CSE, json!({"n": 1})).unwrap();
        store.rate_result("alex", r1.id, 1).unwrap();

        let rating = store.with_user("alex", |record| record.ratings[&r1.id]).unwrap();
        assert_eq!(rating, 1);
    }

    #[test]
    fn test_poll_with_no_channels_is_empty() {
        let store = RecordStore::in_memory(2);
        store.publish("alex", CHANNEL_CSE, json!({"n": 1})).unwrap();
        let delivered = store.poll("alex", "pc", &[]).unwrap();
        assert!(delivered.is_empty());
    }
}
