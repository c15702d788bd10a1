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

//! Transcript fragments and the bounded per-user transcript window.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of fragments a window retains unless configured otherwise.
pub const DEFAULT_TRANSCRIPT_WINDOW: usize = 2;

/// One captured utterance from a user's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptFragment {
    /// Transcribed text of the utterance.
    pub text: String,
    /// When the utterance was captured.
    pub timestamp: DateTime<Utc>,
    /// Whether this is a finalized transcription (as opposed to an interim
    /// partial from a streaming recognizer).
    pub is_final: bool,
}

impl TranscriptFragment {
    /// Creates a finalized fragment stamped with the current time.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now(),
            is_final: true,
        }
    }

    /// Sets the capture timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the finalized flag.
    pub fn with_is_final(mut self, is_final: bool) -> Self {
        self.is_final = is_final;
        self
    }
}

/// Bounded FIFO of the most recent fragments for one user.
///
/// Appending past capacity evicts the oldest fragment, so the window always
/// holds at most `capacity` of the freshest utterances in arrival order.
/// Context derived from the window therefore stays recent without any
/// time-based expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWindow {
    fragments: VecDeque<TranscriptFragment>,
    capacity: usize,
}

impl TranscriptWindow {
    /// Creates an empty window. Capacities below one are treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            fragments: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Maximum number of fragments retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Applies a new capacity, evicting oldest fragments if the window shrank.
    /// Used when a record loaded from disk predates a configuration change.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.fragments.len() > self.capacity {
            self.fragments.pop_front();
        }
    }

    /// Appends a fragment, evicting the oldest if the window is full.
    pub fn push(&mut self, fragment: TranscriptFragment) {
        self.fragments.push_back(fragment);
        while self.fragments.len() > self.capacity {
            self.fragments.pop_front();
        }
    }

    /// Removes and returns every retained fragment, oldest first.
    pub fn drain(&mut self) -> Vec<TranscriptFragment> {
        self.fragments.drain(..).collect()
    }

    /// Joins the retained fragment texts with single spaces, oldest first.
    /// An empty window yields an empty string.
    pub fn as_text(&self) -> String {
        self.fragments
            .iter()
            .map(|fragment| fragment.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Iterates retained fragments, oldest first.
    pub fn fragments(&self) -> impl Iterator<Item = &TranscriptFragment> {
        self.fragments.iter()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

impl Default for TranscriptWindow {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSCRIPT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_within_capacity() {
        let mut window = TranscriptWindow::new(2);
        window.push(TranscriptFragment::new("hello"));
        assert_eq!(window.len(), 1);
        window.push(TranscriptFragment::new("world"));
        assert_eq!(window.len(), 2);
        assert_eq!(window.as_text(), "hello world");
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut window = TranscriptWindow::new(2);
        window.push(TranscriptFragment::new("first"));
        window.push(TranscriptFragment::new("second"));
        window.push(TranscriptFragment::new("third"));

        assert_eq!(window.len(), 2);
        assert_eq!(window.as_text(), "second third");
    }

    #[test]
    fn test_as_text_empty_window() {
        let window = TranscriptWindow::new(2);
        assert_eq!(window.as_text(), "");
    }

    #[test]
    fn test_as_text_no_trailing_space() {
        let mut window = TranscriptWindow::new(3);
        window.push(TranscriptFragment::new("one"));
        window.push(TranscriptFragment::new("two"));
        let text = window.as_text();
        assert_eq!(text, "one two");
        assert!(!text.ends_with(' '));
    }

    #[test]
    fn test_drain_clears_window() {
        let mut window = TranscriptWindow::new(2);
        window.push(TranscriptFragment::new("a"));
        window.push(TranscriptFragment::new("b"));

        let drained = window.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].text, "a");
        assert_eq!(drained[1].text, "b");
        assert!(window.is_empty());
        assert_eq!(window.as_text(), "");
    }

    #[test]
    fn test_set_capacity_trims_oldest() {
        let mut window = TranscriptWindow::new(4);
        for text in ["a", "b", "c", "d"] {
            window.push(TranscriptFragment::new(text));
        }

        window.set_capacity(2);
        assert_eq!(window.len(), 2);
        assert_eq!(window.as_text(), "c d");
    }

    #[test]
    fn test_zero_capacity_treated_as_one() {
        let mut window = TranscriptWindow::new(0);
        assert_eq!(window.capacity(), 1);
        window.push(TranscriptFragment::new("only"));
        window.push(TranscriptFragment::new("latest"));
        assert_eq!(window.as_text(), "latest");
    }

    #[test]
    fn test_default_capacity() {
        let window = TranscriptWindow::default();
        assert_eq!(window.capacity(), DEFAULT_TRANSCRIPT_WINDOW);
    }

    #[test]
    fn test_fragment_builders() {
        let ts = Utc::now();
        let fragment = TranscriptFragment::new("partial")
            .with_timestamp(ts)
            .with_is_final(false);
        assert_eq!(fragment.text, "partial");
        assert_eq!(fragment.timestamp, ts);
        assert!(!fragment.is_final);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The window never exceeds its capacity and always keeps the most
        /// recent fragments in arrival order.
        #[test]
        fn prop_window_bounded_and_recent(
            capacity in 1usize..8,
            texts in proptest::collection::vec("[a-z]{1,8}", 0..32),
        ) {
            let mut window = TranscriptWindow::new(capacity);
            for text in &texts {
                window.push(TranscriptFragment::new(text.clone()));
                prop_assert!(window.len() <= capacity);
            }

            let expected: Vec<&str> = texts
                .iter()
                .rev()
                .take(capacity)
                .rev()
                .map(String::as_str)
                .collect();
            let retained: Vec<&str> = window
                .fragments()
                .map(|f| f.text.as_str())
                .collect();
            prop_assert_eq!(retained, expected);
        }
    }
}
