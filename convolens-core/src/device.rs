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

//! Per-device delivery cursors.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tracks which results one device has already received.
///
/// The consumed set only grows. There is no way to mark a result unread, so
/// a given result id is handed to a given device at most once, ever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCursor {
    /// Client-chosen device identifier.
    pub device_id: String,
    consumed: HashSet<Uuid>,
}

impl DeviceCursor {
    /// Creates a cursor that has consumed nothing.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            consumed: HashSet::new(),
        }
    }

    /// Marks a result as consumed. Returns `false` if it already was.
    pub fn mark_consumed(&mut self, result_id: Uuid) -> bool {
        self.consumed.insert(result_id)
    }

    /// Whether this device has already received the result.
    pub fn has_consumed(&self, result_id: &Uuid) -> bool {
        self.consumed.contains(result_id)
    }

    /// Number of results this device has received.
    pub fn consumed_count(&self) -> usize {
        self.consumed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_consumed_is_set_semantics() {
        let mut cursor = DeviceCursor::new("pc");
        let id = Uuid::new_v4();

        assert!(cursor.mark_consumed(id));
        assert!(!cursor.mark_consumed(id));
        assert_eq!(cursor.consumed_count(), 1);
        assert!(cursor.has_consumed(&id));
    }

    #[test]
    fn test_fresh_cursor_has_consumed_nothing() {
        let cursor = DeviceCursor::new("phone");
        assert_eq!(cursor.consumed_count(), 0);
        assert!(!cursor.has_consumed(&Uuid::new_v4()));
    }
}
