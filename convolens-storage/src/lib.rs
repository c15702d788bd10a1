// Copyright 2025 Convolens (https://github.com/convolens)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Convolens Storage
//!
//! The record store behind the Convolens backend: per-user conversation
//! state with per-user locking, at-most-once result delivery to devices,
//! and write-through JSON persistence.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       RecordStore                        │
//! │                                                          │
//! │   user id ──► sharded map ──► Mutex<UserRecord>          │
//! │                                 │                        │
//! │                                 ├─ transcript window     │
//! │                                 ├─ results by channel    │
//! │                                 └─ device cursors        │
//! │                                                          │
//! │   every mutation: lock user ─► apply ─► save document    │
//! │                   (snapshot restored if the save fails)  │
//! └──────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                 <data_dir>/users/<user>.json
//! ```
//!
//! Two users never share a lock, so a slow write for one user cannot stall
//! the rest of the store.
//!
//! # Example
//!
//! ```rust,ignore
//! use convolens_storage::RecordStore;
//!
//! let store = RecordStore::open("./convolens-data", 2)?;
//! store.publish("alex", "cse", serde_json::json!({"title": "..."}))?;
//! let fresh = store.poll("alex", "pc", &["cse".to_string()])?;
//! ```

pub mod persistence;
pub mod store;

// Re-exports
pub use persistence::DocumentStore;
pub use store::RecordStore;
