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

//! Convolens Core
//!
//! Domain types for the Convolens conversation backend:
//! - **Transcript windows**: bounded FIFOs of a user's most recent utterances
//! - **Results**: immutable payloads published to named per-user channels
//! - **Device cursors**: per-device consumption state for at-most-once delivery
//! - **User records**: the unit of state one user's data lives in
//!
//! The types here are plain data plus the operations that keep their
//! invariants. Locking, persistence, and transport live in
//! `convolens-storage` and `convolens-server`.

pub mod device;
pub mod error;
pub mod insight;
pub mod record;
pub mod transcript;

// Re-exports
pub use device::DeviceCursor;
pub use error::{ConvolensError, ConvolensResult};
pub use insight::{expert_channel, Insight, CHANNEL_CSE, CHANNEL_DEFINER, CHANNEL_EXPLICIT};
pub use record::UserRecord;
pub use transcript::{TranscriptFragment, TranscriptWindow, DEFAULT_TRANSCRIPT_WINDOW};
