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

//! Error types shared across the Convolens crates.

use thiserror::Error;

/// Result type for Convolens operations.
pub type ConvolensResult<T> = Result<T, ConvolensError>;

/// Errors surfaced by the record store and its callers.
///
/// There is deliberately no "not found" variant: unknown users and devices
/// are created on first contact, and reads against absent state return empty
/// values instead of failing.
#[derive(Debug, Error)]
pub enum ConvolensError {
    /// A caller-supplied identifier or field was missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The persistence layer could not complete a read or write. In-memory
    /// state has been rolled back to the last durable snapshot.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<std::io::Error> for ConvolensError {
    fn from(err: std::io::Error) -> Self {
        ConvolensError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for ConvolensError {
    fn from(err: serde_json::Error) -> Self {
        ConvolensError::StoreUnavailable(format!("serialization failed: {}", err))
    }
}
