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

//! On-disk user documents: one pretty-printed JSON file per user.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use convolens_core::{ConvolensResult, UserRecord};
use tracing::{debug, warn};

/// Stores user records as individual JSON documents under
/// `<root>/users/<name>.json`.
///
/// Writes go through a `.tmp` sibling and a rename so a crash mid-write
/// leaves either the old document or the new one, never a torn file. The
/// previous version is kept as a `.bak` sibling.
pub struct DocumentStore {
    users_dir: PathBuf,
}

impl DocumentStore {
    /// Opens the document tree under `root`, creating directories as needed.
    pub fn open(root: impl AsRef<Path>) -> ConvolensResult<Self> {
        let users_dir = root.as_ref().join("users");
        fs::create_dir_all(&users_dir)?;
        Ok(Self { users_dir })
    }

    /// Loads every readable user document. Unreadable or corrupt files are
    /// skipped with a warning so one bad document cannot block startup.
    pub fn load_all(&self) -> ConvolensResult<Vec<UserRecord>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.users_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable user document");
                    continue;
                }
            };
            match serde_json::from_str::<UserRecord>(&raw) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping corrupt user document");
                }
            }
        }
        Ok(records)
    }

    /// Atomically replaces one user's document.
    pub fn save(&self, record: &UserRecord) -> ConvolensResult<()> {
        let path = self.user_path(&record.user_id);
        let temp_path = path.with_extension("json.tmp");
        let backup_path = path.with_extension("json.bak");

        let contents = serde_json::to_string_pretty(record)?;
        fs::write(&temp_path, contents)?;
        if path.exists() {
            fs::copy(&path, &backup_path)?;
        }
        fs::rename(&temp_path, &path)?;
        debug!(user_id = %record.user_id, "persisted user document");
        Ok(())
    }

    /// Path of the document backing a user id.
    pub fn user_path(&self, user_id: &str) -> PathBuf {
        self.users_dir.join(file_name_for(user_id))
    }
}

/// Filesystem-safe file name for a user id.
///
/// Ids that are already plain ASCII names map straight to `<id>.json`.
/// Anything else gets its unsafe characters replaced and a hash of the
/// original id appended, so distinct ids cannot collide after cleaning.
fn file_name_for(user_id: &str) -> String {
    let clean: String = user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if clean == user_id && !clean.is_empty() {
        return format!("{}.json", clean);
    }
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    format!("{}-{:016x}.json", clean, hasher.finish())
}
