//! Client-side persistence using JSON files.
//!
//! This is the local-storage analog of a browser client: the auth session
//! and per-room read markers live as small JSON files under the user's
//! data directory. Markers for closed rooms are never deleted; stale
//! entries are harmless.

use crate::error::{ClientError, Result};
use chrono::{DateTime, Utc};
use healthlink_protocol::{RoomId, UserId, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Auth token and profile persisted across launches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user: UserProfile,
}

/// On-disk wrapper for the per-room read markers of one user.
#[derive(Debug, Default, Serialize, Deserialize)]
struct MarkerStore {
    markers: HashMap<RoomId, DateTime<Utc>>,
}

/// Handle to the client's data directory.
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    /// Open (creating if needed) the data directory. With no override this
    /// is `~/.healthlink`.
    pub fn open(override_dir: Option<PathBuf>) -> Result<Self> {
        let dir = match override_dir {
            Some(dir) => dir,
            None => default_dir()?,
        };
        fs::create_dir_all(&dir)
            .map_err(|e| ClientError::Storage(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join("session.json")
    }

    fn markers_path(&self, user: &UserId) -> PathBuf {
        self.dir.join(format!("read_markers_{user}.json"))
    }

    pub fn save_session(&self, session: &StoredSession) -> Result<()> {
        self.write_json(&self.session_path(), session)
    }

    pub fn load_session(&self) -> Result<Option<StoredSession>> {
        self.read_json(&self.session_path())
    }

    pub fn clear_session(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| ClientError::Storage(format!("remove {}: {e}", path.display())))?;
        }
        Ok(())
    }

    pub fn save_markers(
        &self,
        user: &UserId,
        markers: &HashMap<RoomId, DateTime<Utc>>,
    ) -> Result<()> {
        let store = MarkerStore {
            markers: markers.clone(),
        };
        self.write_json(&self.markers_path(user), &store)
    }

    /// Missing file means no markers yet, not an error.
    pub fn load_markers(&self, user: &UserId) -> Result<HashMap<RoomId, DateTime<Utc>>> {
        Ok(self
            .read_json::<MarkerStore>(&self.markers_path(user))?
            .unwrap_or_default()
            .markers)
    }

    fn write_json<T: Serialize>(&self, path: &PathBuf, value: &T) -> Result<()> {
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| ClientError::Storage(format!("encode {}: {e}", path.display())))?;
        fs::write(path, json)
            .map_err(|e| ClientError::Storage(format!("write {}: {e}", path.display())))
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, path: &PathBuf) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read(path)
            .map_err(|e| ClientError::Storage(format!("read {}: {e}", path.display())))?;
        let value = serde_json::from_slice(&json)
            .map_err(|e| ClientError::Storage(format!("parse {}: {e}", path.display())))?;
        Ok(Some(value))
    }
}

fn default_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| ClientError::Storage("could not find home directory".into()))?;
    Ok(PathBuf::from(home).join(".healthlink"))
}
