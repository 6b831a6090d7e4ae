//! JSON file persistence for the timeout queue.
//!
//! The whole queue is written on every save as a JSON array of
//! `{ "id": number, "date": ISO-8601 string, "data": ... }` records in fire
//! order. Writes go to a sibling temp file that is then renamed over the
//! state file, so readers see either the old or the new queue.

use crate::error::{PersistError, Result};
use crate::queue::{Timeout, TimeoutQueue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Serde adapter writing timestamps as `2024-01-01T00:00:00.000Z`.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|date| date.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// State file for one persister instance.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Store backed by an explicit file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<base_dir>/<instance_id>.json`.
    pub fn for_instance(base_dir: &Path, instance_id: &str) -> Self {
        Self::new(base_dir.join(format!("{instance_id}.json")))
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read persisted records in file order.
    ///
    /// A missing file yields an empty list; unreadable or malformed files
    /// yield [`PersistError::Load`].
    ///
    /// Reads synchronously. It runs once at startup, and the whole queue
    /// file is expected to stay small.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Vec<Timeout<T>>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PersistError::Load(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            PersistError::Load(format!("cannot parse {}: {e}", self.path.display()))
        })
    }

    /// Load the queue, degrading to an empty queue on any error.
    pub fn load_or_empty<T: DeserializeOwned>(&self) -> TimeoutQueue<T> {
        match self.load() {
            Ok(entries) => {
                debug!(
                    "loaded {} persisted timeouts from {}",
                    entries.len(),
                    self.path.display()
                );
                TimeoutQueue::from_entries(entries)
            }
            Err(e) => {
                warn!("starting with an empty queue: {e}");
                TimeoutQueue::new()
            }
        }
    }

    /// Serialize the queue to the on-disk JSON form.
    pub fn encode<T: Serialize>(queue: &TimeoutQueue<T>) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(queue)?)
    }

    /// Replace the state file with `bytes`.
    pub async fn write(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.save_error(source))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(|source| self.save_error(source))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| self.save_error(source))?;

        debug!("saved {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }

    /// Encode and write the queue.
    pub async fn save<T: Serialize>(&self, queue: &TimeoutQueue<T>) -> Result<()> {
        let bytes = Self::encode(queue)?;
        self.write(&bytes).await
    }

    fn save_error(&self, source: std::io::Error) -> PersistError {
        PersistError::Save {
            path: self.path.clone(),
            source,
        }
    }
}
