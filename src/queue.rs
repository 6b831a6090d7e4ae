//! Ordered timeout queue.
//!
//! Keeps [`Timeout`] records sorted ascending by fire date. Timeouts with
//! equal dates keep their insertion order: a new record is placed before the
//! first record whose date is strictly later.

use crate::error::{PersistError, Result};
use crate::identity::TimeoutId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Application data carried by a timeout.
///
/// Payloads are persisted through serde, so the JSON encoding of `T` is the
/// on-disk contract. Blanket-implemented for every eligible type.
pub trait Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// A scheduled future event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeout<T> {
    /// Timeout identifier.
    pub id: TimeoutId,
    /// Instant at or after which the timeout fires.
    #[serde(rename = "date", with = "crate::store::iso_millis")]
    pub fire_at: DateTime<Utc>,
    /// Application payload.
    pub data: T,
}

/// Timeouts sorted ascending by `fire_at`.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct TimeoutQueue<T> {
    entries: VecDeque<Timeout<T>>,
}

impl<T> Default for TimeoutQueue<T> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<T> TimeoutQueue<T> {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a queue from records in any order.
    ///
    /// The sort is stable, so records sharing a date keep their given order.
    pub fn from_entries(mut entries: Vec<Timeout<T>>) -> Self {
        entries.sort_by_key(|t| t.fire_at);
        Self {
            entries: entries.into(),
        }
    }

    /// Insert before the first record whose date is strictly later.
    pub fn insert(&mut self, timeout: Timeout<T>) -> &Timeout<T> {
        let index = self
            .entries
            .partition_point(|existing| existing.fire_at <= timeout.fire_at);
        self.entries.insert(index, timeout);
        &self.entries[index]
    }

    /// Earliest record, if any.
    pub fn peek_earliest(&self) -> Option<&Timeout<T>> {
        self.entries.front()
    }

    /// Remove and return the earliest record, if any.
    pub fn pop_earliest(&mut self) -> Option<Timeout<T>> {
        self.entries.pop_front()
    }

    /// Pop the earliest record if it is due at `now`.
    ///
    /// Returns [`PersistError::Internal`] if a due record was observed but
    /// could not be popped.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Result<Option<Timeout<T>>> {
        match self.peek_earliest() {
            Some(earliest) if earliest.fire_at <= now => {
                let id = earliest.id;
                self.pop_earliest().map(Some).ok_or_else(|| {
                    PersistError::Internal(format!(
                        "timeout {id} was due but the queue returned nothing"
                    ))
                })
            }
            _ => Ok(None),
        }
    }

    /// Remove a record by id. Used to undo an insert whose save failed.
    pub(crate) fn remove(&mut self, id: TimeoutId) -> Option<Timeout<T>> {
        let index = self.entries.iter().position(|t| t.id == id)?;
        self.entries.remove(index)
    }

    /// Number of pending records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records in fire order.
    pub fn iter(&self) -> impl Iterator<Item = &Timeout<T>> {
        self.entries.iter()
    }
}

impl<T: Clone> TimeoutQueue<T> {
    /// Owned copy of the records in fire order.
    pub fn snapshot(&self) -> Vec<Timeout<T>> {
        self.entries.iter().cloned().collect()
    }
}
