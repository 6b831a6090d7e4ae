//! Scheduler core and background loop.
//!
//! [`Scheduler`] owns the queue, listener registry and state file of one
//! persister. [`Scheduler::run`] spawns a tokio task that ticks on a fixed
//! period and drains every due timeout: pop, notify all listeners, save.

use crate::error::{PersistError, Result};
use crate::identity::{IdGenerator, ListenerId, TimeoutId};
use crate::listeners::{self, Listener, ListenerKey, ListenerRegistry};
use crate::queue::{Payload, Timeout, TimeoutQueue};
use crate::store::Store;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shared state of one persister, driven by the tick loop and by callers.
pub struct Scheduler<T> {
    queue: Mutex<TimeoutQueue<T>>,
    listeners: Mutex<ListenerRegistry<T>>,
    store: Store,
    ids: IdGenerator,
    /// Serializes file writes so the newest snapshot is always written last.
    save_lock: tokio::sync::Mutex<()>,
    /// Held for a whole drain; drains never interleave.
    drain_lock: tokio::sync::Mutex<()>,
}

impl<T: Payload> Scheduler<T> {
    /// Scheduler backed by `store`, starting from its persisted contents.
    pub fn load(store: Store) -> Self {
        let queue = store.load_or_empty::<T>();
        Self::with_queue(store, queue)
    }

    /// Scheduler starting from an explicit queue.
    pub fn with_queue(store: Store, queue: TimeoutQueue<T>) -> Self {
        let ids = IdGenerator::seeded_above(queue.iter().map(|t| t.id.0));
        Self {
            queue: Mutex::new(queue),
            listeners: Mutex::new(ListenerRegistry::new()),
            store,
            ids,
            save_lock: tokio::sync::Mutex::new(()),
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Insert a timeout firing at `fire_at` and persist it.
    ///
    /// If the save fails the insert is undone and the save error returned.
    pub async fn schedule(&self, data: T, fire_at: DateTime<Utc>) -> Result<TimeoutId> {
        let id = TimeoutId(self.ids.next());
        self.lock_queue().insert(Timeout { id, fire_at, data });

        if let Err(e) = self.persist().await {
            warn!("rolling back timeout {id}: {e}");
            self.lock_queue().remove(id);
            return Err(e);
        }

        debug!("scheduled timeout {id} for {fire_at}");
        Ok(id)
    }

    /// Register a listener.
    pub fn add_listener(&self, listener: Listener<T>) -> ListenerId {
        self.lock_listeners().add(listener)
    }

    /// Remove a listener by id or handle. Unknown keys are ignored.
    pub fn remove_listener(&self, key: impl Into<ListenerKey<T>>) -> bool {
        self.lock_listeners().remove(key)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    /// Pending timeouts in fire order.
    pub fn pending(&self) -> Vec<Timeout<T>> {
        self.lock_queue().snapshot()
    }

    /// The state file.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Fire every due timeout in date order. Returns how many fired.
    ///
    /// Each popped timeout is delivered to a snapshot of the listeners, all
    /// invocations are awaited, and the queue is saved before the next one
    /// is popped. A failed save ends the drain with that error; the timeout
    /// that was just delivered stays removed.
    pub async fn drain(&self) -> Result<usize> {
        let _draining = self.drain_lock.lock().await;
        let mut fired = 0;

        loop {
            let popped = self.lock_queue().pop_due(Utc::now())?;
            let Some(timeout) = popped else {
                break;
            };

            let listeners = self.lock_listeners().snapshot();
            debug!(
                "firing timeout {} to {} listeners",
                timeout.id,
                listeners.len()
            );
            listeners::dispatch(listeners, &timeout).await;
            fired += 1;

            self.persist().await?;
        }

        Ok(fired)
    }

    /// Spawn the periodic tick loop. It stops when `cancel` is cancelled,
    /// letting a drain that is already running finish first.
    pub fn run(self: Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let pending = self.lock_queue().len();
            info!(
                "scheduler started for {} with {pending} pending timeouts",
                self.store.path().display()
            );
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("scheduler stopped for {}", self.store.path().display());
                        break;
                    }
                    _ = interval.tick() => {
                        match self.drain().await {
                            Ok(0) => {}
                            Ok(fired) => debug!("tick fired {fired} timeouts"),
                            Err(PersistError::Internal(msg)) => {
                                error!("scheduler halted on internal error: {msg}");
                                break;
                            }
                            Err(e) => error!("cannot persist state after firing: {e}"),
                        }
                    }
                }
            }
        })
    }

    async fn persist(&self) -> Result<()> {
        let _saving = self.save_lock.lock().await;
        let bytes = Store::encode(&*self.lock_queue())?;
        self.store.write(&bytes).await
    }

    fn lock_queue(&self) -> MutexGuard<'_, TimeoutQueue<T>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_listeners(&self) -> MutexGuard<'_, ListenerRegistry<T>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}
