//! Public persister facade.
//!
//! A [`Persister`] derives its state file from the configured instance name,
//! loads whatever a previous run left there, and starts the tick loop.
//!
//! ```rust,ignore
//! let counter = InstanceCounter::new();
//! let persister: Persister<Email> = Persister::start(PersisterConfig::named("mailer"), &counter)?;
//! persister.add_listener(Listener::new(|email, _meta| async move { send(email).await }));
//! persister.set_timeout(email, Duration::from_secs(60)).await?;
//! ```

use crate::config::PersisterConfig;
use crate::error::{PersistError, Result};
use crate::identity::{self, InstanceCounter, ListenerId, TimeoutId};
use crate::listeners::{Listener, ListenerKey};
use crate::queue::{Payload, Timeout};
use crate::scheduler::Scheduler;
use crate::store::Store;
use chrono::{SubsecRound, TimeDelta, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Persisted delayed-task queue with a background firing loop.
///
/// Dropping a persister stops its loop.
pub struct Persister<T: Payload> {
    instance_id: String,
    scheduler: Arc<Scheduler<T>>,
    cancel: CancellationToken,
    loop_handle: JoinHandle<()>,
}

impl<T: Payload> Persister<T> {
    /// Load persisted state for the configured instance and start ticking.
    ///
    /// `counter` supplies the instance number when `config.name` is `None`.
    /// Must be called within a tokio runtime.
    pub fn start(config: PersisterConfig, counter: &InstanceCounter) -> Result<Self> {
        config.validate()?;

        let process_id = identity::process_id(config.app_name.as_deref());
        let instance_id = identity::instance_id(&process_id, config.name.as_deref(), counter);
        let store = Store::for_instance(&config.resolved_base_dir(), &instance_id);

        let scheduler = Arc::new(Scheduler::load(store));
        let cancel = CancellationToken::new();
        let loop_handle = Arc::clone(&scheduler).run(config.period(), cancel.clone());

        Ok(Self {
            instance_id,
            scheduler,
            cancel,
            loop_handle,
        })
    }

    /// Schedule `data` to fire after `delay`.
    ///
    /// Returns once the new queue is saved. On a save failure the timeout is
    /// not scheduled and [`PersistError::Save`] is returned.
    pub async fn set_timeout(&self, data: T, delay: Duration) -> Result<TimeoutId> {
        let fire_at = TimeDelta::from_std(delay)
            .ok()
            .and_then(|delay| Utc::now().checked_add_signed(delay))
            .ok_or_else(|| PersistError::Config(format!("delay out of range: {delay:?}")))?
            .trunc_subsecs(3);

        self.scheduler.schedule(data, fire_at).await
    }

    /// Register a listener invoked for every fired timeout.
    pub fn add_listener(&self, listener: Listener<T>) -> ListenerId {
        self.scheduler.add_listener(listener)
    }

    /// Remove a listener by id or by handle. Returns `true` if one was removed.
    pub fn remove_listener(&self, key: impl Into<ListenerKey<T>>) -> bool {
        self.scheduler.remove_listener(key)
    }

    /// Stop automatic firing. Idempotent.
    ///
    /// A drain already in progress finishes. The queue and listeners stay
    /// usable through [`fire_due`](Self::fire_due).
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` while the tick loop is alive.
    pub fn is_running(&self) -> bool {
        !self.loop_handle.is_finished()
    }

    /// Fire every due timeout now, outside the periodic loop.
    pub async fn fire_due(&self) -> Result<usize> {
        self.scheduler.drain().await
    }

    /// Pending timeouts in fire order.
    pub fn pending(&self) -> Vec<Timeout<T>> {
        self.scheduler.pending()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.scheduler.listener_count()
    }

    /// Derived instance identity, `<process id>-<name or counter>`.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        self.scheduler.store().path()
    }
}

impl<T: Payload> Drop for Persister<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
