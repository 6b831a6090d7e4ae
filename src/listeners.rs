//! Listener registry and fan-out.

use crate::identity::{ListenerId, TimeoutId};
use crate::queue::{Payload, Timeout};
use futures_util::future::BoxFuture;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::warn;

/// Metadata passed to a listener alongside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireMeta {
    /// The timeout that fired.
    pub timeout_id: TimeoutId,
    /// The listener being invoked.
    pub listener_id: ListenerId,
}

type Callback<T> = dyn Fn(T, FireMeta) -> BoxFuture<'static, ()> + Send + Sync;

/// Callback invoked once per fired timeout.
///
/// Cloning a listener yields a handle to the same callback, which is what
/// [`ListenerKey::Handle`] matches on.
pub struct Listener<T> {
    callback: Arc<Callback<T>>,
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("callback", &Arc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

impl<T: 'static> Listener<T> {
    /// Listener from an async callback. The fire is complete once the
    /// returned future resolves.
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(T, FireMeta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            callback: Arc::new(move |data: T, meta: FireMeta| -> BoxFuture<'static, ()> {
                Box::pin(callback(data, meta))
            }),
        }
    }

    /// Listener from a synchronous callback.
    pub fn from_fn<F>(callback: F) -> Self
    where
        F: Fn(T, FireMeta) + Send + Sync + 'static,
    {
        Self::new(move |data, meta| {
            callback(data, meta);
            std::future::ready(())
        })
    }
}

impl<T> Listener<T> {
    /// Returns `true` if both handles point at the same callback.
    pub fn same(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.callback), Arc::as_ptr(&other.callback))
    }

    fn invoke(&self, data: T, meta: FireMeta) -> BoxFuture<'static, ()> {
        (self.callback)(data, meta)
    }
}

/// Selects a listener to remove.
pub enum ListenerKey<T> {
    /// By registration id.
    Id(ListenerId),
    /// By callback identity.
    Handle(Listener<T>),
}

impl<T> From<ListenerId> for ListenerKey<T> {
    fn from(id: ListenerId) -> Self {
        Self::Id(id)
    }
}

impl<T> From<Listener<T>> for ListenerKey<T> {
    fn from(listener: Listener<T>) -> Self {
        Self::Handle(listener)
    }
}

impl<T> From<&Listener<T>> for ListenerKey<T> {
    fn from(listener: &Listener<T>) -> Self {
        Self::Handle(listener.clone())
    }
}

/// Registered listeners keyed by generated id.
pub struct ListenerRegistry<T> {
    listeners: BTreeMap<ListenerId, Listener<T>>,
    next_id: u64,
}

impl<T> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self {
            listeners: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> ListenerRegistry<T> {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return its id.
    pub fn add(&mut self, listener: Listener<T>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.insert(id, listener);
        id
    }

    /// Remove a listener by id or by handle. Returns `true` if one was removed.
    ///
    /// Handle removal drops the first registration of that callback; unknown
    /// keys are a no-op.
    pub fn remove(&mut self, key: impl Into<ListenerKey<T>>) -> bool {
        let id = match key.into() {
            ListenerKey::Id(id) => id,
            ListenerKey::Handle(handle) => {
                let Some(id) = self
                    .listeners
                    .iter()
                    .find(|(_, registered)| registered.same(&handle))
                    .map(|(id, _)| *id)
                else {
                    return false;
                };
                id
            }
        };
        self.listeners.remove(&id).is_some()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Current registrations, for dispatch outside the registry lock.
    pub fn snapshot(&self) -> Vec<(ListenerId, Listener<T>)> {
        self.listeners
            .iter()
            .map(|(id, listener)| (*id, listener.clone()))
            .collect()
    }
}

/// Invoke every listener for `timeout` concurrently and wait for all of them.
///
/// Each invocation, including the synchronous part of the callback, runs as
/// its own task; a panicking listener is logged and does not affect the others
/// or the caller.
pub(crate) async fn dispatch<T: Payload>(
    listeners: Vec<(ListenerId, Listener<T>)>,
    timeout: &Timeout<T>,
) {
    let mut invocations = JoinSet::new();
    for (listener_id, listener) in listeners {
        let meta = FireMeta {
            timeout_id: timeout.id,
            listener_id,
        };
        let data = timeout.data.clone();
        // Calling the callback inside the task keeps a panic in its
        // synchronous part from unwinding through the drain.
        invocations.spawn(async move { listener.invoke(data, meta).await });
    }

    while let Some(joined) = invocations.join_next().await {
        if let Err(e) = joined {
            warn!("listener for timeout {} failed: {e}", timeout.id);
        }
    }
}
