//! persist-timeout: a crash-resilient delayed-task queue.
//!
//! Callers schedule timeouts carrying application data; a background loop
//! wakes on a fixed period, fires every due timeout in date order and
//! notifies the registered listeners. The queue is saved to a JSON file
//! after every change, so pending timeouts survive a restart and are
//! re-evaluated against the clock when the persister starts again.
//!
//! # Architecture
//!
//! - **Identity** ([`identity`]): process and instance identity, id generation
//! - **Queue** ([`queue`]): timeouts sorted by fire date, FIFO among ties
//! - **Store** ([`store`]): whole-queue JSON file, one per instance
//! - **Listeners** ([`listeners`]): callbacks keyed by generated id
//! - **Scheduler** ([`scheduler`]): the tick loop (pop, notify, save)
//! - **Persister** ([`persister`]): the public facade
//!
//! Delivery is at-most-once: a timeout is removed from memory before the
//! save that records its removal completes.

pub mod config;
pub mod error;
pub mod identity;
pub mod listeners;
pub mod persister;
pub mod queue;
pub mod scheduler;
pub mod store;

pub use config::PersisterConfig;
pub use error::{PersistError, Result};
pub use identity::{InstanceCounter, ListenerId, TimeoutId};
pub use listeners::{FireMeta, Listener, ListenerKey};
pub use persister::Persister;
pub use queue::{Payload, Timeout};
