//! Process identity, instance identity, and identifier generation.
//!
//! The state file of a persister is named `<process id>-<instance>.json`.
//! The process id namespaces files of different applications sharing a base
//! directory; the instance part separates persisters within one process.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Literal used when no application name can be detected.
pub const FALLBACK_PROCESS_ID: &str = "persist-timeout";

/// Environment variable naming the application for state file namespacing.
pub const APP_NAME_ENV: &str = "PERSIST_TIMEOUT_APP";

/// IDs are seeded at `epoch_millis * ID_SCALE` so they stay monotonic
/// across restarts while remaining exactly representable as JSON numbers.
const ID_SCALE: u64 = 1000;

/// Identifier of a scheduled timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeoutId(pub u64);

impl fmt::Display for TimeoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Detect the process identity used to namespace state files.
///
/// Resolution order: `app_name`, `$PERSIST_TIMEOUT_APP`, `$CARGO_PKG_NAME`
/// (set by cargo when running a package), the executable's file stem, and
/// finally [`FALLBACK_PROCESS_ID`]. The result only contains characters that
/// are safe in a file name.
///
/// `$CARGO_PKG_NAME` is only present under `cargo run` or `cargo test`. The
/// same binary launched directly resolves to its executable stem instead, so
/// set `app_name` or `$PERSIST_TIMEOUT_APP` when the state file must keep the
/// same name across launch methods.
pub fn process_id(app_name: Option<&str>) -> String {
    app_name
        .map(str::to_owned)
        .or_else(|| env_non_empty(APP_NAME_ENV))
        .or_else(|| env_non_empty("CARGO_PKG_NAME"))
        .or_else(executable_stem)
        .map(|name| sanitize(&name))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_PROCESS_ID.to_owned())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn executable_stem() -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    exe.file_stem().map(|s| s.to_string_lossy().into_owned())
}

fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Source of fallback instance numbers for unnamed persisters.
///
/// Owned by whatever constructs persisters; two persisters built from the
/// same counter without names never share a state file.
#[derive(Debug, Default)]
pub struct InstanceCounter(AtomicU64);

impl InstanceCounter {
    /// Counter starting at zero.
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Take the next instance number.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Build the instance identity `<process id>-<name or counter>`.
///
/// The counter is only advanced when `name` is `None`.
pub fn instance_id(process_id: &str, name: Option<&str>, counter: &InstanceCounter) -> String {
    match name {
        Some(name) => format!("{process_id}-{name}"),
        None => format!("{process_id}-{}", counter.next()),
    }
}

/// Monotonic generator for numeric identifiers.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Generator whose first value is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Generator seeded above every id in `existing` and above the current
    /// epoch-time floor, so ids from previous runs are never reissued.
    pub fn seeded_above(existing: impl IntoIterator<Item = u64>) -> Self {
        let floor = now_epoch_millis().saturating_mul(ID_SCALE);
        let above_existing = existing
            .into_iter()
            .max()
            .map_or(0, |max| max.saturating_add(1));
        Self::starting_at(floor.max(above_existing))
    }

    /// Take the next identifier.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Current UTC milliseconds since epoch.
pub fn now_epoch_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
