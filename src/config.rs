//! Persister configuration.
//!
//! [`PersisterConfig`] carries the recognised construction options (`name`,
//! `period_ms`) plus the directory and process-identity overrides used to
//! place the backing file. Use [`Default::default()`] for the defaults or
//! load from TOML with [`PersisterConfig::from_file`].

use crate::error::{PersistError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default scheduler tick period in milliseconds.
pub const DEFAULT_PERIOD_MS: u64 = 5000;

/// Environment variable overriding the base directory for state files.
pub const BASE_DIR_ENV: &str = "PERSIST_TIMEOUT_DIR";

/// Configuration for one persister instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersisterConfig {
    /// Instance name. When `None`, the next value of an
    /// [`InstanceCounter`](crate::identity::InstanceCounter) is used.
    pub name: Option<String>,
    /// Interval between scheduler ticks, in milliseconds.
    pub period_ms: u64,
    /// Directory holding the state file (None = env override or system temp dir).
    pub base_dir: Option<PathBuf>,
    /// Application name used to namespace the state file (None = detected).
    pub app_name: Option<String>,
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self {
            name: None,
            period_ms: DEFAULT_PERIOD_MS,
            base_dir: None,
            app_name: None,
        }
    }
}

impl PersisterConfig {
    /// Config with the given instance name and default everything else.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Override the tick period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Override the directory holding the state file.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Override the application name used in the file name.
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Load config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates this configuration.
    ///
    /// Checks:
    /// - `period_ms` must be greater than 0
    /// - `name` must be non-empty and free of path separators
    pub fn validate(&self) -> Result<()> {
        if self.period_ms == 0 {
            return Err(PersistError::Config("period_ms must be > 0".into()));
        }
        if let Some(name) = &self.name {
            if name.is_empty() {
                return Err(PersistError::Config("name must not be empty".into()));
            }
            if name.contains(['/', '\\']) {
                return Err(PersistError::Config(format!(
                    "name must not contain path separators: {name:?}"
                )));
            }
        }
        Ok(())
    }

    /// Tick period as a [`Duration`].
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Resolved directory for state files.
    ///
    /// Explicit `base_dir`, then `$PERSIST_TIMEOUT_DIR`, then the system temp dir.
    pub fn resolved_base_dir(&self) -> PathBuf {
        if let Some(dir) = &self.base_dir {
            return dir.clone();
        }
        if let Some(dir) = std::env::var_os(BASE_DIR_ENV) {
            return PathBuf::from(dir);
        }
        std::env::temp_dir()
    }
}
