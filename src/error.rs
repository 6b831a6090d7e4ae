//! Error types for the persisted timeout queue.

use std::path::PathBuf;

/// Top-level error type for persister operations.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Writing the queue to its backing file failed.
    #[error("couldn't save {}: {source}", path.display())]
    Save {
        /// File the queue was being written to.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Reading persisted state failed. Recovered locally at startup.
    #[error("couldn't load persisted state: {0}")]
    Load(String),

    /// Invalid persister configuration.
    #[error("config error: {0}")]
    Config(String),

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload or state (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Config file parse error.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PersistError>;
