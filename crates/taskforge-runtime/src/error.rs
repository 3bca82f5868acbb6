//! Error types for the taskforge runtime.

use thiserror::Error;

use crate::remote::RemoteError;

/// Main error type for runtime operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// An operation was invoked in a runner state that does not allow it.
    #[error("invalid solver runner state: {0}")]
    InvalidState(String),

    /// A background thread could not be spawned.
    #[error("thread spawn failed: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Model(#[from] taskforge_core::ModelError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Config(#[from] taskforge_config::ConfigError),
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
