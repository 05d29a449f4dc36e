//! Error types for realmkit core.

use crate::transaction::TransactionState;
use realmkit_engine::{Engine, EngineError, InvalidKeyLength};
use realmkit_schema::SchemaError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in realmkit core operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Schema declaration or value conversion error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Error reported by the storage engine.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// A transaction was started while another one is active.
    #[error("another transaction is already in progress ({current})")]
    TransactionAlreadyInProgress {
        /// State of the handle when the begin was attempted.
        current: TransactionState,
    },

    /// The handle, or the registry that owns it, has been closed.
    #[error("realm is closed")]
    RealmClosed,

    /// The configuration cannot be used to open a handle.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// An encryption key had the wrong length.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Required key length.
        expected: usize,
        /// Supplied key length.
        actual: usize,
    },

    /// A transaction scope was requested for the `None` state.
    #[error("transaction kind must be read or write")]
    InvalidTransactionKind,
}

impl CoreError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid key size error.
    pub fn invalid_key_size(actual: usize, expected: usize) -> Self {
        Self::InvalidKeySize { expected, actual }
    }

    /// Returns the engine error, if this is one.
    #[must_use]
    pub fn as_engine(&self) -> Option<&EngineError> {
        match self {
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InvalidKeyLength> for CoreError {
    fn from(err: InvalidKeyLength) -> Self {
        Self::invalid_key_size(err.actual, err.expected)
    }
}

/// Reads the engine's last error after a failed call.
///
/// Falls back to an `Unknown` engine error carrying `fallback` when the
/// engine left nothing in the channel.
pub(crate) fn engine_failure(engine: &dyn Engine, fallback: &str) -> CoreError {
    let error = engine
        .last_error()
        .unwrap_or_else(|| EngineError::unknown(fallback));
    tracing::warn!(
        target: "realmkit::engine",
        code = %error.code(),
        message = error.message(),
        "{fallback}"
    );
    CoreError::Engine(error)
}
