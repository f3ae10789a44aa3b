//! Error types for the transaction bridge.

use crate::types::TransactionHandle;
use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur in bridge operations.
///
/// None of these are fatal to the process. Inside the trampoline every one of
/// them collapses into an aborted attempt.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No context is registered for the handle.
    #[error("no transaction registered for {handle}")]
    LookupMiss {
        /// The handle that was looked up.
        handle: TransactionHandle,
    },

    /// The transform panicked or returned an error.
    #[error("transform fault: {message}")]
    TransformFault {
        /// Description of the fault.
        message: String,
    },

    /// A snapshot view was used after the invocation that created it returned.
    #[error("stale snapshot access: the invocation that produced this view has returned")]
    StaleAccess,

    /// A write would exceed the capacity of the native buffer.
    #[error("snapshot capacity exceeded: requested {requested} bytes, capacity {capacity}")]
    CapacityExceeded {
        /// Requested value length in bytes.
        requested: usize,
        /// Capacity of the native buffer in bytes.
        capacity: usize,
    },

    /// A patch offset lies beyond the current value.
    #[error("offset {offset} out of bounds for snapshot of length {len}")]
    OutOfBounds {
        /// Requested offset.
        offset: usize,
        /// Current value length.
        len: usize,
    },

    /// The native side passed an unusable snapshot descriptor.
    #[error("invalid snapshot: {message}")]
    InvalidSnapshot {
        /// Why the descriptor was rejected.
        message: String,
    },

    /// The transaction manager has been disposed.
    #[error("transaction manager has been disposed")]
    Disposed,

    /// The owning connection is closed.
    #[error("connection is closed")]
    ConnectionClosed,

    /// Invalid argument.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// CBOR encoding or decoding of a snapshot value failed.
    #[error("codec error: {0}")]
    Codec(String),
}

impl BridgeError {
    /// Creates a transform fault error.
    pub fn transform_fault(message: impl Into<String>) -> Self {
        Self::TransformFault {
            message: message.into(),
        }
    }

    /// Creates an invalid snapshot error.
    pub fn invalid_snapshot(message: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl std::fmt::Display) -> Self {
        Self::Codec(message.to_string())
    }

    /// Returns true if this error is a stale snapshot access.
    pub fn is_stale_access(&self) -> bool {
        matches!(self, BridgeError::StaleAccess)
    }
}
