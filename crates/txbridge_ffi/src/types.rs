//! Type definitions for FFI.

use std::ffi::c_void;
use txbridge_core::{RawSnapshot, TransactionOptions, TransactionSignal};

/// An opaque connection handle.
///
/// This is a pointer to the internal connection structure.
/// Never dereference or modify directly.
#[repr(C)]
pub struct TxbConnection {
    _private: [u8; 0],
}

/// An opaque snapshot view handle handed to managed transforms.
#[repr(C)]
pub struct TxbSnapshotView {
    _private: [u8; 0],
}

/// Native transient snapshot descriptor: `{ data, len, capacity }`.
pub type TxbSnapshot = RawSnapshot;

/// Boundary value returned by the trampoline and by managed transforms:
/// `0` = abort, `1` = success.
pub type TxbSignal = TransactionSignal;

/// Managed transform callback.
///
/// Receives the `user_data` given to `txb_transaction_start` and a view that
/// the callee now owns and must release with `txb_snapshot_view_free`.
/// Returns a raw signal code: `1` commits, any other value aborts.
pub type TxbTransformFn =
    unsafe extern "C" fn(user_data: *mut c_void, view: *mut TxbSnapshotView) -> i32;

/// Interprets a raw signal code returned by managed code.
pub fn signal_from_code(code: i32) -> TxbSignal {
    if code == TxbSignal::Success as i32 {
        TxbSignal::Success
    } else {
        TxbSignal::Abort
    }
}

/// Options for starting a transaction.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxbTransactionOptions {
    /// Maximum number of attempts the native loop may make. Must be non-zero.
    pub max_attempts: u32,
}

impl Default for TxbTransactionOptions {
    fn default() -> Self {
        Self {
            max_attempts: TransactionOptions::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl From<TxbTransactionOptions> for TransactionOptions {
    fn from(options: TxbTransactionOptions) -> Self {
        TransactionOptions::new(options.max_attempts)
    }
}
