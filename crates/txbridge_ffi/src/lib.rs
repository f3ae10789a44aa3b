//! # txbridge FFI
//!
//! Stable C ABI for the transaction bridge.
//!
//! Two kinds of callers use this ABI:
//! - the native commit engine, which only ever calls [`txb_trampoline`] with a
//!   handle and a pointer to the candidate value for the current attempt;
//! - managed-runtime bindings, which open connections, start transactions
//!   with a C-callable transform, and read/write snapshot views from inside
//!   that transform.
//!
//! This crate provides:
//! - C-compatible function exports
//! - Memory ownership conventions
//! - Error code mapping with a thread-local last error
//! - Buffer management
//!
//! ## Ownership
//!
//! - Connections returned by `txb_connection_open` are freed by
//!   `txb_connection_close`.
//! - Each snapshot view passed to a managed transform belongs to the callee and
//!   must be released with `txb_snapshot_view_free`, whenever convenient. Once
//!   the invocation returns the view reports `StaleAccess` on every access.
//! - Buffers filled by `txb_snapshot_read` are freed with `txb_free_buffer`.

#![warn(missing_docs)]

pub mod buffer;
pub mod connection;
pub mod error;
pub mod snapshot;
pub mod transaction;
pub mod types;

pub use buffer::TxbBuffer;
pub use error::{TxbResult, ErrorCode};
pub use transaction::txb_trampoline;
pub use types::{TxbConnection, TxbSignal, TxbSnapshot, TxbSnapshotView, TxbTransactionOptions};

/// Returns the library version as a null-terminated string.
///
/// The pointer refers to static memory and must not be freed.
#[no_mangle]
pub extern "C" fn txb_version() -> *const std::ffi::c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr().cast()
}
