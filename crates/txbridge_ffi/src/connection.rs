//! Connection FFI functions.

use crate::error::{clear_last_error, set_last_error, TxbResult};
use crate::types::TxbConnection;
use std::ffi::{c_char, CStr};
use tracing::debug;
use txbridge_core::{CallbackRegistry, Connection, TransactionManager};

/// State behind a `TxbConnection` pointer.
pub(crate) struct FfiConnection {
    pub(crate) manager: TransactionManager,
}

/// Borrows the connection behind a handle.
///
/// # Safety
///
/// `conn` must be null or a live handle from `txb_connection_open`.
pub(crate) unsafe fn connection_ref<'a>(conn: *mut TxbConnection) -> Option<&'a FfiConnection> {
    (conn as *const FfiConnection).as_ref()
}

/// Opens a connection whose transactions register into the global registry.
///
/// # Arguments
///
/// * `name` - Connection name (null-terminated UTF-8), or null for `"default"`
/// * `out_conn` - Output pointer for the connection handle
///
/// # Returns
///
/// `TxbResult::Ok` on success, error code otherwise.
///
/// # Safety
///
/// - `name` must be a valid null-terminated string or null
/// - `out_conn` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn txb_connection_open(
    name: *const c_char,
    out_conn: *mut *mut TxbConnection,
) -> TxbResult {
    clear_last_error();

    if out_conn.is_null() {
        set_last_error("null pointer argument");
        return TxbResult::NullPointer;
    }

    let name = if name.is_null() {
        "default".to_string()
    } else {
        match CStr::from_ptr(name).to_str() {
            Ok(s) => s.to_string(),
            Err(_) => {
                set_last_error("invalid UTF-8 in connection name");
                return TxbResult::InvalidArgument;
            }
        }
    };

    let connection = Connection::new(name);
    debug!(connection = %connection.id(), name = connection.name(), "opened connection");

    let ffi_conn = Box::new(FfiConnection {
        manager: TransactionManager::new(CallbackRegistry::global(), connection),
    });
    *out_conn = Box::into_raw(ffi_conn).cast::<TxbConnection>();
    TxbResult::Ok
}

/// Closes a connection.
///
/// Disposes every transaction started on it; later trampoline calls for those
/// handles abort. Invocations already running finish normally.
///
/// # Returns
///
/// `TxbResult::Ok` on success, error code otherwise.
///
/// # Safety
///
/// `conn` must have been returned by `txb_connection_open` and must not be
/// used after this call.
#[no_mangle]
pub unsafe extern "C" fn txb_connection_close(conn: *mut TxbConnection) -> TxbResult {
    clear_last_error();

    if conn.is_null() {
        set_last_error("null pointer argument");
        return TxbResult::NullPointer;
    }

    let ffi_conn = Box::from_raw(conn.cast::<FfiConnection>());
    ffi_conn.manager.dispose();
    ffi_conn.manager.connection().close();
    debug!(connection = %ffi_conn.manager.connection().id(), "closed connection");
    TxbResult::Ok
}

/// Reports how many transactions are started and not yet disposed.
///
/// # Safety
///
/// - `conn` must be a valid connection handle
/// - `out_count` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn txb_connection_in_flight(
    conn: *mut TxbConnection,
    out_count: *mut usize,
) -> TxbResult {
    clear_last_error();

    let Some(ffi_conn) = connection_ref(conn) else {
        set_last_error("null connection handle");
        return TxbResult::NullPointer;
    };
    if out_count.is_null() {
        set_last_error("null pointer argument");
        return TxbResult::NullPointer;
    }

    *out_count = ffi_conn.manager.in_flight();
    TxbResult::Ok
}
