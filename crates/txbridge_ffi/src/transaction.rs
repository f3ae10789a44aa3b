//! Transaction FFI functions and the native trampoline.

use crate::connection::connection_ref;
use crate::error::{clear_last_error, fail, set_last_error, TxbResult};
use crate::types::{
    signal_from_code, TxbConnection, TxbSignal, TxbSnapshot, TxbSnapshotView,
    TxbTransactionOptions, TxbTransformFn,
};
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error};
use txbridge_core::{
    trampoline, BridgeError, BridgeResult, CallbackRegistry, SnapshotView, TransactionHandle,
    TransactionOptions, TransactionResult, Transform,
};

struct UserData(*mut c_void);

// SAFETY: the pointer is never dereferenced on this side. Whoever passed it to
// `txb_transaction_start` vouches for its use from the committing thread.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

/// A transform implemented by managed code behind a C function pointer.
struct ManagedTransform {
    callback: TxbTransformFn,
    user_data: UserData,
}

impl Transform for ManagedTransform {
    fn apply(&self, snapshot: &SnapshotView) -> BridgeResult<TransactionResult> {
        // The callee owns this clone and frees it with `txb_snapshot_view_free`.
        // It shares the validity slot, so it goes stale with the original.
        let view = Box::into_raw(Box::new(snapshot.clone())).cast::<TxbSnapshotView>();
        // SAFETY: the callback and user data came together from
        // `txb_transaction_start`.
        let code = unsafe { (self.callback)(self.user_data.0, view) };
        Ok(signal_from_code(code).into())
    }
}

/// Starts a transaction on a connection.
///
/// # Arguments
///
/// * `conn` - Connection handle
/// * `options` - Transaction options, or null for defaults
/// * `transform` - Managed transform invoked once per commit attempt
/// * `user_data` - Opaque pointer passed back to `transform`
/// * `out_handle` - Output for the handle the native loop passes to the trampoline
///
/// # Safety
///
/// - `conn` must be a valid connection handle
/// - `options` must be null or point to valid options
/// - `user_data` must remain usable by `transform` until the transaction is disposed
/// - `out_handle` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn txb_transaction_start(
    conn: *mut TxbConnection,
    options: *const TxbTransactionOptions,
    transform: Option<TxbTransformFn>,
    user_data: *mut c_void,
    out_handle: *mut u64,
) -> TxbResult {
    clear_last_error();

    let Some(ffi_conn) = connection_ref(conn) else {
        set_last_error("null connection handle");
        return TxbResult::NullPointer;
    };
    let Some(callback) = transform else {
        set_last_error("null transform callback");
        return TxbResult::NullPointer;
    };
    if out_handle.is_null() {
        set_last_error("null pointer argument");
        return TxbResult::NullPointer;
    }

    let options: TransactionOptions = options
        .as_ref()
        .copied()
        .unwrap_or_default()
        .into();

    let managed = ManagedTransform {
        callback,
        user_data: UserData(user_data),
    };

    match ffi_conn.manager.start_boxed(Box::new(managed), options) {
        Ok(handle) => {
            *out_handle = handle.as_u64();
            TxbResult::Ok
        }
        Err(e) => fail(&e),
    }
}

/// Disposes a transaction.
///
/// Idempotent: disposing an unknown or already disposed handle succeeds.
/// Later trampoline calls for the handle abort without running the transform.
///
/// # Safety
///
/// `conn` must be a valid connection handle.
#[no_mangle]
pub unsafe extern "C" fn txb_transaction_dispose(conn: *mut TxbConnection, handle: u64) -> TxbResult {
    clear_last_error();

    let Some(ffi_conn) = connection_ref(conn) else {
        set_last_error("null connection handle");
        return TxbResult::NullPointer;
    };

    if !ffi_conn.manager.dispose_transaction(TransactionHandle::new(handle)) {
        debug!(handle, "dispose of unknown transaction ignored");
    }
    TxbResult::Ok
}

/// Entry point for the native commit loop.
///
/// Runs one attempt of the transaction registered under `handle` against the
/// candidate value described by `snapshot`. Never unwinds: lookup misses,
/// faults and panics all come back as `Abort`. Faults, closed connections and
/// bad descriptors also leave their `BridgeError` message in the last-error
/// slot; a lookup miss leaves it empty.
///
/// # Safety
///
/// `snapshot` must be null or point to a descriptor whose `data` is valid for
/// `capacity` bytes for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn txb_trampoline(handle: u64, snapshot: *mut TxbSnapshot) -> TxbSignal {
    clear_last_error();

    let registry = CallbackRegistry::global();
    let handle = TransactionHandle::new(handle);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        trampoline::dispatch(&registry, handle, snapshot)
    }));

    match outcome {
        Ok(outcome) => {
            match outcome.error(handle) {
                Some(BridgeError::LookupMiss { .. }) | None => {}
                Some(e) => {
                    fail(&e);
                }
            }
            outcome.signal()
        }
        Err(_) => {
            error!(%handle, "panic escaped trampoline dispatch");
            set_last_error("panic in trampoline");
            TxbSignal::Abort
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{txb_connection_close, txb_connection_in_flight, txb_connection_open};
    use crate::snapshot::{txb_snapshot_is_valid, txb_snapshot_view_free, txb_snapshot_write};
    use std::ptr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    unsafe extern "C" fn write_b(_user_data: *mut c_void, view: *mut TxbSnapshotView) -> i32 {
        let result = txb_snapshot_write(view, b"B".as_ptr(), 1);
        txb_snapshot_view_free(view);
        i32::from(result.is_ok())
    }

    unsafe extern "C" fn abort(_user_data: *mut c_void, view: *mut TxbSnapshotView) -> i32 {
        txb_snapshot_view_free(view);
        0
    }

    unsafe extern "C" fn count_calls(user_data: *mut c_void, view: *mut TxbSnapshotView) -> i32 {
        (*user_data.cast::<AtomicUsize>()).fetch_add(1, Ordering::SeqCst);
        txb_snapshot_view_free(view);
        1
    }

    unsafe extern "C" fn retain_view(user_data: *mut c_void, view: *mut TxbSnapshotView) -> i32 {
        *user_data.cast::<*mut TxbSnapshotView>() = view;
        1
    }

    unsafe extern "C" fn bogus_code(_user_data: *mut c_void, view: *mut TxbSnapshotView) -> i32 {
        txb_snapshot_view_free(view);
        42
    }

    unsafe fn open() -> *mut TxbConnection {
        let mut conn = ptr::null_mut();
        assert_eq!(txb_connection_open(ptr::null(), &mut conn), TxbResult::Ok);
        conn
    }

    unsafe fn start(
        conn: *mut TxbConnection,
        transform: TxbTransformFn,
        user_data: *mut c_void,
    ) -> u64 {
        let mut handle = 0u64;
        let result = txb_transaction_start(conn, ptr::null(), Some(transform), user_data, &mut handle);
        assert_eq!(result, TxbResult::Ok);
        assert_ne!(handle, 0);
        handle
    }

    #[test]
    fn trampoline_commits_managed_write() {
        unsafe {
            let conn = open();
            let handle = start(conn, write_b, ptr::null_mut());

            let mut buffer = *b"A\0\0\0";
            let mut raw = TxbSnapshot::from_buffer(&mut buffer, 1);
            assert_eq!(txb_trampoline(handle, &mut raw), TxbSignal::Success);
            assert_eq!(raw.len, 1);
            assert_eq!(buffer[0], b'B');

            txb_connection_close(conn);
        }
    }

    #[test]
    fn trampoline_abort_leaves_value() {
        unsafe {
            let conn = open();
            let handle = start(conn, abort, ptr::null_mut());

            let mut buffer = *b"A";
            let mut raw = TxbSnapshot::from_buffer(&mut buffer, 1);
            assert_eq!(txb_trampoline(handle, &mut raw), TxbSignal::Abort);
            assert_eq!(&buffer, b"A");

            txb_connection_close(conn);
        }
    }

    #[test]
    fn non_success_codes_abort() {
        unsafe {
            let conn = open();
            let handle = start(conn, bogus_code, ptr::null_mut());

            let mut buffer = [0u8; 1];
            let mut raw = TxbSnapshot::from_buffer(&mut buffer, 0);
            assert_eq!(txb_trampoline(handle, &mut raw), TxbSignal::Abort);

            txb_connection_close(conn);
        }
    }

    #[test]
    fn disposed_handle_aborts_without_calling_transform() {
        unsafe {
            let calls = AtomicUsize::new(0);
            let conn = open();
            let handle = start(conn, count_calls, ptr::from_ref(&calls).cast_mut().cast());

            let mut buffer = [0u8; 4];
            let mut raw = TxbSnapshot::from_buffer(&mut buffer, 0);
            assert_eq!(txb_trampoline(handle, &mut raw), TxbSignal::Success);
            assert_eq!(calls.load(Ordering::SeqCst), 1);

            assert_eq!(txb_transaction_dispose(conn, handle), TxbResult::Ok);
            assert_eq!(txb_transaction_dispose(conn, handle), TxbResult::Ok);

            assert_eq!(txb_trampoline(handle, &mut raw), TxbSignal::Abort);
            assert_eq!(calls.load(Ordering::SeqCst), 1);

            txb_connection_close(conn);
        }
    }

    #[test]
    fn unknown_handle_aborts() {
        unsafe {
            let mut buffer = [0u8; 1];
            let mut raw = TxbSnapshot::from_buffer(&mut buffer, 0);
            assert_eq!(txb_trampoline(u64::MAX, &mut raw), TxbSignal::Abort);
            assert_eq!(txb_trampoline(0, &mut raw), TxbSignal::Abort);
            assert!(crate::error::txb_get_last_error().is_null());
        }
    }

    #[test]
    fn retained_view_goes_stale() {
        unsafe {
            let mut retained: *mut TxbSnapshotView = ptr::null_mut();
            let conn = open();
            let handle = start(conn, retain_view, ptr::from_mut(&mut retained).cast());

            let mut buffer = *b"A";
            let mut raw = TxbSnapshot::from_buffer(&mut buffer, 1);
            assert_eq!(txb_trampoline(handle, &mut raw), TxbSignal::Success);
            assert!(!retained.is_null());

            assert!(!txb_snapshot_is_valid(retained));
            assert_eq!(
                txb_snapshot_write(retained, b"Z".as_ptr(), 1),
                TxbResult::StaleAccess
            );
            assert_eq!(&buffer, b"A");

            txb_snapshot_view_free(retained);
            txb_connection_close(conn);
        }
    }

    #[test]
    fn null_snapshot_aborts_with_message() {
        unsafe {
            let calls = AtomicUsize::new(0);
            let conn = open();
            let handle = start(conn, count_calls, ptr::from_ref(&calls).cast_mut().cast());

            assert_eq!(txb_trampoline(handle, ptr::null_mut()), TxbSignal::Abort);
            let message = std::ffi::CStr::from_ptr(crate::error::txb_get_last_error());
            assert!(message.to_str().unwrap().starts_with("invalid snapshot:"));
            assert_eq!(calls.load(Ordering::SeqCst), 0);

            txb_connection_close(conn);
        }
    }

    #[test]
    fn close_disposes_transactions() {
        unsafe {
            let calls = AtomicUsize::new(0);
            let conn = open();
            let first = start(conn, count_calls, ptr::from_ref(&calls).cast_mut().cast());
            let second = start(conn, count_calls, ptr::from_ref(&calls).cast_mut().cast());

            let mut count = 0usize;
            txb_connection_in_flight(conn, &mut count);
            assert_eq!(count, 2);

            txb_connection_close(conn);

            let mut buffer = [0u8; 1];
            let mut raw = TxbSnapshot::from_buffer(&mut buffer, 0);
            assert_eq!(txb_trampoline(first, &mut raw), TxbSignal::Abort);
            assert_eq!(txb_trampoline(second, &mut raw), TxbSignal::Abort);
            assert_eq!(calls.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn start_rejects_bad_arguments() {
        unsafe {
            let conn = open();
            let mut handle = 0u64;

            assert_eq!(
                txb_transaction_start(conn, ptr::null(), None, ptr::null_mut(), &mut handle),
                TxbResult::NullPointer
            );
            assert_eq!(
                txb_transaction_start(
                    ptr::null_mut(),
                    ptr::null(),
                    Some(abort),
                    ptr::null_mut(),
                    &mut handle
                ),
                TxbResult::NullPointer
            );

            let options = TxbTransactionOptions { max_attempts: 0 };
            assert_eq!(
                txb_transaction_start(conn, &options, Some(abort), ptr::null_mut(), &mut handle),
                TxbResult::InvalidArgument
            );
            assert_eq!(handle, 0);

            txb_connection_close(conn);
        }
    }
}
