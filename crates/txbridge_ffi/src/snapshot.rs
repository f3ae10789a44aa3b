//! Snapshot view accessors for managed transforms.
//!
//! Every accessor returns `TxbResult::StaleAccess` once the invocation that
//! produced the view has returned.

use crate::buffer::TxbBuffer;
use crate::error::{clear_last_error, fail, set_last_error, TxbResult};
use crate::types::TxbSnapshotView;
use txbridge_core::SnapshotView;

unsafe fn view_ref<'a>(view: *mut TxbSnapshotView) -> Option<&'a SnapshotView> {
    (view as *const SnapshotView).as_ref()
}

fn null_view() -> TxbResult {
    set_last_error("null snapshot view");
    TxbResult::NullPointer
}

/// Returns true while the view's invocation is still running.
///
/// # Safety
///
/// `view` must be null or a view not yet passed to `txb_snapshot_view_free`.
#[no_mangle]
pub unsafe extern "C" fn txb_snapshot_is_valid(view: *mut TxbSnapshotView) -> bool {
    view_ref(view).is_some_and(SnapshotView::is_valid)
}

/// Reads the current length of the candidate value.
///
/// # Safety
///
/// - `view` must be a live view handle
/// - `out_len` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn txb_snapshot_len(view: *mut TxbSnapshotView, out_len: *mut usize) -> TxbResult {
    clear_last_error();

    let Some(view) = view_ref(view) else {
        return null_view();
    };
    if out_len.is_null() {
        set_last_error("null pointer argument");
        return TxbResult::NullPointer;
    }

    match view.len() {
        Ok(len) => {
            *out_len = len;
            TxbResult::Ok
        }
        Err(e) => fail(&e),
    }
}

/// Reads the capacity of the native buffer.
///
/// # Safety
///
/// - `view` must be a live view handle
/// - `out_capacity` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn txb_snapshot_capacity(
    view: *mut TxbSnapshotView,
    out_capacity: *mut usize,
) -> TxbResult {
    clear_last_error();

    let Some(view) = view_ref(view) else {
        return null_view();
    };
    if out_capacity.is_null() {
        set_last_error("null pointer argument");
        return TxbResult::NullPointer;
    }

    match view.capacity() {
        Ok(capacity) => {
            *out_capacity = capacity;
            TxbResult::Ok
        }
        Err(e) => fail(&e),
    }
}

/// Copies the candidate value into a new buffer.
///
/// # Safety
///
/// - `view` must be a live view handle
/// - `out_buffer` must be a valid pointer
/// - The returned buffer must be freed with `txb_free_buffer`
#[no_mangle]
pub unsafe extern "C" fn txb_snapshot_read(
    view: *mut TxbSnapshotView,
    out_buffer: *mut TxbBuffer,
) -> TxbResult {
    clear_last_error();

    let Some(view) = view_ref(view) else {
        return null_view();
    };
    if out_buffer.is_null() {
        set_last_error("null pointer argument");
        return TxbResult::NullPointer;
    }

    match TxbBuffer::from_snapshot(view) {
        Ok(buffer) => {
            *out_buffer = buffer;
            TxbResult::Ok
        }
        Err(e) => {
            *out_buffer = TxbBuffer::empty();
            fail(&e)
        }
    }
}

/// Replaces the candidate value with `len` bytes from `data`.
///
/// # Safety
///
/// - `view` must be a live view handle
/// - `data` must be valid for `len` bytes (may be null when `len` is 0)
#[no_mangle]
pub unsafe extern "C" fn txb_snapshot_write(
    view: *mut TxbSnapshotView,
    data: *const u8,
    len: usize,
) -> TxbResult {
    clear_last_error();

    let Some(view) = view_ref(view) else {
        return null_view();
    };
    let bytes = match raw_bytes(data, len) {
        Ok(bytes) => bytes,
        Err(code) => return code,
    };

    match view.write(bytes) {
        Ok(()) => TxbResult::Ok,
        Err(e) => fail(&e),
    }
}

/// Writes `len` bytes at `offset`, extending the value if needed.
///
/// # Safety
///
/// - `view` must be a live view handle
/// - `data` must be valid for `len` bytes (may be null when `len` is 0)
#[no_mangle]
pub unsafe extern "C" fn txb_snapshot_write_at(
    view: *mut TxbSnapshotView,
    offset: usize,
    data: *const u8,
    len: usize,
) -> TxbResult {
    clear_last_error();

    let Some(view) = view_ref(view) else {
        return null_view();
    };
    let bytes = match raw_bytes(data, len) {
        Ok(bytes) => bytes,
        Err(code) => return code,
    };

    match view.write_at(offset, bytes) {
        Ok(()) => TxbResult::Ok,
        Err(e) => fail(&e),
    }
}

/// Releases a view handed to a managed transform.
///
/// May be called during or after the invocation. Null is ignored.
///
/// # Safety
///
/// `view` must be null or a view not already freed.
#[no_mangle]
pub unsafe extern "C" fn txb_snapshot_view_free(view: *mut TxbSnapshotView) {
    if !view.is_null() {
        drop(Box::from_raw(view.cast::<SnapshotView>()));
    }
}

unsafe fn raw_bytes<'a>(data: *const u8, len: usize) -> Result<&'a [u8], TxbResult> {
    if len == 0 {
        return Ok(&[]);
    }
    if data.is_null() {
        set_last_error("null data pointer");
        return Err(TxbResult::NullPointer);
    }
    Ok(std::slice::from_raw_parts(data, len))
}
