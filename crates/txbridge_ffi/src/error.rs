//! Error codes and result types.

use std::cell::RefCell;
use std::ffi::CString;
use txbridge_core::BridgeError;

/// Result code for FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxbResult {
    /// Operation succeeded.
    Ok = 0,
    /// Generic error.
    Error = 1,
    /// Invalid argument.
    InvalidArgument = 2,
    /// Snapshot view used after its invocation returned.
    StaleAccess = 3,
    /// Transaction manager or connection already disposed.
    Disposed = 4,
    /// Write larger than the native buffer.
    CapacityExceeded = 5,
    /// Null pointer.
    NullPointer = 6,
}

impl TxbResult {
    /// Returns true if the result indicates success.
    pub fn is_ok(self) -> bool {
        self == TxbResult::Ok
    }

    /// Returns true if the result indicates an error.
    pub fn is_err(self) -> bool {
        self != TxbResult::Ok
    }
}

impl From<&BridgeError> for TxbResult {
    fn from(error: &BridgeError) -> Self {
        match error {
            BridgeError::StaleAccess => TxbResult::StaleAccess,
            BridgeError::Disposed | BridgeError::ConnectionClosed => TxbResult::Disposed,
            BridgeError::CapacityExceeded { .. } => TxbResult::CapacityExceeded,
            BridgeError::InvalidArgument { .. }
            | BridgeError::OutOfBounds { .. }
            | BridgeError::InvalidSnapshot { .. } => TxbResult::InvalidArgument,
            BridgeError::LookupMiss { .. }
            | BridgeError::TransformFault { .. }
            | BridgeError::Codec(_) => TxbResult::Error,
        }
    }
}

/// Error code type for C compatibility.
pub type ErrorCode = i32;

impl From<TxbResult> for ErrorCode {
    fn from(result: TxbResult) -> Self {
        result as ErrorCode
    }
}

impl From<ErrorCode> for TxbResult {
    fn from(code: ErrorCode) -> Self {
        match code {
            0 => TxbResult::Ok,
            2 => TxbResult::InvalidArgument,
            3 => TxbResult::StaleAccess,
            4 => TxbResult::Disposed,
            5 => TxbResult::CapacityExceeded,
            6 => TxbResult::NullPointer,
            _ => TxbResult::Error,
        }
    }
}

// Thread-local storage for last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Sets the last error message.
pub fn set_last_error(message: impl Into<String>) {
    let msg = message.into();
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clears the last error.
pub fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Records `error` as the last error and returns its result code.
pub(crate) fn fail(error: &BridgeError) -> TxbResult {
    set_last_error(error.to_string());
    TxbResult::from(error)
}

/// Gets the last error message as a C string.
///
/// Returns null if no error is set.
///
/// # Safety
///
/// The returned pointer is valid until the next FFI call on this thread.
#[no_mangle]
pub extern "C" fn txb_get_last_error() -> *const std::ffi::c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cstr) => cstr.as_ptr(),
        None => std::ptr::null(),
    })
}

/// Clears the last error message.
#[no_mangle]
pub extern "C" fn txb_clear_error() {
    clear_last_error();
}
