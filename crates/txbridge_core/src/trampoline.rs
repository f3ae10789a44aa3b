//! The single entry point the native commit loop calls.
//!
//! Each call resolves a handle to its context, wraps the native candidate
//! value in a fresh [`SnapshotView`], runs the transform, invalidates the view
//! and reports a [`TransactionSignal`]. Nothing raised by application code
//! escapes: panics and transform errors become `Abort`, because the runtime on
//! the other side of the boundary cannot unwind through this frame.
//!
//! Calls may arrive concurrently from threads the bridge does not control.
//! Calls for distinct handles only contend on the momentary registry lookup.
//! The native loop must not overlap calls for the *same* handle.

use crate::error::BridgeError;
use crate::registry::CallbackRegistry;
use crate::result::{TransactionResult, TransactionSignal};
use crate::snapshot::{RawSnapshot, SnapshotView};
use crate::types::TransactionHandle;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Detailed result of one trampoline call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The transform returned Success.
    Success,
    /// The transform returned Abort.
    Abort,
    /// No context was registered under the handle; no user code ran.
    LookupMiss,
    /// The owning connection is closed; no user code ran.
    ConnectionClosed,
    /// The native descriptor was unusable; no user code ran.
    InvalidSnapshot {
        /// Why the descriptor was rejected.
        message: String,
    },
    /// The transform panicked or returned an error.
    Fault {
        /// Panic payload or error message.
        message: String,
    },
}

impl InvocationOutcome {
    /// Returns the value to hand back across the boundary.
    pub fn signal(&self) -> TransactionSignal {
        match self {
            InvocationOutcome::Success => TransactionSignal::Success,
            _ => TransactionSignal::Abort,
        }
    }

    /// Returns true if the transform faulted.
    pub fn is_fault(&self) -> bool {
        matches!(self, InvocationOutcome::Fault { .. })
    }

    /// Converts an outcome that did not come from the transform itself into
    /// the matching [`BridgeError`].
    ///
    /// Returns `None` for `Success` and `Abort`.
    pub fn error(&self, handle: TransactionHandle) -> Option<BridgeError> {
        match self {
            InvocationOutcome::Success | InvocationOutcome::Abort => None,
            InvocationOutcome::LookupMiss => Some(BridgeError::LookupMiss { handle }),
            InvocationOutcome::ConnectionClosed => Some(BridgeError::ConnectionClosed),
            InvocationOutcome::InvalidSnapshot { message } => {
                Some(BridgeError::invalid_snapshot(message.clone()))
            }
            InvocationOutcome::Fault { message } => {
                Some(BridgeError::transform_fault(message.clone()))
            }
        }
    }

    /// Returns the diagnostic message for outcomes that carry one.
    pub fn message(&self) -> Option<&str> {
        match self {
            InvocationOutcome::InvalidSnapshot { message }
            | InvocationOutcome::Fault { message } => Some(message),
            _ => None,
        }
    }
}

/// Runs one attempt of the transaction registered under `handle`.
///
/// # Safety
///
/// `raw` must be null or point to a [`RawSnapshot`] whose `data` is valid for
/// `capacity` bytes, and neither may be touched by anyone else until this call
/// returns.
pub unsafe fn dispatch(
    registry: &CallbackRegistry,
    handle: TransactionHandle,
    raw: *mut RawSnapshot,
) -> InvocationOutcome {
    let stats = registry.stats();
    stats.record_invocation();

    let outcome = run_attempt(registry, handle, raw);

    match &outcome {
        InvocationOutcome::Success => stats.record_success(),
        InvocationOutcome::Abort => stats.record_abort(),
        _ => {
            stats.record_abort();
            if let Some(error) = outcome.error(handle) {
                log_abort(registry, handle, &error);
            }
        }
    }

    outcome
}

/// Like [`dispatch`], returning only the boundary signal.
///
/// # Safety
///
/// Same contract as [`dispatch`].
pub unsafe fn invoke(
    registry: &CallbackRegistry,
    handle: TransactionHandle,
    raw: *mut RawSnapshot,
) -> TransactionSignal {
    dispatch(registry, handle, raw).signal()
}

fn log_abort(registry: &CallbackRegistry, handle: TransactionHandle, error: &BridgeError) {
    match error {
        BridgeError::LookupMiss { .. } => {
            registry.stats().record_lookup_miss();
            debug!(%error, "trampoline lookup miss, aborting attempt");
        }
        BridgeError::TransformFault { .. } => {
            registry.stats().record_fault();
            if registry.config().log_faults {
                warn!(%handle, %error, "aborting attempt");
            }
        }
        BridgeError::InvalidSnapshot { .. } => {
            warn!(%handle, %error, "aborting attempt");
        }
        _ => debug!(%handle, %error, "aborting attempt"),
    }
}

unsafe fn run_attempt(
    registry: &CallbackRegistry,
    handle: TransactionHandle,
    raw: *mut RawSnapshot,
) -> InvocationOutcome {
    // The registry lock is released before any user code runs.
    let Some(context) = registry.lookup(handle) else {
        return InvocationOutcome::LookupMiss;
    };

    if context.connection().is_closed() {
        return InvocationOutcome::ConnectionClosed;
    }

    let view = match SnapshotView::bind(raw) {
        Ok(view) => view,
        Err(e) => {
            return InvocationOutcome::InvalidSnapshot {
                message: e.to_string(),
            }
        }
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| context.run(&view)));

    // Unconditionally, before the native side frees the memory.
    view.invalidate();

    match result {
        Ok(Ok(TransactionResult::Success)) => InvocationOutcome::Success,
        Ok(Ok(TransactionResult::Abort)) => InvocationOutcome::Abort,
        Ok(Err(e)) => InvocationOutcome::Fault {
            message: e.to_string(),
        },
        Err(payload) => InvocationOutcome::Fault {
            message: panic_message(payload.as_ref()),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic with non-string payload".to_string()
    }
}
