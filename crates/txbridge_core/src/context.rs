//! Transaction contexts and transforms.

use crate::config::TransactionOptions;
use crate::connection::Connection;
use crate::error::BridgeResult;
use crate::result::TransactionResult;
use crate::snapshot::SnapshotView;
use crate::types::TransactionHandle;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Application-supplied read-modify-write step.
///
/// Runs synchronously on whatever thread the native loop uses, once per
/// attempt, each time with a fresh snapshot. Returning `Err` is a fault and
/// aborts the attempt, the same as panicking.
pub trait Transform: Send + Sync {
    /// Inspects and edits the snapshot in place.
    fn apply(&self, snapshot: &SnapshotView) -> BridgeResult<TransactionResult>;
}

impl<F> Transform for F
where
    F: Fn(&SnapshotView) -> BridgeResult<TransactionResult> + Send + Sync,
{
    fn apply(&self, snapshot: &SnapshotView) -> BridgeResult<TransactionResult> {
        self(snapshot)
    }
}

/// Everything needed to run one transaction's transform.
///
/// A context is owned by the registry for its whole registered lifetime and
/// keeps its connection alive until it is unregistered.
pub struct TransactionContext {
    transform: Box<dyn Transform>,
    connection: Arc<Connection>,
    options: TransactionOptions,
    handle: AtomicU64,
    registered: AtomicBool,
    attempts: AtomicU32,
}

impl TransactionContext {
    /// Creates an unregistered context around a closure.
    pub fn new<F>(transform: F, connection: Arc<Connection>, options: TransactionOptions) -> Self
    where
        F: Fn(&SnapshotView) -> BridgeResult<TransactionResult> + Send + Sync + 'static,
    {
        Self::from_boxed(Box::new(transform), connection, options)
    }

    /// Creates an unregistered context from a boxed [`Transform`].
    pub fn from_boxed(
        transform: Box<dyn Transform>,
        connection: Arc<Connection>,
        options: TransactionOptions,
    ) -> Self {
        Self {
            transform,
            connection,
            options,
            handle: AtomicU64::new(TransactionHandle::NONE.as_u64()),
            registered: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
        }
    }

    /// Returns the handle assigned at registration, if any.
    pub fn handle(&self) -> Option<TransactionHandle> {
        match self.handle.load(Ordering::Acquire) {
            0 => None,
            raw => Some(TransactionHandle::new(raw)),
        }
    }

    /// Returns true while the context is in a registry.
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Returns the owning connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Returns the options supplied at start time.
    pub fn options(&self) -> TransactionOptions {
        self.options
    }

    /// Returns how many invocations have reached the transform.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_registered(&self, handle: TransactionHandle) {
        self.handle.store(handle.as_u64(), Ordering::Release);
        self.registered.store(true, Ordering::Release);
    }

    pub(crate) fn mark_unregistered(&self) {
        self.registered.store(false, Ordering::Release);
    }

    /// Runs the transform against one snapshot.
    pub(crate) fn run(&self, snapshot: &SnapshotView) -> BridgeResult<TransactionResult> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.transform.apply(snapshot)
    }
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("handle", &self.handle())
            .field("registered", &self.is_registered())
            .field("connection", &self.connection.id())
            .field("options", &self.options)
            .field("attempts", &self.attempts())
            .finish_non_exhaustive()
    }
}
