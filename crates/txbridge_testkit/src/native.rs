//! A simulated native commit engine.
//!
//! [`NativeCommitLoop`] plays the native side of the bridge: it owns a
//! versioned value, hands each attempt a fresh copy through the trampoline and
//! commits optimistically. Conflicts can be injected to force retries.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;
use txbridge_core::{
    trampoline, BridgeResult, CallbackRegistry, RawSnapshot, SnapshotView, TransactionHandle,
    TransactionManager, TransactionOptions, TransactionResult,
};

/// Default number of writable bytes handed to each attempt.
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 4096;

/// How a native transaction run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// An attempt succeeded and its value was committed.
    Committed {
        /// Attempts made, including the committing one.
        attempts: u32,
        /// Version of the value after the commit.
        version: u64,
    },
    /// An attempt returned Abort; the loop stopped without committing.
    Aborted {
        /// Attempts made, including the aborting one.
        attempts: u32,
    },
    /// Every attempt lost to a conflicting writer.
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
}

impl CommitOutcome {
    /// Returns true if the value was committed.
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed { .. })
    }

    /// Returns the number of attempts made.
    pub fn attempts(&self) -> u32 {
        match *self {
            CommitOutcome::Committed { attempts, .. }
            | CommitOutcome::Aborted { attempts }
            | CommitOutcome::Exhausted { attempts } => attempts,
        }
    }
}

#[derive(Debug)]
struct Document {
    value: Vec<u8>,
    version: u64,
    // Each entry is a competing commit applied just before our next commit
    // check. `None` only bumps the version.
    pending_conflicts: VecDeque<Option<Vec<u8>>>,
}

/// A simulated native engine running the retry-until-commit loop.
#[derive(Debug)]
pub struct NativeCommitLoop {
    registry: Arc<CallbackRegistry>,
    capacity: usize,
    document: Mutex<Document>,
}

impl NativeCommitLoop {
    /// Creates an engine holding `initial` at version 0.
    pub fn new(registry: Arc<CallbackRegistry>, initial: impl Into<Vec<u8>>) -> Self {
        Self {
            registry,
            capacity: DEFAULT_SNAPSHOT_CAPACITY,
            document: Mutex::new(Document {
                value: initial.into(),
                version: 0,
                pending_conflicts: VecDeque::new(),
            }),
        }
    }

    /// Sets the number of writable bytes per attempt.
    ///
    /// Never smaller than the committed value.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Returns the registry the trampoline resolves handles in.
    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    /// Returns a copy of the committed value.
    pub fn committed(&self) -> Vec<u8> {
        self.document.lock().value.clone()
    }

    /// Returns the committed version.
    pub fn version(&self) -> u64 {
        self.document.lock().version
    }

    /// Makes the next commit lose to a competing writer that only bumps the
    /// version.
    pub fn inject_conflict(&self) {
        self.document.lock().pending_conflicts.push_back(None);
    }

    /// Makes the next commit lose to a competing writer that commits `value`.
    ///
    /// The retry sees `value` in its fresh snapshot.
    pub fn inject_competing_write(&self, value: impl Into<Vec<u8>>) {
        self.document
            .lock()
            .pending_conflicts
            .push_back(Some(value.into()));
    }

    /// Returns how many injected conflicts are still pending.
    pub fn pending_conflicts(&self) -> usize {
        self.document.lock().pending_conflicts.len()
    }

    /// Runs the commit loop for `handle`, at most `max_attempts` times.
    ///
    /// Lookup misses and faults come back from the trampoline as Abort and end
    /// the loop like any other abort.
    pub fn run(&self, handle: TransactionHandle, max_attempts: u32) -> CommitOutcome {
        for attempt in 1..=max_attempts {
            let (base, base_version) = {
                let document = self.document.lock();
                (document.value.clone(), document.version)
            };

            let mut buffer = vec![0u8; self.capacity.max(base.len())];
            buffer[..base.len()].copy_from_slice(&base);
            let mut raw = RawSnapshot::from_buffer(&mut buffer, base.len());

            // SAFETY: `raw` describes `buffer`, which lives on this frame and
            // is not touched until the trampoline returns.
            #[allow(unsafe_code)]
            let signal = unsafe { trampoline::invoke(&self.registry, handle, &mut raw) };

            if !signal.is_success() {
                debug!(%handle, attempt, "attempt aborted");
                return CommitOutcome::Aborted { attempts: attempt };
            }

            buffer.truncate(raw.len);
            if let Some(version) = self.try_commit(base_version, buffer) {
                return CommitOutcome::Committed {
                    attempts: attempt,
                    version,
                };
            }
            debug!(%handle, attempt, "commit conflict, retrying");
        }

        CommitOutcome::Exhausted {
            attempts: max_attempts,
        }
    }

    /// Starts a transaction on `manager`, runs it to completion and disposes
    /// it, whatever the outcome.
    pub fn run_transaction<F>(
        &self,
        manager: &TransactionManager,
        transform: F,
        options: TransactionOptions,
    ) -> BridgeResult<CommitOutcome>
    where
        F: Fn(&SnapshotView) -> BridgeResult<TransactionResult> + Send + Sync + 'static,
    {
        let handle = manager.start(transform, options)?;
        let outcome = self.run(handle, options.max_attempts);
        manager.dispose_transaction(handle);
        Ok(outcome)
    }

    fn try_commit(&self, base_version: u64, value: Vec<u8>) -> Option<u64> {
        let mut document = self.document.lock();

        if let Some(competing) = document.pending_conflicts.pop_front() {
            if let Some(competing) = competing {
                document.value = competing;
            }
            document.version += 1;
        }

        if document.version != base_version {
            return None;
        }

        document.value = value;
        document.version += 1;
        Some(document.version)
    }
}
