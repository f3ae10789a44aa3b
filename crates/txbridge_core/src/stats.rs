//! Bridge statistics.
//!
//! Counters for registry and trampoline activity. Every trampoline invocation
//! ends in exactly one success or one abort; lookup misses and faults are
//! additionally broken out of the abort count.
//!
//! # Usage
//!
//! ```rust,ignore
//! let registry = CallbackRegistry::new();
//! // ... register transactions, dispatch invocations ...
//! let stats = registry.stats().snapshot();
//! println!("Invocations: {}", stats.invocations);
//! println!("Aborts: {}", stats.aborts);
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bridge statistics.
///
/// All counters are atomic and can be read while invocations are in progress.
#[derive(Debug, Default)]
pub struct BridgeStats {
    // Registry counters
    /// Contexts registered.
    registrations: AtomicU64,
    /// Contexts actually removed by `unregister`.
    unregistrations: AtomicU64,

    // Trampoline counters
    /// Trampoline invocations.
    invocations: AtomicU64,
    /// Invocations that returned Success.
    successes: AtomicU64,
    /// Invocations that returned Abort, for any reason.
    aborts: AtomicU64,
    /// Aborts caused by an unknown handle.
    lookup_misses: AtomicU64,
    /// Aborts caused by a panicking or failing transform.
    faults: AtomicU64,
}

impl BridgeStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    // === Increment methods (internal use) ===

    pub(crate) fn record_registration(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unregistration(&self) {
        self.unregistrations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lookup_miss(&self) {
        self.lookup_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    // === Getter methods (public API) ===

    /// Returns the number of registered contexts.
    pub fn registrations(&self) -> u64 {
        self.registrations.load(Ordering::Relaxed)
    }

    /// Returns the number of removed contexts.
    pub fn unregistrations(&self) -> u64 {
        self.unregistrations.load(Ordering::Relaxed)
    }

    /// Returns the number of trampoline invocations.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Returns the number of successful invocations.
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Returns the number of aborted invocations.
    pub fn aborts(&self) -> u64 {
        self.aborts.load(Ordering::Relaxed)
    }

    /// Returns the number of lookup misses.
    pub fn lookup_misses(&self) -> u64 {
        self.lookup_misses.load(Ordering::Relaxed)
    }

    /// Returns the number of transform faults.
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            registrations: self.registrations(),
            unregistrations: self.unregistrations(),
            invocations: self.invocations(),
            successes: self.successes(),
            aborts: self.aborts(),
            lookup_misses: self.lookup_misses(),
            faults: self.faults(),
        }
    }
}

/// A point-in-time snapshot of bridge statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    /// Contexts registered.
    pub registrations: u64,
    /// Contexts removed.
    pub unregistrations: u64,
    /// Trampoline invocations.
    pub invocations: u64,
    /// Invocations that returned Success.
    pub successes: u64,
    /// Invocations that returned Abort.
    pub aborts: u64,
    /// Aborts caused by an unknown handle.
    pub lookup_misses: u64,
    /// Aborts caused by a transform fault.
    pub faults: u64,
}

impl StatsSnapshot {
    /// Returns the number of contexts still registered at snapshot time.
    pub fn live_contexts(&self) -> u64 {
        self.registrations.saturating_sub(self.unregistrations)
    }
}
