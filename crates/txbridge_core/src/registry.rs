//! Handle → context registry.

use crate::config::BridgeConfig;
use crate::context::TransactionContext;
use crate::stats::BridgeStats;
use crate::types::TransactionHandle;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Lock-guarded table of in-flight transactions.
///
/// The registry is the sole owner of every registered context: nothing on the
/// native side holds a reference, so an entry lives exactly until it is
/// explicitly unregistered. The lock is held only for the map operation
/// itself, never while a transform or a context destructor runs.
pub struct CallbackRegistry {
    config: BridgeConfig,
    state: Mutex<RegistryState>,
    stats: BridgeStats,
}

struct RegistryState {
    next_handle: u64,
    entries: HashMap<TransactionHandle, Arc<TransactionContext>>,
}

static GLOBAL: OnceLock<Arc<CallbackRegistry>> = OnceLock::new();

impl CallbackRegistry {
    /// Creates an empty registry with default configuration.
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    /// Creates an empty registry.
    pub fn with_config(config: BridgeConfig) -> Self {
        let next_handle = config.first_handle.max(1);
        Self {
            config,
            state: Mutex::new(RegistryState {
                next_handle,
                entries: HashMap::new(),
            }),
            stats: BridgeStats::new(),
        }
    }

    /// Returns the process-wide registry used by the C trampoline.
    pub fn global() -> Arc<CallbackRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(CallbackRegistry::new())))
    }

    /// Returns the registry configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Returns the registry statistics.
    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Stores `context` under the next unused handle and returns the handle.
    ///
    /// Handles increase monotonically. After wrap-around, `0` and handles that
    /// are still registered are skipped.
    pub fn register(&self, context: TransactionContext) -> TransactionHandle {
        let context = Arc::new(context);
        let handle = {
            let mut state = self.state.lock();
            let handle = loop {
                let candidate = TransactionHandle::new(state.next_handle);
                state.next_handle = state.next_handle.wrapping_add(1).max(1);
                if !state.entries.contains_key(&candidate) {
                    break candidate;
                }
            };
            context.mark_registered(handle);
            state.entries.insert(handle, Arc::clone(&context));
            handle
        };

        self.stats.record_registration();
        debug!(%handle, connection = %context.connection().id(), "registered transaction");
        handle
    }

    /// Returns the context registered under `handle`, if any.
    pub fn lookup(&self, handle: TransactionHandle) -> Option<Arc<TransactionContext>> {
        self.state.lock().entries.get(&handle).cloned()
    }

    /// Removes the context registered under `handle`.
    ///
    /// Idempotent: returns false if nothing was registered. The removed
    /// context is dropped after the lock is released.
    pub fn unregister(&self, handle: TransactionHandle) -> bool {
        let removed = self.state.lock().entries.remove(&handle);
        match removed {
            Some(context) => {
                context.mark_unregistered();
                self.stats.record_unregistration();
                debug!(%handle, attempts = context.attempts(), "unregistered transaction");
                true
            }
            None => false,
        }
    }

    /// Returns true if `handle` is registered.
    pub fn contains(&self, handle: TransactionHandle) -> bool {
        self.state.lock().entries.contains_key(&handle)
    }

    /// Returns the number of registered contexts.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if no context is registered.
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Returns the registered handles in ascending order.
    pub fn handles(&self) -> Vec<TransactionHandle> {
        let mut handles: Vec<_> = self.state.lock().entries.keys().copied().collect();
        handles.sort_unstable();
        handles
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("config", &self.config)
            .field("registered", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransactionOptions;
    use crate::connection::Connection;
    use crate::result::TransactionResult;
    use crate::snapshot::SnapshotView;
    use std::collections::HashSet;
    use std::thread;

    fn context() -> TransactionContext {
        TransactionContext::new(
            |_: &SnapshotView| Ok(TransactionResult::Success),
            Connection::new("test"),
            TransactionOptions::default(),
        )
    }

    #[test]
    fn unknown_handles_miss() {
        let registry = CallbackRegistry::new();
        assert!(registry.lookup(TransactionHandle::new(1)).is_none());
        assert!(registry.lookup(TransactionHandle::NONE).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn register_lookup_unregister() {
        let registry = CallbackRegistry::new();
        let handle = registry.register(context());
        assert_eq!(handle, TransactionHandle::new(1));

        let ctx = registry.lookup(handle).unwrap();
        assert_eq!(ctx.handle(), Some(handle));
        assert!(ctx.is_registered());

        assert!(registry.unregister(handle));
        assert!(registry.lookup(handle).is_none());
        assert!(!ctx.is_registered());
        assert_eq!(registry.stats().unregistrations(), 1);
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let registry = CallbackRegistry::new();
        assert!(!registry.unregister(TransactionHandle::new(9)));
        assert!(!registry.unregister(TransactionHandle::new(9)));
        assert_eq!(registry.stats().unregistrations(), 0);
    }

    #[test]
    fn handles_are_not_reused() {
        let registry = CallbackRegistry::new();
        let first = registry.register(context());
        registry.unregister(first);
        let second = registry.register(context());
        assert!(second > first);
    }

    #[test]
    fn first_handle_is_configurable() {
        let registry = CallbackRegistry::with_config(BridgeConfig::new().first_handle(500));
        assert_eq!(registry.register(context()), TransactionHandle::new(500));
        assert_eq!(registry.register(context()), TransactionHandle::new(501));
    }

    #[test]
    fn wrap_around_skips_zero_and_live_handles() {
        let registry = CallbackRegistry::with_config(BridgeConfig::new().first_handle(u64::MAX));
        let last = registry.register(context());
        assert_eq!(last, TransactionHandle::new(u64::MAX));

        let wrapped = registry.register(context());
        assert_eq!(wrapped, TransactionHandle::new(1));

        registry.state.lock().next_handle = u64::MAX;
        let skipped = registry.register(context());
        assert_eq!(skipped, TransactionHandle::new(2));
    }

    #[test]
    fn registered_context_keeps_connection_alive() {
        let registry = CallbackRegistry::new();
        let conn = Connection::new("keepalive");
        let weak = Arc::downgrade(&conn);

        let handle = registry.register(TransactionContext::new(
            |_: &SnapshotView| Ok(TransactionResult::Success),
            conn,
            TransactionOptions::default(),
        ));
        assert!(weak.upgrade().is_some());

        registry.unregister(handle);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn concurrent_registration_yields_distinct_handles() {
        let registry = Arc::new(CallbackRegistry::new());
        let mut threads = vec![];

        for _ in 0..8 {
            let r = Arc::clone(&registry);
            threads.push(thread::spawn(move || {
                (0..200).map(|_| r.register(context())).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for t in threads {
            for handle in t.join().unwrap() {
                assert!(seen.insert(handle), "duplicate handle {handle}");
            }
        }

        assert_eq!(seen.len(), 1600);
        assert_eq!(registry.len(), 1600);
        assert_eq!(registry.handles().len(), 1600);
    }

    #[test]
    fn global_registry_is_shared() {
        let a = CallbackRegistry::global();
        let b = CallbackRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
