//! Per-connection transaction manager.

use crate::config::TransactionOptions;
use crate::connection::Connection;
use crate::context::{TransactionContext, Transform};
use crate::error::{BridgeError, BridgeResult};
use crate::registry::CallbackRegistry;
use crate::result::TransactionResult;
use crate::snapshot::SnapshotView;
use crate::types::TransactionHandle;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Starts and disposes transactions on behalf of one connection.
///
/// Disposal is always explicit. Dropping a manager without calling
/// [`TransactionManager::dispose`] leaves its transactions registered.
pub struct TransactionManager {
    registry: Arc<CallbackRegistry>,
    connection: Arc<Connection>,
    state: Mutex<ManagerState>,
}

#[derive(Default)]
struct ManagerState {
    disposed: bool,
    handles: HashSet<TransactionHandle>,
}

impl TransactionManager {
    /// Creates a manager that registers into `registry`.
    pub fn new(registry: Arc<CallbackRegistry>, connection: Arc<Connection>) -> Self {
        Self {
            registry,
            connection,
            state: Mutex::new(ManagerState::default()),
        }
    }

    /// Starts a transaction with a closure transform.
    ///
    /// Returns the handle the native commit loop must pass to the trampoline.
    pub fn start<F>(&self, transform: F, options: TransactionOptions) -> BridgeResult<TransactionHandle>
    where
        F: Fn(&SnapshotView) -> BridgeResult<TransactionResult> + Send + Sync + 'static,
    {
        self.start_boxed(Box::new(transform), options)
    }

    /// Starts a transaction with a boxed [`Transform`].
    pub fn start_boxed(
        &self,
        transform: Box<dyn Transform>,
        options: TransactionOptions,
    ) -> BridgeResult<TransactionHandle> {
        options.validate()?;

        let mut state = self.state.lock();
        let rejection = if state.disposed {
            Some(BridgeError::Disposed)
        } else if self.connection.is_closed() {
            Some(BridgeError::ConnectionClosed)
        } else {
            None
        };
        if let Some(error) = rejection {
            // The rejected transform may run arbitrary `Drop` code.
            drop(state);
            drop(transform);
            return Err(error);
        }

        let context =
            TransactionContext::from_boxed(transform, Arc::clone(&self.connection), options);
        let handle = self.registry.register(context);
        state.handles.insert(handle);
        Ok(handle)
    }

    /// Disposes one transaction started by this manager.
    ///
    /// Idempotent. Returns false if the handle was not (or no longer) owned by
    /// this manager.
    pub fn dispose_transaction(&self, handle: TransactionHandle) -> bool {
        let owned = self.state.lock().handles.remove(&handle);
        if owned {
            self.registry.unregister(handle);
        }
        owned
    }

    /// Disposes every transaction started by this manager and refuses new
    /// ones.
    ///
    /// Invocations already running keep their context until they return;
    /// later invocations for these handles abort via the lookup-miss path.
    /// Safe to call more than once.
    pub fn dispose(&self) {
        let handles: Vec<TransactionHandle> = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.handles.drain().collect()
        };

        for handle in &handles {
            self.registry.unregister(*handle);
        }

        info!(
            connection = %self.connection.id(),
            disposed = handles.len(),
            "transaction manager disposed"
        );
    }

    /// Returns true once `dispose` has been called.
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Returns the number of transactions started and not yet disposed.
    pub fn in_flight(&self) -> usize {
        self.state.lock().handles.len()
    }

    /// Returns the owning connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Returns the registry transactions are registered into.
    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TransactionManager")
            .field("connection", &self.connection.id())
            .field("disposed", &state.disposed)
            .field("in_flight", &state.handles.len())
            .finish()
    }
}

impl Drop for ManagerState {
    fn drop(&mut self) {
        if !self.disposed && !self.handles.is_empty() {
            debug!(
                leaked = self.handles.len(),
                "transaction manager dropped without dispose"
            );
        }
    }
}
