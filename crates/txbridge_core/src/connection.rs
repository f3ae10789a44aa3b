//! The owning connection of a transaction.

use crate::types::ConnectionId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Client-side connection to the remote data service.
///
/// Contexts hold an `Arc<Connection>`, so a connection cannot be torn down
/// while any transaction started on it is still registered.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    name: String,
    closed: AtomicBool,
}

impl Connection {
    /// Creates a new open connection.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(),
            name: name.into(),
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the connection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the connection closed. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}
