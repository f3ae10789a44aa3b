//! # txbridge Core
//!
//! Cross-runtime transaction callback bridge.
//!
//! A native commit engine runs the optimistic retry-until-commit loop, while the
//! read-modify-write transform lives in another runtime. Native callback ABIs
//! cannot carry closures, so every in-flight transaction is identified by an
//! integer handle and resolved through a shared registry on each invocation.
//!
//! This crate provides:
//! - `CallbackRegistry`: lock-guarded handle → context table
//! - `TransactionContext`: the transform plus a keep-alive reference to its connection
//! - `SnapshotView`: call-scoped, non-owning view over native transient data
//! - `TransactionResult` / `TransactionSignal`: transform outcome and its boundary form
//! - `trampoline`: the single dispatch entry point used by the native loop
//! - `TransactionManager`: per-connection start/dispose front door
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use txbridge_core::{
//!     trampoline, CallbackRegistry, Connection, RawSnapshot, TransactionManager,
//!     TransactionOptions, TransactionResult, TransactionSignal,
//! };
//!
//! let registry = Arc::new(CallbackRegistry::new());
//! let manager = TransactionManager::new(Arc::clone(&registry), Connection::new("docs"));
//!
//! let handle = manager
//!     .start(
//!         |snapshot: &txbridge_core::SnapshotView| {
//!             snapshot.write(b"updated")?;
//!             Ok(TransactionResult::Success)
//!         },
//!         TransactionOptions::default(),
//!     )
//!     .unwrap();
//!
//! // Native side: owns the buffer and the raw snapshot descriptor.
//! let mut buffer = vec![0u8; 32];
//! let mut raw = RawSnapshot::from_buffer(&mut buffer, 0);
//! let signal = unsafe { trampoline::invoke(&registry, handle, &mut raw) };
//!
//! assert_eq!(signal, TransactionSignal::Success);
//! assert_eq!(&buffer[..raw.len], b"updated");
//!
//! manager.dispose();
//! ```

#![warn(missing_docs)]

mod config;
mod connection;
mod context;
mod error;
mod manager;
mod registry;
mod result;
mod snapshot;
mod stats;
pub mod trampoline;
mod types;

pub use config::{BridgeConfig, TransactionOptions};
pub use connection::Connection;
pub use context::{TransactionContext, Transform};
pub use error::{BridgeError, BridgeResult};
pub use manager::TransactionManager;
pub use registry::CallbackRegistry;
pub use result::{TransactionResult, TransactionSignal};
pub use snapshot::{RawSnapshot, SnapshotView};
pub use stats::{BridgeStats, StatsSnapshot};
pub use trampoline::InvocationOutcome;
pub use types::{ConnectionId, TransactionHandle};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
