//! Test fixtures and bridge helpers.
//!
//! Provides a ready-wired registry, manager and native engine, plus helpers
//! for the small CBOR documents most scenarios operate on.

use crate::native::{CommitOutcome, NativeCommitLoop};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use txbridge_core::{
    BridgeConfig, BridgeError, BridgeResult, CallbackRegistry, Connection, SnapshotView,
    TransactionManager, TransactionOptions, TransactionResult,
};

/// A document with a single string field, stored as CBOR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDocument {
    /// The field transforms read and rewrite.
    pub field: String,
    /// Incremented by counting transforms.
    #[serde(default)]
    pub revision: u64,
}

impl FieldDocument {
    /// Creates a document at revision 0.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            revision: 0,
        }
    }

    /// Encodes the document as CBOR.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes).expect("Failed to encode field document");
        bytes
    }

    /// Decodes a CBOR document.
    pub fn from_bytes(bytes: &[u8]) -> BridgeResult<Self> {
        ciborium::de::from_reader(bytes).map_err(BridgeError::codec)
    }
}

/// Encodes `{ field: value, revision: 0 }` as CBOR.
pub fn field_document_bytes(value: &str) -> Vec<u8> {
    FieldDocument::new(value).to_bytes()
}

/// A transform that sets the document field to `value` and commits.
pub fn set_field(
    value: impl Into<String>,
) -> impl Fn(&SnapshotView) -> BridgeResult<TransactionResult> + Send + Sync + 'static {
    let value = value.into();
    move |snapshot: &SnapshotView| {
        let mut document: FieldDocument = snapshot.decode()?;
        document.field.clone_from(&value);
        snapshot.encode(&document)?;
        Ok(TransactionResult::Success)
    }
}

/// A transform that bumps the document revision and commits.
pub fn bump_revision(
) -> impl Fn(&SnapshotView) -> BridgeResult<TransactionResult> + Send + Sync + 'static {
    |snapshot: &SnapshotView| {
        let mut document: FieldDocument = snapshot.decode()?;
        document.revision += 1;
        snapshot.encode(&document)?;
        Ok(TransactionResult::Success)
    }
}

/// A transform that scribbles over the value and then aborts.
pub fn scribble_and_abort(
) -> impl Fn(&SnapshotView) -> BridgeResult<TransactionResult> + Send + Sync + 'static {
    |snapshot: &SnapshotView| {
        snapshot.write(b"scribbled")?;
        Ok(TransactionResult::Abort)
    }
}

/// A registry, a connection manager and a native engine wired together.
pub struct TestBridge {
    /// The registry shared by the manager and the engine.
    pub registry: Arc<CallbackRegistry>,
    /// Transaction manager for the test connection.
    pub manager: TransactionManager,
    /// The simulated native side.
    pub engine: NativeCommitLoop,
}

impl TestBridge {
    /// Creates a bridge whose engine holds `initial`.
    pub fn new(initial: impl Into<Vec<u8>>) -> Self {
        Self::with_config(BridgeConfig::default(), initial)
    }

    /// Creates a bridge with a custom registry configuration.
    pub fn with_config(config: BridgeConfig, initial: impl Into<Vec<u8>>) -> Self {
        let registry = Arc::new(CallbackRegistry::with_config(config));
        let manager = TransactionManager::new(Arc::clone(&registry), Connection::new("test"));
        let engine = NativeCommitLoop::new(Arc::clone(&registry), initial);
        Self {
            registry,
            manager,
            engine,
        }
    }

    /// Runs `transform` with default options until it commits or stops.
    pub fn run<F>(&self, transform: F) -> BridgeResult<CommitOutcome>
    where
        F: Fn(&SnapshotView) -> BridgeResult<TransactionResult> + Send + Sync + 'static,
    {
        self.engine
            .run_transaction(&self.manager, transform, TransactionOptions::default())
    }

    /// Decodes the committed value as a [`FieldDocument`].
    pub fn committed_document(&self) -> FieldDocument {
        FieldDocument::from_bytes(&self.engine.committed())
            .expect("Committed value is not a field document")
    }

    /// Returns the committed document field.
    pub fn committed_field(&self) -> String {
        self.committed_document().field
    }
}

impl Drop for TestBridge {
    fn drop(&mut self) {
        self.manager.dispose();
    }
}

/// Runs a test with a fresh [`TestBridge`].
///
/// # Example
///
/// ```rust
/// use txbridge_testkit::{field_document_bytes, set_field, with_test_bridge};
///
/// with_test_bridge(field_document_bytes("A"), |bridge| {
///     bridge.run(set_field("B")).unwrap();
///     assert_eq!(bridge.committed_field(), "B");
/// });
/// ```
pub fn with_test_bridge<F, R>(initial: impl Into<Vec<u8>>, f: F) -> R
where
    F: FnOnce(&TestBridge) -> R,
{
    let bridge = TestBridge::new(initial);
    f(&bridge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_document_encoding() {
        let doc = FieldDocument::new("A");
        let decoded = FieldDocument::from_bytes(&doc.to_bytes()).unwrap();
        assert_eq!(decoded, doc);
        assert!(FieldDocument::from_bytes(b"\xff\x00").is_err());
    }

    #[test]
    fn bridge_runs_transforms() {
        with_test_bridge(field_document_bytes("A"), |bridge| {
            assert!(bridge.run(set_field("B")).unwrap().is_committed());
            assert!(bridge.run(bump_revision()).unwrap().is_committed());

            let doc = bridge.committed_document();
            assert_eq!(doc.field, "B");
            assert_eq!(doc.revision, 1);
            assert!(bridge.registry.is_empty());
        });
    }

    #[test]
    fn scribble_is_discarded() {
        with_test_bridge(field_document_bytes("A"), |bridge| {
            let outcome = bridge.run(scribble_and_abort()).unwrap();
            assert_eq!(outcome, CommitOutcome::Aborted { attempts: 1 });
            assert_eq!(bridge.committed_field(), "A");
        });
    }

    #[test]
    fn drop_disposes_manager() {
        let registry = {
            let bridge = TestBridge::new(field_document_bytes("A"));
            bridge
                .manager
                .start(set_field("B"), TransactionOptions::default())
                .unwrap();
            assert_eq!(bridge.registry.len(), 1);
            Arc::clone(&bridge.registry)
        };
        assert!(registry.is_empty());
    }
}
