//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use crate::fixtures::FieldDocument;
use proptest::prelude::*;
use txbridge_core::{TransactionHandle, TransactionOptions};

/// Strategy for generating arbitrary non-reserved handles.
pub fn handle_strategy() -> impl Strategy<Value = TransactionHandle> {
    (1u64..=u64::MAX).prop_map(TransactionHandle::new)
}

/// Strategy for generating raw snapshot payloads.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Strategy for generating document field values.
pub fn field_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 _-]{0,64}").expect("Invalid regex")
}

/// Strategy for generating field documents.
pub fn field_document_strategy() -> impl Strategy<Value = FieldDocument> {
    (field_value_strategy(), 0u64..1_000).prop_map(|(field, revision)| FieldDocument {
        field,
        revision,
    })
}

/// Strategy for generating valid transaction options.
pub fn transaction_options_strategy() -> impl Strategy<Value = TransactionOptions> {
    (1u32..=10).prop_map(TransactionOptions::new)
}

/// Strategy for generating a number of injected conflicts.
pub fn conflict_count_strategy() -> impl Strategy<Value = u32> {
    0u32..8
}

/// Strategy for generating a batch of register/unregister operations.
///
/// `true` registers a new context, `false` unregisters the oldest live one.
pub fn registry_ops_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..128)
}
