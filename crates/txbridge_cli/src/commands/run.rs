//! Run command implementation.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use txbridge_core::{
    BridgeResult, SnapshotView, StatsSnapshot, TransactionOptions, TransactionResult,
};
use txbridge_testkit::{field_document_bytes, CommitOutcome, FieldDocument, TestBridge};

/// Parameters of a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Initial field value held by the engine.
    pub initial: String,
    /// Field value the transform writes.
    pub value: String,
    /// Conflicts injected before the first commit.
    pub conflicts: u32,
    /// Attempt limit.
    pub max_attempts: u32,
    /// Whether the transform aborts instead of writing.
    pub abort: bool,
}

/// Result of a single run.
#[derive(Debug, Serialize)]
pub struct RunResult {
    /// `committed`, `aborted` or `exhausted`.
    pub outcome: &'static str,
    /// Attempts made by the native loop.
    pub attempts: u32,
    /// Field value each attempt's snapshot started from.
    pub seen: Vec<String>,
    /// Committed field value after the run.
    pub committed_field: String,
    /// Committed revision after the run.
    pub committed_revision: u64,
    /// Committed version after the run.
    pub version: u64,
    /// Registry counters.
    pub stats: StatsSnapshot,
}

/// Runs the run command.
pub fn run(options: &RunOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bridge = TestBridge::new(field_document_bytes(&options.initial));
    for i in 0..options.conflicts {
        let competing = FieldDocument::new(format!("{}#{}", options.initial, i + 1));
        bridge.engine.inject_competing_write(competing.to_bytes());
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let value = options.value.clone();
    let abort = options.abort;

    let transform = move |snapshot: &SnapshotView| -> BridgeResult<TransactionResult> {
        let mut doc: FieldDocument = snapshot.decode()?;
        recorder.lock().push(doc.field.clone());
        if abort {
            return Ok(TransactionResult::Abort);
        }
        doc.field.clone_from(&value);
        doc.revision += 1;
        snapshot.encode(&doc)?;
        Ok(TransactionResult::Success)
    };

    let outcome = bridge.engine.run_transaction(
        &bridge.manager,
        transform,
        TransactionOptions::new(options.max_attempts),
    )?;

    let committed = bridge.committed_document();
    let result = RunResult {
        outcome: match outcome {
            CommitOutcome::Committed { .. } => "committed",
            CommitOutcome::Aborted { .. } => "aborted",
            CommitOutcome::Exhausted { .. } => "exhausted",
        },
        attempts: outcome.attempts(),
        seen: seen.lock().clone(),
        committed_field: committed.field,
        committed_revision: committed.revision,
        version: bridge.engine.version(),
        stats: bridge.registry.stats().snapshot(),
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    Ok(())
}

fn print_text_output(result: &RunResult) {
    println!("Outcome: {} after {} attempt(s)", result.outcome, result.attempts);
    for (i, field) in result.seen.iter().enumerate() {
        println!("  attempt {}: snapshot field = {:?}", i + 1, field);
    }
    println!(
        "Committed: field = {:?}, revision = {}, version = {}",
        result.committed_field, result.committed_revision, result.version
    );
    println!(
        "Invocations: {} (successes: {}, aborts: {}, faults: {})",
        result.stats.invocations, result.stats.successes, result.stats.aborts, result.stats.faults
    );
}
