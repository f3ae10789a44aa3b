//! Stress tests for the bridge.
//!
//! These drive many concurrent transactions through one shared registry.

use crate::fixtures::{bump_revision, FieldDocument};
use crate::native::{CommitOutcome, NativeCommitLoop};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use txbridge_core::{
    CallbackRegistry, Connection, SnapshotView, StatsSnapshot, TransactionContext,
    TransactionManager, TransactionOptions, TransactionResult,
};

/// Result of a stress test run.
#[derive(Debug, Clone, Serialize)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    #[serde(skip)]
    pub duration: Duration,
    /// Total duration in milliseconds.
    pub duration_ms: f64,
    /// Operations per second.
    pub ops_per_second: f64,
    /// Registry counters at the end of the run.
    pub stats: StatsSnapshot,
    /// Whether every engine's final value matched its committed count.
    pub consistent: bool,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            duration_ms: duration.as_secs_f64() * 1_000.0,
            ops_per_second,
            stats: StatsSnapshot::default(),
            consistent: true,
        }
    }

    /// Attaches registry counters.
    #[must_use]
    pub fn with_stats(mut self, stats: StatsSnapshot) -> Self {
        self.stats = stats;
        self
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
        println!(
            "Invocations: {} (aborts: {}, faults: {}, lookup misses: {})",
            self.stats.invocations, self.stats.aborts, self.stats.faults, self.stats.lookup_misses
        );
        println!("Consistent: {}", self.consistent);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads, each with its own connection.
    pub threads: usize,
    /// Transactions run by each thread.
    pub transactions_per_thread: usize,
    /// Inject a conflict before every n-th transaction; 0 disables conflicts.
    pub conflict_every: usize,
    /// Attempt limit per transaction.
    pub max_attempts: u32,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            transactions_per_thread: 1_000,
            conflict_every: 0,
            max_attempts: TransactionOptions::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Runs concurrent transactions through one registry.
///
/// Each thread owns a connection and a native engine holding a
/// [`FieldDocument`], and bumps its revision once per transaction. A
/// transaction counts as successful when it commits.
pub fn stress_concurrent_transactions(
    registry: Arc<CallbackRegistry>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let inconsistent = Arc::new(AtomicUsize::new(0));
    let options = TransactionOptions::new(config.max_attempts.max(1));

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let inconsistent = Arc::clone(&inconsistent);
            let transactions = config.transactions_per_thread;
            let conflict_every = config.conflict_every;

            thread::spawn(move || {
                let manager = TransactionManager::new(
                    Arc::clone(&registry),
                    Connection::new(format!("stress-{t}")),
                );
                let engine =
                    NativeCommitLoop::new(registry, FieldDocument::new(format!("t{t}")).to_bytes());
                let mut committed = 0u64;

                for i in 0..transactions {
                    if conflict_every > 0 && i % conflict_every == 0 {
                        engine.inject_conflict();
                    }

                    match engine.run_transaction(&manager, bump_revision(), options) {
                        Ok(CommitOutcome::Committed { .. }) => {
                            committed += 1;
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        _ => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }

                manager.dispose();

                let revision = FieldDocument::from_bytes(&engine.committed())
                    .map(|doc| doc.revision)
                    .unwrap_or(u64::MAX);
                if revision != committed {
                    inconsistent.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let mut result = StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
    .with_stats(registry.stats().snapshot());
    result.consistent = inconsistent.load(Ordering::Relaxed) == 0;
    result
}

/// Hammers register/unregister from many threads.
///
/// Successful operations are unregisters that found their entry.
pub fn stress_registry_churn(
    registry: Arc<CallbackRegistry>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let operations = config.transactions_per_thread;

            thread::spawn(move || {
                let connection = Connection::new(format!("churn-{t}"));
                for _ in 0..operations {
                    let context = TransactionContext::new(
                        |_: &SnapshotView| Ok(TransactionResult::Success),
                        Arc::clone(&connection),
                        TransactionOptions::default(),
                    );
                    let handle = registry.register(context);
                    if registry.unregister(handle) {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
    .with_stats(registry.stats().snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> StressConfig {
        StressConfig {
            threads: 4,
            transactions_per_thread: 50,
            conflict_every: 0,
            max_attempts: 5,
        }
    }

    #[test]
    fn test_concurrent_transactions() {
        let registry = Arc::new(CallbackRegistry::new());
        let result = stress_concurrent_transactions(Arc::clone(&registry), &small_config());

        assert_eq!(result.total_ops, 200);
        assert_eq!(result.successful_ops, 200);
        assert!(result.consistent);
        assert_eq!(result.stats.invocations, 200);
        assert_eq!(result.stats.live_contexts(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_transactions_with_conflicts() {
        let registry = Arc::new(CallbackRegistry::new());
        let config = StressConfig {
            conflict_every: 5,
            ..small_config()
        };
        let result = stress_concurrent_transactions(registry, &config);

        // One injected conflict costs exactly one extra attempt.
        assert_eq!(result.successful_ops, 200);
        assert_eq!(result.stats.invocations, 200 + 4 * 10);
        assert!(result.consistent);
    }

    #[test]
    fn test_conflicts_exhaust_single_attempt() {
        let registry = Arc::new(CallbackRegistry::new());
        let config = StressConfig {
            conflict_every: 1,
            max_attempts: 1,
            ..small_config()
        };
        let result = stress_concurrent_transactions(registry, &config);

        assert_eq!(result.successful_ops, 0);
        assert_eq!(result.failed_ops, 200);
        assert!(result.consistent);
    }

    #[test]
    fn test_registry_churn() {
        let registry = Arc::new(CallbackRegistry::new());
        let result = stress_registry_churn(Arc::clone(&registry), &small_config());

        assert_eq!(result.successful_ops, 200);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.stats.registrations, 200);
        assert_eq!(result.stats.unregistrations, 200);
        assert!(registry.is_empty());
    }
}
