//! Stress command implementation.

use std::sync::Arc;
use tracing::info;
use txbridge_core::CallbackRegistry;
use txbridge_testkit::{stress_concurrent_transactions, StressConfig};

/// Runs the stress command.
pub fn run(
    threads: usize,
    transactions: usize,
    conflict_every: usize,
    max_attempts: u32,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if threads == 0 {
        return Err("at least one thread is required".into());
    }
    if max_attempts == 0 {
        return Err("max-attempts must be greater than zero".into());
    }

    let config = StressConfig {
        threads,
        transactions_per_thread: transactions,
        conflict_every,
        max_attempts,
    };
    info!(threads, transactions, conflict_every, "starting stress run");

    let registry = Arc::new(CallbackRegistry::new());
    let result = stress_concurrent_transactions(Arc::clone(&registry), &config);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            result.print_summary("Concurrent transactions");
        }
    }

    if !result.consistent {
        return Err("committed values diverged from committed transaction counts".into());
    }
    if !registry.is_empty() {
        return Err(format!("{} contexts still registered after run", registry.len()).into());
    }

    Ok(())
}
