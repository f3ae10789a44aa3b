//! Churn command implementation.

use std::sync::Arc;
use tracing::info;
use txbridge_core::CallbackRegistry;
use txbridge_testkit::{stress_registry_churn, StressConfig};

/// Runs the churn command.
pub fn run(
    threads: usize,
    operations: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if threads == 0 {
        return Err("at least one thread is required".into());
    }

    let config = StressConfig {
        threads,
        transactions_per_thread: operations,
        ..StressConfig::default()
    };
    info!(threads, operations, "starting registry churn");

    let registry = Arc::new(CallbackRegistry::new());
    let result = stress_registry_churn(registry, &config);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            result.print_summary("Registry churn");
        }
    }

    Ok(())
}
