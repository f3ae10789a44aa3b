//! txbridge CLI
//!
//! Command-line tools for exercising the transaction bridge against the
//! simulated native commit engine.
//!
//! # Commands
//!
//! - `run` - Run one field-update transaction and show every attempt
//! - `stress` - Drive concurrent transactions through a shared registry
//! - `churn` - Hammer registry registration and disposal
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// txbridge command-line tools.
#[derive(Parser)]
#[command(name = "txbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one field-update transaction against a simulated engine
    Run {
        /// Initial field value
        #[arg(short, long, default_value = "A")]
        initial: String,

        /// Field value the transform writes
        #[arg(short = 'w', long, default_value = "B")]
        value: String,

        /// Number of commit conflicts to inject
        #[arg(short, long, default_value = "0")]
        conflicts: u32,

        /// Maximum attempts before giving up
        #[arg(short, long, default_value = "5")]
        max_attempts: u32,

        /// Make the transform return Abort
        #[arg(long)]
        abort: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Drive concurrent transactions through one registry
    Stress {
        /// Number of threads, each with its own connection
        #[arg(short, long, default_value = "4")]
        threads: usize,

        /// Transactions per thread
        #[arg(short = 'n', long, default_value = "1000")]
        transactions: usize,

        /// Inject a conflict before every n-th transaction (0 = never)
        #[arg(short, long, default_value = "0")]
        conflict_every: usize,

        /// Maximum attempts per transaction
        #[arg(short, long, default_value = "5")]
        max_attempts: u32,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Hammer register/unregister from many threads
    Churn {
        /// Number of threads
        #[arg(short, long, default_value = "4")]
        threads: usize,

        /// Operations per thread
        #[arg(short = 'n', long, default_value = "10000")]
        operations: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            initial,
            value,
            conflicts,
            max_attempts,
            abort,
            format,
        } => {
            let options = commands::run::RunOptions {
                initial,
                value,
                conflicts,
                max_attempts,
                abort,
            };
            commands::run::run(&options, &format)?;
        }
        Commands::Stress {
            threads,
            transactions,
            conflict_every,
            max_attempts,
            format,
        } => {
            commands::stress::run(threads, transactions, conflict_every, max_attempts, &format)?;
        }
        Commands::Churn {
            threads,
            operations,
            format,
        } => {
            commands::churn::run(threads, operations, &format)?;
        }
        Commands::Version => {
            println!("txbridge CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("txbridge Core v{}", txbridge_core::VERSION);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse_alongside_verbose() {
        let cli = Cli::try_parse_from(["txbridge", "run", "-v", "-w", "X", "-c", "2"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                value, conflicts, ..
            } => {
                assert_eq!(value, "X");
                assert_eq!(conflicts, 2);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn stress_defaults() {
        let cli = Cli::try_parse_from(["txbridge", "stress"]).unwrap();
        match cli.command {
            Commands::Stress {
                threads,
                transactions,
                max_attempts,
                ..
            } => {
                assert_eq!(threads, 4);
                assert_eq!(transactions, 1000);
                assert_eq!(max_attempts, 5);
            }
            _ => panic!("expected stress command"),
        }
    }
}
