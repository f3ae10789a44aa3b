//! CLI command implementations.

pub mod churn;
pub mod run;
pub mod stress;
