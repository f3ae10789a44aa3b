//! Bridge configuration.

use crate::error::{BridgeError, BridgeResult};

/// Configuration for a callback registry.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// First handle value handed out by `register`. Must be non-zero.
    pub first_handle: u64,

    /// Whether transform faults are logged at `warn` level.
    pub log_faults: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            first_handle: 1,
            log_faults: true,
        }
    }
}

impl BridgeConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the first handle value. `0` is bumped to `1`.
    #[must_use]
    pub const fn first_handle(mut self, value: u64) -> Self {
        self.first_handle = if value == 0 { 1 } else { value };
        self
    }

    /// Sets whether transform faults are logged.
    #[must_use]
    pub const fn log_faults(mut self, value: bool) -> Self {
        self.log_faults = value;
        self
    }
}

/// Per-transaction options supplied at start time.
///
/// The bridge never retries on its own; these are carried on the context for
/// the native commit loop to honor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Maximum number of attempts the native loop may make.
    pub max_attempts: u32,
}

impl TransactionOptions {
    /// Default number of attempts.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Creates options with the given attempt limit.
    #[must_use]
    pub const fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Checks that the options are usable.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.max_attempts == 0 {
            return Err(BridgeError::invalid_argument(
                "max_attempts must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}
