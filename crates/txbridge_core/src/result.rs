//! Transform outcomes and their boundary representation.

/// Outcome produced by a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionResult {
    /// Commit the snapshot as left by the transform.
    Success,
    /// Do not commit. The native loop retries or gives up per its own policy.
    Abort,
}

impl TransactionResult {
    /// Returns true for `Success`.
    pub fn is_success(self) -> bool {
        self == TransactionResult::Success
    }

    /// Returns true for `Abort`.
    pub fn is_abort(self) -> bool {
        self == TransactionResult::Abort
    }
}

impl From<bool> for TransactionResult {
    fn from(success: bool) -> Self {
        if success {
            TransactionResult::Success
        } else {
            TransactionResult::Abort
        }
    }
}

/// Value returned across the native boundary by the trampoline.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionSignal {
    /// The attempt must not be committed.
    Abort = 0,
    /// The attempt may be committed.
    Success = 1,
}

impl TransactionSignal {
    /// Returns true for `Success`.
    pub fn is_success(self) -> bool {
        self == TransactionSignal::Success
    }
}

impl From<TransactionResult> for TransactionSignal {
    fn from(result: TransactionResult) -> Self {
        match result {
            TransactionResult::Success => TransactionSignal::Success,
            TransactionResult::Abort => TransactionSignal::Abort,
        }
    }
}

impl From<TransactionSignal> for TransactionResult {
    fn from(signal: TransactionSignal) -> Self {
        match signal {
            TransactionSignal::Success => TransactionResult::Success,
            TransactionSignal::Abort => TransactionResult::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_codes() {
        assert_eq!(TransactionSignal::Abort as i32, 0);
        assert_eq!(TransactionSignal::Success as i32, 1);
        assert!(TransactionSignal::Success.is_success());
        assert!(!TransactionSignal::Abort.is_success());
    }

    #[test]
    fn conversions() {
        assert_eq!(TransactionResult::from(true), TransactionResult::Success);
        assert_eq!(TransactionResult::from(false), TransactionResult::Abort);
        assert_eq!(
            TransactionSignal::from(TransactionResult::Abort),
            TransactionSignal::Abort
        );
        assert_eq!(
            TransactionResult::from(TransactionSignal::Success),
            TransactionResult::Success
        );
        assert!(TransactionResult::Abort.is_abort());
    }
}
