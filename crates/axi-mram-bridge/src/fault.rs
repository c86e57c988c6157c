//! Sticky fault record for out-of-band diagnosis.

use serde::Serialize;
use thiserror::Error;

/// Why a transaction was failed. Discriminants are the 4-bit debug codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[repr(u8)]
pub enum FaultCause {
    #[error("read burst longer than the prefetch buffer")]
    BurstTooLong = 1,
    #[error("prefetch buffer overflow")]
    FifoOverflow = 2,
    #[error("prefetch buffer underflow")]
    FifoUnderflow = 3,
    #[error("device stayed busy past the timeout budget")]
    Timeout = 4,
}

impl FaultCause {
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Fault flag plus cause code.
///
/// Raising is sticky: only `clear` (driven by the global reset) drops the
/// flag. A later raise replaces the cause, so when both controllers fault on
/// one edge the one evaluated last is what gets reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    cause: Option<FaultCause>,
    raised: u32,
}

impl FaultRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, cause: FaultCause) {
        tracing::warn!(code = cause.code(), "fault latched: {cause}");
        self.cause = Some(cause);
        self.raised = self.raised.saturating_add(1);
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cause.is_some()
    }

    #[must_use]
    pub fn cause(&self) -> Option<FaultCause> {
        self.cause
    }

    /// 4-bit debug code, zero when no fault is latched.
    #[must_use]
    pub fn code(&self) -> u8 {
        self.cause.map_or(0, FaultCause::code)
    }

    /// Faults latched since the last reset.
    #[must_use]
    pub fn raised(&self) -> u32 {
        self.raised
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_debug_encoding() {
        assert_eq!(FaultCause::BurstTooLong.code(), 1);
        assert_eq!(FaultCause::FifoOverflow.code(), 2);
        assert_eq!(FaultCause::FifoUnderflow.code(), 3);
        assert_eq!(FaultCause::Timeout.code(), 4);
    }

    #[test]
    fn record_is_sticky_and_last_writer_wins() {
        let mut record = FaultRecord::new();
        assert!(!record.is_active());
        assert_eq!(record.code(), 0);

        record.raise(FaultCause::Timeout);
        record.raise(FaultCause::BurstTooLong);
        assert!(record.is_active());
        assert_eq!(record.cause(), Some(FaultCause::BurstTooLong));
        assert_eq!(record.raised(), 2);

        record.clear();
        assert_eq!(record, FaultRecord::new());
    }
}
