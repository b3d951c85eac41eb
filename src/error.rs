//! Error types for the kernel harness.
//!
//! Only setup and resource problems are reported through [`Error`]. Contract
//! violations (an out-of-domain [`KernelKey`](crate::KernelKey), invalid
//! quantization parameters, mismatched slice lengths) panic instead, and
//! output mismatches are counted by the harness rather than returned.

use std::fmt;

use crate::simd::Tier;

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for harness operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Aligned buffer allocation failed
    AllocationFailed,
    /// Input buffer size doesn't match the configuration geometry
    BufferSizeMismatch {
        /// Expected buffer length in elements
        expected: usize,
        /// Actual buffer length in elements
        actual: usize,
    },
    /// A tier was requested that this build cannot execute on this machine
    UnsupportedTier(Tier),
    /// The requested sweep contains no configurations
    EmptySweep,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AllocationFailed => {
                write!(f, "Aligned buffer allocation failed")
            }
            Error::BufferSizeMismatch { expected, actual } => {
                write!(
                    f,
                    "Buffer size mismatch: expected {}, got {}",
                    expected, actual
                )
            }
            Error::UnsupportedTier(tier) => {
                write!(f, "Unsupported tier: {}", tier.name())
            }
            Error::EmptySweep => {
                write!(f, "Sweep has no configurations")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::AllocationFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = [
            (Error::AllocationFailed, "Aligned buffer allocation failed"),
            (
                Error::BufferSizeMismatch {
                    expected: 1024,
                    actual: 64,
                },
                "Buffer size mismatch: expected 1024, got 64",
            ),
            (Error::UnsupportedTier(Tier::Avx2), "Unsupported tier: avx2"),
            (Error::EmptySweep, "Sweep has no configurations"),
        ];

        for (error, expected_msg) in errors {
            assert_eq!(error.to_string(), expected_msg);
        }
    }

    #[test]
    fn test_from_try_reserve_error() {
        let mut v: Vec<u8> = Vec::new();
        let err = v.try_reserve_exact(usize::MAX).unwrap_err();
        let error: Error = err.into();
        assert_eq!(error, Error::AllocationFailed);
    }

    #[test]
    fn test_error_is_error_trait() {
        let error: &dyn std::error::Error = &Error::EmptySweep;
        let _ = error.to_string();
    }
}
