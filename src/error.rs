//! Error types for the tierstake engine.
//!
//! Every failure the engine can report is a variant of [`Error`]. Variants are
//! grouped into the four categories callers act on (see [`ErrorCategory`]):
//! validation errors are fixed by correcting input, precondition errors clear
//! up with time, integration errors come from external collaborators, and
//! authorization errors are rejected before anything else is checked.

use thiserror::Error;

/// Result type alias for tierstake operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad input; rejected before any mutation
    Validation,
    /// Transient condition (lock, oracle, coverage); retry later
    Precondition,
    /// External transfer/mint/burn/feed failure
    Integration,
    /// Caller lacks the capability for this action
    Authorization,
    /// Configuration, persistence or internal failure
    Internal,
}

/// Main error type for the tierstake engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Amount is zero or otherwise unusable
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Owner already holds an open position
    #[error("Position already open for {0}")]
    DuplicatePosition(String),

    /// Owner holds no open position
    #[error("No open position for {0}")]
    NoPosition(String),

    /// Early exit requested after the lock expired
    #[error("Position unlocked at {unlock_time}; use convert instead")]
    UseConvertInstead {
        /// Unlock timestamp of the position
        unlock_time: u64,
    },

    /// Caller credit in the treasury is too small
    #[error("Insufficient credit: required {required}, available {available}")]
    InsufficientCredit {
        /// Requested amount
        required: u64,
        /// Credit held by the caller
        available: u64,
    },

    /// Requested fee withdrawal exceeds accrued fees
    #[error("Insufficient fees: required {required}, available {available}")]
    InsufficientFees {
        /// Requested amount
        required: u64,
        /// Accrued fees
        available: u64,
    },

    /// Unrecognized tier name
    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    /// Receipt units cannot be moved between holders
    #[error("Receipt units are non-transferable")]
    NonTransferable,

    // ═══════════════════════════════════════════════════════════════════
    // Precondition Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Position is still inside its lock window
    #[error("Position locked for another {remaining_secs}s")]
    Locked {
        /// Seconds until unlock
        remaining_secs: u64,
    },

    /// Reserve attestation is stale or unhealthy
    #[error("Reserve oracle stale: last update {age_secs}s ago, max allowed {max_age_secs}s")]
    OracleStale {
        /// Age of the last attestation in seconds
        age_secs: u64,
        /// Configured staleness threshold
        max_age_secs: u64,
    },

    /// Attested reserves do not cover the next issued unit
    #[error("Insufficient coverage: ratio {ratio_bps}bps below required {required_bps}bps")]
    InsufficientCoverage {
        /// Coverage ratio including the unit about to be minted
        ratio_bps: u64,
        /// Configured minimum coverage
        required_bps: u64,
    },

    /// Custody cannot fund the outgoing transfer
    #[error("Insufficient liquidity: required {required}, available {available}")]
    InsufficientLiquidity {
        /// Requested amount
        required: u64,
        /// Value available in custody
        available: u64,
    },

    /// Pooled yield cannot pay the computed yield
    #[error("Insufficient yield pool: required {required}, available {available}")]
    InsufficientYieldPool {
        /// Computed yield
        required: u64,
        /// Pooled yield balance
        available: u64,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Integration Errors
    // ═══════════════════════════════════════════════════════════════════

    /// External value transfer failed
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// External mint failed
    #[error("Mint failed: {0}")]
    MintFailed(String),

    /// External burn failed
    #[error("Burn failed: {0}")]
    BurnFailed(String),

    /// Reserve feed could not be read
    #[error("Oracle read failed: {0}")]
    OracleReadFailed(String),

    // ═══════════════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Not authorized to perform this action
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    // ═══════════════════════════════════════════════════════════════════
    // Parameter Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Parameter outside its hard bounds
    #[error("Parameter {name}={value} outside bounds [{min}, {max}]")]
    ParameterOutOfBounds {
        /// Parameter name
        name: String,
        /// Rejected value
        value: u64,
        /// Inclusive lower bound
        min: u64,
        /// Inclusive upper bound
        max: u64,
    },

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Ledger invariant violated
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Lock acquisition failed
    #[error("Failed to acquire lock")]
    Lock,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Classify the error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidAmount(_)
            | Error::DuplicatePosition(_)
            | Error::NoPosition(_)
            | Error::UseConvertInstead { .. }
            | Error::InsufficientCredit { .. }
            | Error::InsufficientFees { .. }
            | Error::UnknownTier(_)
            | Error::NonTransferable
            | Error::InvalidParameter { .. }
            | Error::ParameterOutOfBounds { .. } => ErrorCategory::Validation,

            Error::Locked { .. }
            | Error::OracleStale { .. }
            | Error::InsufficientCoverage { .. }
            | Error::InsufficientLiquidity { .. }
            | Error::InsufficientYieldPool { .. } => ErrorCategory::Precondition,

            Error::TransferFailed(_)
            | Error::MintFailed(_)
            | Error::BurnFailed(_)
            | Error::OracleReadFailed(_) => ErrorCategory::Integration,

            Error::Unauthorized(_) => ErrorCategory::Authorization,

            Error::Overflow { .. }
            | Error::Underflow { .. }
            | Error::Serialization(_)
            | Error::Deserialization(_)
            | Error::InvariantViolation(_)
            | Error::Config(_)
            | Error::Internal(_)
            | Error::Lock
            | Error::Storage(_) => ErrorCategory::Internal,
        }
    }

    /// Returns true if retrying the same call later may succeed
    pub fn is_recoverable(&self) -> bool {
        self.category() == ErrorCategory::Precondition
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_)
                | Error::Internal(_)
                | Error::Overflow { .. }
                | Error::Underflow { .. }
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Validation errors: 1xxx
            Error::InvalidAmount(_) => 1001,
            Error::DuplicatePosition(_) => 1002,
            Error::NoPosition(_) => 1003,
            Error::UseConvertInstead { .. } => 1004,
            Error::InsufficientCredit { .. } => 1005,
            Error::InsufficientFees { .. } => 1006,
            Error::UnknownTier(_) => 1007,
            Error::NonTransferable => 1008,

            // Precondition errors: 2xxx
            Error::Locked { .. } => 2001,
            Error::OracleStale { .. } => 2002,
            Error::InsufficientCoverage { .. } => 2003,
            Error::InsufficientLiquidity { .. } => 2004,
            Error::InsufficientYieldPool { .. } => 2005,

            // Integration errors: 3xxx
            Error::TransferFailed(_) => 3001,
            Error::MintFailed(_) => 3002,
            Error::BurnFailed(_) => 3003,
            Error::OracleReadFailed(_) => 3004,

            // Authorization errors: 4xxx
            Error::Unauthorized(_) => 4001,

            // Parameter errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::ParameterOutOfBounds { .. } => 5002,
            Error::Overflow { .. } => 5003,
            Error::Underflow { .. } => 5004,

            // Serialization errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,

            // Internal errors: 9xxx
            Error::InvariantViolation(_) => 9001,
            Error::Config(_) => 9002,
            Error::Internal(_) => 9003,
            Error::Lock => 9004,
            Error::Storage(_) => 9005,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::InvalidAmount("".into()).code(),
            Error::DuplicatePosition("".into()).code(),
            Error::NoPosition("".into()).code(),
            Error::Locked { remaining_secs: 0 }.code(),
            Error::OracleStale { age_secs: 0, max_age_secs: 0 }.code(),
            Error::InsufficientCoverage { ratio_bps: 0, required_bps: 0 }.code(),
            Error::TransferFailed("".into()).code(),
            Error::MintFailed("".into()).code(),
            Error::BurnFailed("".into()).code(),
            Error::Unauthorized("".into()).code(),
            Error::Internal("".into()).code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientCoverage {
            ratio_bps: 10000,
            required_bps: 12500,
        };
        assert!(err.to_string().contains("10000"));
        assert!(err.to_string().contains("12500"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(Error::NoPosition("a".into()).category(), ErrorCategory::Validation);
        assert_eq!(Error::Locked { remaining_secs: 5 }.category(), ErrorCategory::Precondition);
        assert_eq!(Error::MintFailed("x".into()).category(), ErrorCategory::Integration);
        assert_eq!(Error::Unauthorized("x".into()).category(), ErrorCategory::Authorization);
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::OracleStale { age_secs: 7200, max_age_secs: 3600 }.is_recoverable());
        assert!(!Error::DuplicatePosition("a".into()).is_recoverable());
        assert!(!Error::TransferFailed("x".into()).is_recoverable());
    }

    #[test]
    fn test_is_critical() {
        assert!(Error::InvariantViolation("test".into()).is_critical());
        assert!(Error::Overflow { operation: "test".into() }.is_critical());
        assert!(!Error::NoPosition("test".into()).is_critical());
    }
}
