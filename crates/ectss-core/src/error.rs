//! Error types for threshold signing operations

use crate::types::PartyId;
use thiserror::Error;

/// Result type alias for threshold signing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during key generation and signing
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid curve, protocol or round configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A point failed the curve-membership check
    #[error("Point is not on the curve")]
    InvalidPoint,

    /// Scalar multiplication with a factor outside (0, n)
    #[error("Scalar is outside the range (0, n)")]
    ScalarOutOfRange,

    /// A secret share did not match the dealer's commitment
    #[error("Share from dealer {dealer} to recipient {recipient} failed verification")]
    ShareVerificationFailure { dealer: PartyId, recipient: PartyId },

    /// A partial signature failed per-signer verification
    #[error("Invalid partial signature from signer {0}")]
    InvalidPartialSignature(PartyId),

    /// r or s of a signature reduced to zero
    #[error("Degenerate signature: r or s is zero")]
    DegenerateSignature,

    /// Malformed signer-id input to a Lagrange computation
    #[error("Degenerate signer id set: {0}")]
    DegenerateIdSet(String),

    /// Fewer than the required contributions arrived within the round deadline
    #[error("Round timed out: collected {collected} of {required} contributions")]
    RoundTimeout { collected: usize, required: usize },

    /// Threshold requirements not met
    #[error("Threshold not met: required {required}, got {actual}")]
    ThresholdNotMet { required: usize, actual: usize },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
