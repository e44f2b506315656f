//! Integrity Error Types
//!
//! A verification failure never mutates state; callers decide whether the
//! condition is retryable (unknown key id after a rotation) or a trust
//! incident (digest or signature mismatch).

use std::fmt;

/// Integrity error type
#[derive(Debug, Clone)]
pub struct IntegrityError {
    /// Error kind
    pub kind: IntegrityErrorKind,
    /// Error message
    pub message: String,
}

/// Integrity error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityErrorKind {
    /// Key material could not be decoded
    MalformedKey,

    /// No public key installed for the signature's key id
    UnknownKeyId,

    /// Signature declares an algorithm this build does not support
    UnsupportedAlgorithm,

    /// Recomputed digest does not match the signed digest
    DigestMismatch,

    /// Signature bytes are malformed or do not verify
    BadSignature,

    /// Payload timestamp is outside the freshness window
    StalePayload,
}

impl IntegrityError {
    /// Create a new integrity error.
    pub fn new(kind: IntegrityErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a malformed key error.
    pub fn malformed_key(message: impl Into<String>) -> Self {
        Self::new(IntegrityErrorKind::MalformedKey, message)
    }

    /// Create an unknown key id error.
    pub fn unknown_key_id(key_id: &str) -> Self {
        Self::new(
            IntegrityErrorKind::UnknownKeyId,
            format!("No public key installed for key id {}", key_id),
        )
    }

    /// Create an unsupported algorithm error.
    pub fn unsupported_algorithm(algorithm: &str) -> Self {
        Self::new(
            IntegrityErrorKind::UnsupportedAlgorithm,
            format!("Unsupported signature algorithm {}", algorithm),
        )
    }

    /// Create a digest mismatch error.
    pub fn digest_mismatch(message: impl Into<String>) -> Self {
        Self::new(IntegrityErrorKind::DigestMismatch, message)
    }

    /// Create a bad signature error.
    pub fn bad_signature(message: impl Into<String>) -> Self {
        Self::new(IntegrityErrorKind::BadSignature, message)
    }

    /// Create a stale payload error.
    pub fn stale_payload(message: impl Into<String>) -> Self {
        Self::new(IntegrityErrorKind::StalePayload, message)
    }

    /// Check if this error may resolve after a public-key refresh.
    pub fn is_unknown_key(&self) -> bool {
        self.kind == IntegrityErrorKind::UnknownKeyId
    }
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntegrityError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for IntegrityError {}

/// Result type for integrity operations
pub type IntegrityResult<T> = Result<T, IntegrityError>;
