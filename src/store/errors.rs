//! Store Error Types

use std::fmt;

/// Store error type
#[derive(Debug, Clone)]
pub struct StoreError {
    /// Error kind
    pub kind: StoreErrorKind,
    /// Error message
    pub message: String,
}

/// Store error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// A record in the batch violates a constraint
    InvalidRecord,
}

impl StoreError {
    /// Create a new store error.
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::InvalidRecord, message)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for StoreError {}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
