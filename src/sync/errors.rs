//! Sync Error Types
//!
//! Transport and apply failures are retryable with backoff. Verification
//! failures are a trust incident: they also retry, but are surfaced
//! distinctly so operators can tell them apart from network noise.

use std::fmt;

/// Sync error type
#[derive(Debug, Clone)]
pub struct SyncError {
    /// Error kind
    pub kind: SyncErrorKind,
    /// Error message
    pub message: String,
}

/// Sync error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorKind {
    /// Network or timeout failure talking to the source
    Transport,

    /// Changeset signature did not verify
    Verification,

    /// Verified changeset failed to apply locally
    Apply,

    /// Cursor or key state could not be persisted/loaded
    Storage,

    /// Invalid sync configuration
    Configuration,
}

impl SyncError {
    /// Create a new sync error.
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Transport, message)
    }

    /// Create a verification error.
    pub fn verification(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Verification, message)
    }

    /// Create an apply error.
    pub fn apply(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Apply, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Storage, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Configuration, message)
    }

    /// Check if this is a verification failure (data-trust incident).
    pub fn is_verification(&self) -> bool {
        self.kind == SyncErrorKind::Verification
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyncError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for SyncError {}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_is_distinguished() {
        assert!(SyncError::verification("bad signature").is_verification());
        assert!(!SyncError::transport("timeout").is_verification());
        assert!(!SyncError::apply("constraint").is_verification());
    }
}
