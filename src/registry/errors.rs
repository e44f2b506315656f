//! Registry Error Types

use thiserror::Error;
use uuid::Uuid;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry and discovery errors
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Another instance already registered this url
    #[error("Instance url already registered: {0}")]
    DuplicateUrl(String),

    /// No instance with this id
    #[error("Instance not found: {0}")]
    InstanceNotFound(Uuid),

    /// The url failed validation at registration
    #[error("Invalid instance url: {0}")]
    InvalidUrl(String),

    /// Registry snapshot could not be read or written
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Invalid registry configuration
    #[error("Invalid registry configuration: {0}")]
    InvalidConfiguration(String),
}

impl RegistryError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            RegistryError::InvalidUrl(_) => 400,
            RegistryError::InstanceNotFound(_) => 404,
            RegistryError::DuplicateUrl(_) => 409,
            RegistryError::StorageError(_) => 500,
            RegistryError::InvalidConfiguration(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(RegistryError::InvalidUrl("x".into()).status_code(), 400);
        assert_eq!(RegistryError::InstanceNotFound(Uuid::nil()).status_code(), 404);
        assert_eq!(RegistryError::DuplicateUrl("x".into()).status_code(), 409);
        assert_eq!(RegistryError::StorageError("x".into()).status_code(), 500);
    }
}
