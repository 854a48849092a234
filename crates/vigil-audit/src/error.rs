//! Error types for the audit crate.

use thiserror::Error;

/// Result type alias for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Errors that can occur on the audit read path.
///
/// The write path never surfaces these to business callers: persistence
/// failures inside [`crate::AuditRecorder::record`] are caught and logged.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The persistence collaborator failed.
    #[error("audit store error: {0}")]
    Store(String),

    /// A cryptographic operation failed.
    #[error(transparent)]
    Crypto(#[from] vigil_crypto::CryptoError),

    /// Audit entry not found.
    #[error("audit entry not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = AuditError::Store("connection refused".into());
        assert!(err.to_string().contains("audit store error"));
    }

    #[test]
    fn test_crypto_error_converts() {
        let err: AuditError = vigil_crypto::CryptoError::DecryptionFailed.into();
        assert_eq!(err.to_string(), "failed to decrypt data");
    }
}
