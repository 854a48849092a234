//! Error types for the crypto crate.

use thiserror::Error;

/// Result type alias for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations.
///
/// Messages never contain plaintext, key material, or any detail that would
/// let a caller distinguish a bad authentication tag from a malformed
/// envelope.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed due to an underlying cipher fault.
    #[error("encryption failed")]
    EncryptionFailed,

    /// Decryption failed: tampered ciphertext, wrong key, truncated or
    /// malformed envelope. Deliberately a single variant.
    #[error("failed to decrypt data")]
    DecryptionFailed,

    /// Password or key hashing failed.
    #[error("hashing failed")]
    HashingFailed,

    /// Decryption succeeded but the plaintext did not deserialize into the
    /// expected shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Missing or invalid secrets configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
