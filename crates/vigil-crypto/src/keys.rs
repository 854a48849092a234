//! Master key material and secure string handling.
//!
//! The master key is derived once per process lifetime and only ever lives
//! in memory. There is no key-recovery path: losing the secret or the salt
//! makes all previously encrypted data permanently unrecoverable.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use std::fmt;

use crate::config::CryptoConfig;
use crate::error::Result;

/// Size of the derived master key in bytes (256 bits).
pub const MASTER_KEY_SIZE: usize = 32;

/// PBKDF2 iteration count for master key derivation. Fixed: changing it
/// produces a different key and orphans existing ciphertexts.
const MASTER_KEY_ITERATIONS: u32 = 100_000;

/// A secret string that implements secure handling.
///
/// This type ensures that secrets are:
/// - Not logged via Debug or Display
/// - Zeroized on drop (best effort)
#[derive(Clone)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Creates a new secret string.
    pub fn new(s: impl Into<String>) -> Self {
        Self { inner: s.into() }
    }

    /// Exposes the secret value.
    ///
    /// Use this sparingly and only when necessary.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Returns the length of the secret.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // Zero out the memory (best effort)
        // SAFETY: We're just overwriting the bytes with zeros
        unsafe {
            let ptr = self.inner.as_mut_ptr();
            let len = self.inner.len();
            std::ptr::write_bytes(ptr, 0, len);
        }
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(self.inner.as_bytes(), other.inner.as_bytes())
    }
}

impl Eq for SecretString {}

/// Constant-time byte comparison. Never short-circuits on the first
/// mismatched byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// The process-wide 256-bit master key.
///
/// Derived once from the configured secret and salt; read-only afterwards
/// and safe to share across any number of concurrent flows.
#[derive(Clone)]
pub struct KeyMaterial {
    key: [u8; MASTER_KEY_SIZE],
}

impl KeyMaterial {
    /// Derives the master key from the configured secret and salt via
    /// PBKDF2-HMAC-SHA256.
    pub fn derive(config: &CryptoConfig) -> Result<Self> {
        let mut key = [0u8; MASTER_KEY_SIZE];
        pbkdf2_hmac::<Sha256>(
            config.master_secret.expose().as_bytes(),
            config.master_salt.expose().as_bytes(),
            MASTER_KEY_ITERATIONS,
            &mut key,
        );
        Ok(Self { key })
    }

    /// Returns the raw key bytes.
    ///
    /// Crate-internal: the key is never exposed outside the engine.
    pub(crate) fn bytes(&self) -> &[u8; MASTER_KEY_SIZE] {
        &self.key
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        // Best-effort zeroing
        for b in self.key.iter_mut() {
            *b = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CryptoConfig {
        CryptoConfig::new("test-master-secret", "test-unique-salt").unwrap()
    }

    #[test]
    fn test_secret_string_redaction() {
        let secret = SecretString::new("super_secret_password");

        let debug_str = format!("{:?}", secret);
        assert!(!debug_str.contains("super_secret_password"));
        assert!(debug_str.contains("REDACTED"));

        let display_str = format!("{}", secret);
        assert!(!display_str.contains("super_secret_password"));
    }

    #[test]
    fn test_secret_string_equality() {
        let s1 = SecretString::new("password");
        let s2 = SecretString::new("password");
        let s3 = SecretString::new("different");

        assert_eq!(s1, s2);
        assert_ne!(s1, s3);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let k1 = KeyMaterial::derive(&test_config()).unwrap();
        let k2 = KeyMaterial::derive(&test_config()).unwrap();
        assert_eq!(k1.bytes(), k2.bytes());
    }

    #[test]
    fn test_different_salt_different_key() {
        let k1 = KeyMaterial::derive(&test_config()).unwrap();
        let other = CryptoConfig::new("test-master-secret", "another-salt").unwrap();
        let k2 = KeyMaterial::derive(&other).unwrap();
        assert_ne!(k1.bytes(), k2.bytes());
    }

    #[test]
    fn test_key_material_debug_redacts() {
        let key = KeyMaterial::derive(&test_config()).unwrap();
        assert_eq!(format!("{:?}", key), "KeyMaterial([REDACTED])");
    }
}
