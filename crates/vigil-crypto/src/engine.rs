//! Authenticated encryption, password hashing, and integrity primitives.
//!
//! All operations are synchronous, CPU-bound, and hold no locks; the only
//! shared state is the immutable master key, so the engine is safe to share
//! across any number of concurrent flows.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use uuid::Uuid;

use crate::config::CryptoConfig;
use crate::error::{CryptoError, Result};
use crate::keys::{constant_time_eq, KeyMaterial};

/// AES-GCM nonce size in bytes.
const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes.
const TAG_SIZE: usize = 16;

/// Random salt size for password hashing.
const PASSWORD_SALT_SIZE: usize = 16;

/// Derived password hash size in bytes.
const PASSWORD_HASH_SIZE: usize = 64;

/// Default PBKDF2 iteration count for new password hashes. The count is
/// embedded in every hash string, so raising it later leaves old hashes
/// verifiable.
const PASSWORD_ITERATIONS: u32 = 100_000;

/// Size of a generated data key in bytes.
pub const DATA_KEY_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// A freshly generated per-record data key together with its wrapped form.
///
/// Only `encrypted_key` is ever persisted; the plaintext key encrypts the
/// actual record content and can be re-wrapped under a rotated master key
/// without touching the content ciphertext.
pub struct DataKey {
    /// Plaintext content key. Never persist this.
    pub key: [u8; DATA_KEY_SIZE],
    /// The key wrapped under the master key, as an opaque envelope string.
    pub encrypted_key: String,
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataKey")
            .field("key", &"[REDACTED]")
            .field("encrypted_key", &self.encrypted_key)
            .finish()
    }
}

/// Field-level encryption service.
///
/// Produces self-contained envelopes of the form
/// `base64(nonce ‖ tag ‖ ciphertext)`; the format is fixed and never mixed
/// with another scheme.
#[derive(Clone)]
pub struct EncryptionEngine {
    keys: KeyMaterial,
}

impl EncryptionEngine {
    /// Creates an engine over already-derived key material.
    pub fn new(keys: KeyMaterial) -> Self {
        Self { keys }
    }

    /// Derives the master key from configuration and builds an engine.
    pub fn from_config(config: &CryptoConfig) -> Result<Self> {
        Ok(Self::new(KeyMaterial::derive(config)?))
    }

    /// Encrypts arbitrary bytes under the master key.
    ///
    /// A fresh random nonce is generated per call; two encryptions of the
    /// same plaintext never produce the same envelope. Any byte sequence is
    /// valid plaintext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        self.encrypt_with_key(self.keys.bytes(), plaintext)
    }

    /// Decrypts an envelope produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails closed with [`CryptoError::DecryptionFailed`] on bad encoding,
    /// truncation, or authentication-tag mismatch; the error never reveals
    /// which of those occurred.
    pub fn decrypt(&self, envelope: &str) -> Result<Vec<u8>> {
        self.decrypt_with_key(self.keys.bytes(), envelope)
    }

    fn encrypt_with_key(&self, key: &[u8], plaintext: &[u8]) -> Result<String> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        // aes-gcm appends the tag to the ciphertext; re-order into the
        // nonce ‖ tag ‖ ciphertext envelope layout.
        let mut sealed = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;
        if sealed.len() < TAG_SIZE {
            return Err(CryptoError::EncryptionFailed);
        }
        let tag = sealed.split_off(sealed.len() - TAG_SIZE);

        let mut envelope = Vec::with_capacity(NONCE_SIZE + TAG_SIZE + sealed.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&tag);
        envelope.extend_from_slice(&sealed);

        Ok(BASE64.encode(envelope))
    }

    fn decrypt_with_key(&self, key: &[u8], envelope: &str) -> Result<Vec<u8>> {
        let raw = BASE64
            .decode(envelope)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }

        let nonce = Nonce::from_slice(&raw[..NONCE_SIZE]);
        let tag = &raw[NONCE_SIZE..NONCE_SIZE + TAG_SIZE];
        let ciphertext = &raw[NONCE_SIZE + TAG_SIZE..];

        let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        cipher
            .decrypt(nonce, sealed.as_ref())
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Hashes a password with PBKDF2-HMAC-SHA512 and a fresh random salt.
    ///
    /// The output encodes `hex(salt):iterations:hex(hash)` so the iteration
    /// count travels with the hash.
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let mut salt = [0u8; PASSWORD_SALT_SIZE];
        OsRng.fill_bytes(&mut salt);

        let mut hash = [0u8; PASSWORD_HASH_SIZE];
        pbkdf2_hmac::<Sha512>(password.as_bytes(), &salt, PASSWORD_ITERATIONS, &mut hash);

        Ok(format!(
            "{}:{}:{}",
            hex::encode(salt),
            PASSWORD_ITERATIONS,
            hex::encode(hash)
        ))
    }

    /// Verifies a password against a stored hash string.
    ///
    /// Re-derives with the embedded salt and iteration count and compares in
    /// constant time. Returns `false` (never an error) on any malformed
    /// input.
    pub fn verify_password(&self, password: &str, stored: &str) -> bool {
        let mut parts = stored.split(':');
        let (salt_hex, iterations_str, hash_hex) = match (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (Some(s), Some(i), Some(h), None) => (s, i, h),
            _ => return false,
        };

        let salt = match hex::decode(salt_hex) {
            Ok(s) if !s.is_empty() => s,
            _ => return false,
        };
        let iterations: u32 = match iterations_str.parse() {
            Ok(i) if i > 0 => i,
            _ => return false,
        };
        let expected = match hex::decode(hash_hex) {
            Ok(h) if !h.is_empty() => h,
            _ => return false,
        };

        let mut derived = vec![0u8; expected.len()];
        pbkdf2_hmac::<Sha512>(password.as_bytes(), &salt, iterations, &mut derived);

        constant_time_eq(&derived, &expected)
    }

    /// Generates `length` cryptographically random bytes as a hex string.
    pub fn generate_token(&self, length: usize) -> String {
        let mut bytes = vec![0u8; length];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Generates a random v4 UUID.
    pub fn generate_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }

    /// Fast one-way SHA-256 fingerprint of arbitrary data. Not for
    /// passwords.
    pub fn hash(&self, data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Computes an HMAC-SHA256 tag over `data`, defaulting to the master
    /// key when no explicit key is supplied.
    pub fn generate_hmac(&self, data: &[u8], key: Option<&[u8]>) -> Result<String> {
        let key = key.unwrap_or(self.keys.bytes());
        // Qualified call: the aead KeyInit import also has a new_from_slice.
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|_| CryptoError::HashingFailed)?;
        mac.update(data);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Verifies an HMAC tag in constant time. Returns `false` on malformed
    /// input.
    pub fn verify_hmac(&self, data: &[u8], mac_hex: &str, key: Option<&[u8]>) -> bool {
        let provided = match hex::decode(mac_hex) {
            Ok(m) => m,
            Err(_) => return false,
        };
        let expected = match self.generate_hmac(data, key) {
            Ok(m) => m,
            Err(_) => return false,
        };
        // generate_hmac returned hex it produced itself, decode cannot fail
        let expected = hex::decode(expected).unwrap_or_default();
        constant_time_eq(&provided, &expected)
    }

    /// Serializes a value to JSON and encrypts it.
    pub fn encrypt_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = serde_json::to_vec(value).map_err(|_| CryptoError::EncryptionFailed)?;
        self.encrypt(&json)
    }

    /// Decrypts an envelope and deserializes the plaintext.
    ///
    /// Decryption failure surfaces as [`CryptoError::DecryptionFailed`];
    /// a shape mismatch after successful decryption surfaces as
    /// [`CryptoError::MalformedPayload`] so callers can tell "wrong key"
    /// from "wrong shape".
    pub fn decrypt_json<T: DeserializeOwned>(&self, envelope: &str) -> Result<T> {
        let plaintext = self.decrypt(envelope)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| CryptoError::MalformedPayload(e.to_string()))
    }

    /// Generates a fresh per-record data key and wraps it under the master
    /// key.
    pub fn create_data_key(&self) -> Result<DataKey> {
        let mut key = [0u8; DATA_KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        let encrypted_key = self.encrypt(&key)?;
        Ok(DataKey { key, encrypted_key })
    }

    /// Unwraps a data key previously produced by
    /// [`create_data_key`](Self::create_data_key).
    pub fn decrypt_data_key(&self, encrypted_key: &str) -> Result<[u8; DATA_KEY_SIZE]> {
        let plaintext = self.decrypt(encrypted_key)?;
        let key: [u8; DATA_KEY_SIZE] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::DecryptionFailed)?;
        Ok(key)
    }

    /// Encrypts content under an unwrapped data key, in the same envelope
    /// format as [`encrypt`](Self::encrypt).
    pub fn encrypt_with_data_key(
        &self,
        key: &[u8; DATA_KEY_SIZE],
        plaintext: &[u8],
    ) -> Result<String> {
        self.encrypt_with_key(key, plaintext)
    }

    /// Decrypts content sealed with [`encrypt_with_data_key`](Self::encrypt_with_data_key).
    pub fn decrypt_with_data_key(
        &self,
        key: &[u8; DATA_KEY_SIZE],
        envelope: &str,
    ) -> Result<Vec<u8>> {
        self.decrypt_with_key(key, envelope)
    }
}

impl fmt::Debug for EncryptionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionEngine")
    }
}
