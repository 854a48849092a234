//! # Vigil Crypto
//!
//! Field-level encryption, password hashing, and log sanitization for the
//! Vigil platform.
//!
//! ## Features
//!
//! - **Authenticated Encryption**: AES-256-GCM envelopes with per-call
//!   random nonces, fail-closed decryption
//! - **Password Hashing**: salted PBKDF2 with the iteration count embedded
//!   in every hash
//! - **Integrity Tags**: HMAC-SHA256 generation and constant-time
//!   verification
//! - **Envelope Encryption**: per-record data keys wrapped under the
//!   process master key
//! - **Log Sanitization**: recursive redaction of sensitive fields
//!
//! ## Example
//!
//! ```rust
//! use vigil_crypto::{CryptoConfig, EncryptionEngine};
//!
//! let config = CryptoConfig::new("master-secret", "unique-salt").unwrap();
//! let engine = EncryptionEngine::from_config(&config).unwrap();
//!
//! let envelope = engine.encrypt(b"social security number").unwrap();
//! let plaintext = engine.decrypt(&envelope).unwrap();
//! assert_eq!(plaintext, b"social security number");
//! ```

mod config;
mod engine;
mod error;
mod keys;
mod sanitize;

pub use config::{CryptoConfig, MASTER_SALT_VAR, MASTER_SECRET_VAR};
pub use engine::{DataKey, EncryptionEngine, DATA_KEY_SIZE};
pub use error::{CryptoError, Result};
pub use keys::{constant_time_eq, KeyMaterial, SecretString, MASTER_KEY_SIZE};
pub use sanitize::{sanitize_for_logging, REDACTION_MARKER};
