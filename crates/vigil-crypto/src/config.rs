//! Secrets configuration for key derivation.
//!
//! The master secret and salt are required at process start. Startup fails
//! hard if either is absent; there is no degraded mode, because every
//! previously encrypted record depends on the derived key.

use crate::error::{CryptoError, Result};
use crate::keys::SecretString;

/// Environment variable holding the long-term master secret.
pub const MASTER_SECRET_VAR: &str = "VIGIL_MASTER_SECRET";

/// Environment variable holding the operator-generated salt.
pub const MASTER_SALT_VAR: &str = "VIGIL_MASTER_SALT";

/// Configuration for the process master key.
#[derive(Debug, Clone)]
pub struct CryptoConfig {
    /// Long-term master secret.
    pub master_secret: SecretString,
    /// Unique, operator-supplied salt. Losing it makes all previously
    /// encrypted data permanently unrecoverable.
    pub master_salt: SecretString,
}

impl CryptoConfig {
    /// Creates a configuration from explicit values.
    pub fn new(master_secret: impl Into<String>, master_salt: impl Into<String>) -> Result<Self> {
        let config = Self {
            master_secret: SecretString::new(master_secret),
            master_salt: SecretString::new(master_salt),
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from `VIGIL_MASTER_SECRET` and
    /// `VIGIL_MASTER_SALT`.
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var(MASTER_SECRET_VAR)
            .map_err(|_| CryptoError::Configuration(format!("{} is not set", MASTER_SECRET_VAR)))?;
        let salt = std::env::var(MASTER_SALT_VAR)
            .map_err(|_| CryptoError::Configuration(format!("{} is not set", MASTER_SALT_VAR)))?;
        Self::new(secret, salt)
    }

    fn validate(&self) -> Result<()> {
        if self.master_secret.is_empty() {
            return Err(CryptoError::Configuration(
                "master secret must not be empty".into(),
            ));
        }
        if self.master_salt.is_empty() {
            return Err(CryptoError::Configuration(
                "master salt must not be empty".into(),
            ));
        }
        Ok(())
    }
}
