//! # Vigil HTTP
//!
//! Request/response audit capture for the Vigil platform.
//!
//! Every inbound request passes through the capture middleware exactly
//! once: it assigns a correlation id, measures duration, derives the
//! client address, and hands a normalized record to the audit recorder
//! after the response has been built, off the response path.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::Router;
//! use vigil_audit::{AuditRecorder, MemoryAuditStore};
//! use vigil_crypto::{CryptoConfig, EncryptionEngine};
//! use vigil_http::{audit_capture_middleware, AuditCapture};
//!
//! let engine = Arc::new(
//!     EncryptionEngine::from_config(&CryptoConfig::from_env().unwrap()).unwrap(),
//! );
//! let recorder = Arc::new(AuditRecorder::new(Arc::new(MemoryAuditStore::new()), engine));
//!
//! let app: Router = Router::new().layer(axum::middleware::from_fn_with_state(
//!     AuditCapture::new(recorder),
//!     audit_capture_middleware,
//! ));
//! ```

mod capture;

pub use capture::{
    audit_capture_middleware, AuditCapture, AuditPrincipal, CorrelationId,
    CORRELATION_ID_HEADER, FORWARDED_FOR_HEADER, REAL_IP_HEADER, UNKNOWN_ADDRESS,
};
