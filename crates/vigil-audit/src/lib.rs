//! # Vigil Audit
//!
//! Append-only audit trail, anomaly detection, and compliance reporting
//! for the Vigil platform.
//!
//! ## Features
//!
//! - **Audit Recording**: structured entries with sanitized detail maps and
//!   encrypted source IPs
//! - **Live Notifications**: broadcast channel of recorded entries for
//!   monitoring subscribers
//! - **Anomaly Detection**: brute-force, volumetric, and multi-origin
//!   access rules over the trail
//! - **Compliance Reporting**: per-user and per-kind aggregates over a
//!   time window
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil_audit::{AuditRecorder, MemoryAuditStore};
//! use vigil_crypto::{CryptoConfig, EncryptionEngine};
//!
//! # async fn example() {
//! let engine = Arc::new(
//!     EncryptionEngine::from_config(&CryptoConfig::from_env().unwrap()).unwrap(),
//! );
//! let store = Arc::new(MemoryAuditStore::new());
//! let recorder = AuditRecorder::new(store, engine);
//!
//! recorder.log_login("user-1", Some("203.0.113.9"), None).await;
//! # }
//! ```

mod anomaly;
mod clock;
mod entry;
mod error;
mod notify;
mod recorder;
mod report;
mod store;

pub use anomaly::{
    AnomalyDetector, AnomalyThresholds, ALERT_EXCESSIVE_API_USAGE, ALERT_MULTIPLE_IP_ACCESS,
    ALERT_MULTIPLE_LOGIN_FAILURES,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{AuditAction, AuditEntry, AuditEvent, AuditSeverity};
pub use error::{AuditError, Result};
pub use notify::{AuditNotifier, AuditRecorded};
pub use recorder::{
    mask_email, AuditRecorder, DEFAULT_ACTIVITY_WINDOW_DAYS, DEFAULT_PAGE_SIZE,
    DEFAULT_RETENTION_DAYS, UNDECRYPTABLE_MARKER,
};
pub use report::{ActivitySummary, AuditPage, ComplianceReport};
pub use store::{AuditFilter, AuditStore, MemoryAuditStore};
