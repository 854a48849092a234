//! On-demand detection of suspicious access patterns.
//!
//! Rules are evaluated in a fixed order with an early return on the first
//! positive, so at most one alert entry is written per call. Callers rely
//! on that at-most-one-alert cadence; do not "fix" it to evaluate all
//! rules.
//!
//! The detector's own alerts are recorded through the same trail it scans.
//! Do not invoke detection synchronously on every request, or the
//! volumetric threshold becomes self-reinforcing.

use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use vigil_crypto::EncryptionEngine;

use crate::clock::{Clock, SystemClock};
use crate::entry::AuditAction;
use crate::error::Result;
use crate::recorder::AuditRecorder;
use crate::store::{AuditFilter, AuditStore};

/// Alert subtype for brute-force login attempts.
pub const ALERT_MULTIPLE_LOGIN_FAILURES: &str = "MULTIPLE_LOGIN_FAILURES";

/// Alert subtype for volumetric API abuse.
pub const ALERT_EXCESSIVE_API_USAGE: &str = "EXCESSIVE_API_USAGE";

/// Alert subtype for access from many distinct source IPs.
pub const ALERT_MULTIPLE_IP_ACCESS: &str = "MULTIPLE_IP_ACCESS";

/// Detection thresholds. Rules fire when a count strictly exceeds its
/// threshold.
#[derive(Debug, Clone)]
pub struct AnomalyThresholds {
    /// Failed logins tolerated within [`failed_login_window_secs`](Self::failed_login_window_secs).
    pub max_failed_logins: u64,
    /// Trailing window for the brute-force rule, in seconds.
    pub failed_login_window_secs: u64,
    /// Total entries tolerated within [`volumetric_window_secs`](Self::volumetric_window_secs).
    pub max_events_per_window: u64,
    /// Trailing window for the volumetric rule, in seconds.
    pub volumetric_window_secs: u64,
    /// Distinct source IPs tolerated within [`ip_window_secs`](Self::ip_window_secs).
    pub max_distinct_ips: usize,
    /// Trailing window for the multi-origin rule, in seconds.
    pub ip_window_secs: u64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            max_failed_logins: 5,
            failed_login_window_secs: 15 * 60,
            max_events_per_window: 1000,
            volumetric_window_secs: 60 * 60,
            max_distinct_ips: 5,
            ip_window_secs: 60 * 60,
        }
    }
}

/// Flags brute-force, volumetric, and multi-origin access patterns for a
/// principal.
pub struct AnomalyDetector {
    store: Arc<dyn AuditStore>,
    recorder: Arc<AuditRecorder>,
    engine: Arc<EncryptionEngine>,
    clock: Arc<dyn Clock>,
    thresholds: AnomalyThresholds,
}

impl AnomalyDetector {
    /// Creates a detector with default thresholds and the system clock.
    pub fn new(
        store: Arc<dyn AuditStore>,
        recorder: Arc<AuditRecorder>,
        engine: Arc<EncryptionEngine>,
    ) -> Self {
        Self::with_clock(store, recorder, engine, Arc::new(SystemClock))
    }

    /// Creates a detector with an explicit clock, for deterministic tests.
    pub fn with_clock(
        store: Arc<dyn AuditStore>,
        recorder: Arc<AuditRecorder>,
        engine: Arc<EncryptionEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            recorder,
            engine,
            clock,
            thresholds: AnomalyThresholds::default(),
        }
    }

    /// Overrides the detection thresholds.
    pub fn with_thresholds(mut self, thresholds: AnomalyThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Evaluates all rules for a principal, short-circuiting on the first
    /// positive. Returns `true` and writes one security alert if any rule
    /// fires.
    pub async fn detect_suspicious_activity(&self, user_id: &str) -> Result<bool> {
        let now = self.clock.now_unix();

        // Rule 1: brute-force login attempts.
        let failed_logins = self
            .store
            .count(
                &AuditFilter::new()
                    .user(user_id)
                    .action(AuditAction::LoginFailed)
                    .since(now.saturating_sub(self.thresholds.failed_login_window_secs)),
            )
            .await?;
        if failed_logins > self.thresholds.max_failed_logins {
            self.recorder
                .log_security_alert(
                    user_id,
                    ALERT_MULTIPLE_LOGIN_FAILURES,
                    json!({
                        "failed_attempts": failed_logins,
                        "window_secs": self.thresholds.failed_login_window_secs,
                    }),
                )
                .await;
            return Ok(true);
        }

        // Rule 2: volumetric abuse.
        let recent_events = self
            .store
            .count(
                &AuditFilter::new()
                    .user(user_id)
                    .since(now.saturating_sub(self.thresholds.volumetric_window_secs)),
            )
            .await?;
        if recent_events > self.thresholds.max_events_per_window {
            self.recorder
                .log_security_alert(
                    user_id,
                    ALERT_EXCESSIVE_API_USAGE,
                    json!({
                        "event_count": recent_events,
                        "window_secs": self.thresholds.volumetric_window_secs,
                    }),
                )
                .await;
            return Ok(true);
        }

        // Rule 3: access from many distinct source IPs. Stored IPs are
        // encrypted with random nonces, so distinctness requires
        // decryption; undecryptable records are skipped.
        let entries = self
            .store
            .query(
                &AuditFilter::new()
                    .user(user_id)
                    .since(now.saturating_sub(self.thresholds.ip_window_secs)),
            )
            .await?;
        let distinct_ips: HashSet<Vec<u8>> = entries
            .iter()
            .filter_map(|e| e.event.ip_address.as_deref())
            .filter_map(|envelope| self.engine.decrypt(envelope).ok())
            .filter(|ip| !ip.is_empty())
            .collect();
        if distinct_ips.len() > self.thresholds.max_distinct_ips {
            self.recorder
                .log_security_alert(
                    user_id,
                    ALERT_MULTIPLE_IP_ACCESS,
                    json!({
                        "distinct_ips": distinct_ips.len(),
                        "window_secs": self.thresholds.ip_window_secs,
                    }),
                )
                .await;
            return Ok(true);
        }

        Ok(false)
    }
}
