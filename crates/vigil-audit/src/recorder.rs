//! Append-only audit recording.
//!
//! The recorder sanitizes detail maps, encrypts source IPs, persists
//! entries, and notifies live subscribers. Persistence failures are caught
//! and logged here: audit logging must never cause the triggering business
//! operation to fail.

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;
use vigil_crypto::{sanitize_for_logging, EncryptionEngine};

use crate::clock::{Clock, SystemClock};
use crate::entry::{AuditAction, AuditEntry, AuditEvent};
use crate::error::Result;
use crate::notify::{AuditNotifier, AuditRecorded};
use crate::report::{ActivitySummary, AuditPage, ComplianceReport};
use crate::store::{AuditFilter, AuditStore};

/// Default page size for log queries.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default trailing window for activity summaries, in days.
pub const DEFAULT_ACTIVITY_WINDOW_DAYS: u32 = 30;

/// Default retention window before entries become archival candidates.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// Marker stored in place of an IP that no longer decrypts (key mismatch or
/// corrupted record). The read path fails open so one bad record cannot
/// break a whole page.
pub const UNDECRYPTABLE_MARKER: &str = "[UNDECRYPTABLE]";

const SECONDS_PER_DAY: u64 = 86_400;

/// Records security-relevant events into the audit store.
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    engine: Arc<EncryptionEngine>,
    clock: Arc<dyn Clock>,
    notifier: AuditNotifier,
}

impl AuditRecorder {
    /// Creates a recorder over the given store and encryption engine.
    pub fn new(store: Arc<dyn AuditStore>, engine: Arc<EncryptionEngine>) -> Self {
        Self::with_clock(store, engine, Arc::new(SystemClock))
    }

    /// Creates a recorder with an explicit clock, for deterministic tests.
    pub fn with_clock(
        store: Arc<dyn AuditStore>,
        engine: Arc<EncryptionEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            engine,
            clock,
            notifier: AuditNotifier::new(),
        }
    }

    /// Subscribes a live monitor to recorded-entry notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditRecorded> {
        self.notifier.subscribe()
    }

    /// Records one audit event.
    ///
    /// The detail map is sanitized and the source IP encrypted before the
    /// entry is constructed. A persistence failure is logged and swallowed;
    /// the constructed entry is returned either way.
    pub async fn record(&self, event: AuditEvent) -> AuditEntry {
        let mut event = event;
        event.details = sanitize_for_logging(&event.details);
        if let Some(ip) = event.ip_address.take() {
            if !ip.is_empty() {
                match self.engine.encrypt(ip.as_bytes()) {
                    Ok(envelope) => event.ip_address = Some(envelope),
                    Err(e) => {
                        // Drop the IP rather than store it in the clear.
                        tracing::error!(error = %e, "failed to encrypt audit source IP");
                    }
                }
            }
        }

        let entry = AuditEntry {
            id: Uuid::new_v4(),
            timestamp: self.clock.now_unix(),
            event,
        };

        if let Err(e) = self.store.append(entry.clone()).await {
            tracing::error!(
                error = %e,
                entry_id = %entry.id,
                action = ?entry.event.action,
                "failed to persist audit entry; business operation continues"
            );
        } else {
            tracing::info!(
                entry_id = %entry.id,
                action = ?entry.event.action,
                user_id = ?entry.event.user_id,
                resource = %entry.event.resource,
                success = entry.event.success,
                severity = ?entry.severity(),
                "audit event recorded"
            );
        }

        self.notifier.publish(AuditRecorded::from(&entry));
        entry
    }

    // ==================== Convenience constructors ====================

    /// Records a successful login.
    pub async fn log_login(
        &self,
        user_id: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> AuditEntry {
        let mut event = AuditEvent::new(AuditAction::Login, "session").with_user(user_id);
        if let Some(ip) = ip {
            event = event.with_ip(ip);
        }
        if let Some(ua) = user_agent {
            event = event.with_user_agent(ua);
        }
        self.record(event).await
    }

    /// Records a logout.
    pub async fn log_logout(&self, user_id: &str, ip: Option<&str>) -> AuditEntry {
        let mut event = AuditEvent::new(AuditAction::Logout, "session").with_user(user_id);
        if let Some(ip) = ip {
            event = event.with_ip(ip);
        }
        self.record(event).await
    }

    /// Records a failed login attempt.
    ///
    /// The email's local part is masked before it ever reaches the detail
    /// map; the domain is preserved. Masking happens before sanitization,
    /// not instead of it.
    pub async fn log_failed_login(
        &self,
        email: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> AuditEntry {
        let mut event = AuditEvent::new(AuditAction::LoginFailed, "session")
            .with_details(json!({ "email": mask_email(email) }))
            .failed();
        if let Some(ip) = ip {
            event = event.with_ip(ip);
        }
        if let Some(ua) = user_agent {
            event = event.with_user_agent(ua);
        }
        self.record(event).await
    }

    /// Records a data CRUD/export event.
    pub async fn log_data_access(
        &self,
        user_id: &str,
        action: AuditAction,
        resource: &str,
        resource_id: Option<&str>,
        details: Value,
    ) -> AuditEntry {
        let mut event = AuditEvent::new(action, resource)
            .with_user(user_id)
            .with_details(details);
        if let Some(id) = resource_id {
            event = event.with_resource_id(id);
        }
        self.record(event).await
    }

    /// Records a security alert raised by detection logic.
    pub async fn log_security_alert(
        &self,
        user_id: &str,
        alert_type: &str,
        details: Value,
    ) -> AuditEntry {
        let details = match details {
            Value::Object(mut map) => {
                map.insert("alert".to_string(), Value::String(alert_type.to_string()));
                Value::Object(map)
            }
            Value::Null => json!({ "alert": alert_type }),
            other => json!({ "alert": alert_type, "details": other }),
        };
        let event = AuditEvent::new(AuditAction::SecurityAlert, "security")
            .with_user(user_id)
            .with_details(details);
        self.record(event).await
    }

    // ==================== Read side ====================

    /// Queries the audit trail.
    ///
    /// Returns one page (default size 100) plus a total count computed
    /// independently of pagination. Stored IPs are decrypted for the
    /// returned page only, never for the full result set.
    pub async fn query_logs(&self, filter: AuditFilter) -> Result<AuditPage> {
        let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = filter.offset.unwrap_or(0);
        let filter = AuditFilter {
            limit: Some(limit),
            offset: Some(offset),
            ..filter
        };

        let total = self.store.count(&filter).await?;
        let mut entries = self.store.query(&filter).await?;
        for entry in &mut entries {
            if let Some(envelope) = entry.event.ip_address.take() {
                entry.event.ip_address = Some(self.decrypt_ip(&envelope));
            }
        }

        Ok(AuditPage {
            entries,
            total,
            limit,
            offset,
        })
    }

    fn decrypt_ip(&self, envelope: &str) -> String {
        self.engine
            .decrypt(envelope)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_else(|| UNDECRYPTABLE_MARKER.to_string())
    }

    /// Summarizes a principal's activity over a trailing window.
    pub async fn user_activity_summary(
        &self,
        user_id: &str,
        window_days: u32,
    ) -> Result<ActivitySummary> {
        let from = self
            .clock
            .now_unix()
            .saturating_sub(u64::from(window_days) * SECONDS_PER_DAY);
        let filter = AuditFilter::new().user(user_id).since(from);
        let entries = self.store.query(&filter).await?;
        Ok(ActivitySummary::from_entries(user_id, window_days, &entries))
    }

    /// Counts entries older than the retention cutoff.
    ///
    /// Advisory only: nothing is deleted. Physical deletion or cold-storage
    /// migration is an explicit operator action outside this component.
    pub async fn archive_old_logs(&self, retention_days: u32) -> Result<u64> {
        let cutoff = self
            .clock
            .now_unix()
            .saturating_sub(u64::from(retention_days) * SECONDS_PER_DAY);
        let candidates = self.store.count(&AuditFilter::new().before(cutoff)).await?;
        tracing::info!(
            candidates,
            retention_days,
            "retention scan complete; no entries deleted"
        );
        Ok(candidates)
    }

    /// Builds a compliance report over `[start, end)` in a single pass.
    pub async fn compliance_report(&self, start: u64, end: u64) -> Result<ComplianceReport> {
        let filter = AuditFilter::new().between(start, end);
        let entries = self.store.query(&filter).await?;
        Ok(ComplianceReport::from_entries(
            start,
            end,
            self.clock.now_unix(),
            &entries,
        ))
    }
}

/// Masks an email's local part: first and last character kept, middle
/// replaced with a fixed-length mask. The domain is preserved.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => format!("{}@{}", mask_local_part(local), domain),
        None => mask_local_part(email),
    }
}

fn mask_local_part(local: &str) -> String {
    let first = local.chars().next();
    let last = local.chars().last();
    match (first, last) {
        (Some(first), Some(last)) => format!("{first}***{last}"),
        _ => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::AuditError;
    use crate::store::MemoryAuditStore;
    use async_trait::async_trait;
    use vigil_crypto::{CryptoConfig, REDACTION_MARKER};

    const NOW: u64 = 1_705_276_800; // 2024-01-15 00:00:00 UTC

    fn test_engine() -> Arc<EncryptionEngine> {
        static ENGINE: std::sync::OnceLock<EncryptionEngine> = std::sync::OnceLock::new();
        Arc::new(
            ENGINE
                .get_or_init(|| {
                    let config = CryptoConfig::new("audit-secret", "audit-salt").unwrap();
                    EncryptionEngine::from_config(&config).unwrap()
                })
                .clone(),
        )
    }

    struct Harness {
        store: Arc<MemoryAuditStore>,
        clock: Arc<ManualClock>,
        recorder: AuditRecorder,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryAuditStore::new());
        let clock = Arc::new(ManualClock::at(NOW));
        let recorder =
            AuditRecorder::with_clock(store.clone(), test_engine(), clock.clone());
        Harness {
            store,
            clock,
            recorder,
        }
    }

    #[tokio::test]
    async fn test_record_sanitizes_details() {
        let h = harness();
        let entry = h
            .recorder
            .record(
                AuditEvent::new(AuditAction::DataUpdate, "users")
                    .with_user("u1")
                    .with_details(json!({ "password": "hunter2", "name": "ada" })),
            )
            .await;

        assert_eq!(entry.event.details["password"], REDACTION_MARKER);
        assert_eq!(entry.event.details["name"], "ada");

        // The stored copy is the sanitized one.
        let stored = h.store.get(entry.id).await.unwrap();
        assert_eq!(stored.event.details["password"], REDACTION_MARKER);
    }

    #[tokio::test]
    async fn test_record_encrypts_ip() {
        let h = harness();
        let entry = h
            .recorder
            .record(
                AuditEvent::new(AuditAction::Login, "session")
                    .with_user("u1")
                    .with_ip("203.0.113.9"),
            )
            .await;

        let stored_ip = entry.event.ip_address.as_deref().unwrap();
        assert_ne!(stored_ip, "203.0.113.9");
        let plaintext = test_engine().decrypt(stored_ip).unwrap();
        assert_eq!(plaintext, b"203.0.113.9");
    }

    #[tokio::test]
    async fn test_record_emits_notification() {
        let h = harness();
        let mut rx = h.recorder.subscribe();

        let entry = h.recorder.log_login("u1", None, None).await;

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.id, entry.id);
        assert_eq!(notice.action, AuditAction::Login);
        assert_eq!(notice.user_id.as_deref(), Some("u1"));
        assert!(notice.success);
    }

    struct FailingStore;

    #[async_trait]
    impl AuditStore for FailingStore {
        async fn append(&self, _entry: AuditEntry) -> Result<()> {
            Err(AuditError::Store("disk on fire".into()))
        }
        async fn query(&self, _filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
            Ok(Vec::new())
        }
        async fn count(&self, _filter: &AuditFilter) -> Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_is_swallowed() {
        let recorder = AuditRecorder::with_clock(
            Arc::new(FailingStore),
            test_engine(),
            Arc::new(ManualClock::at(NOW)),
        );
        let mut rx = recorder.subscribe();

        // Must not panic or error; the entry comes back and the
        // notification still fires.
        let entry = recorder.log_login("u1", Some("10.0.0.1"), None).await;
        assert_eq!(entry.event.action, AuditAction::Login);
        assert_eq!(rx.recv().await.unwrap().id, entry.id);
    }

    #[tokio::test]
    async fn test_failed_login_masks_email() {
        let h = harness();
        let entry = h
            .recorder
            .log_failed_login("ab@example.com", Some("10.0.0.1"), Some("curl/8.0"))
            .await;

        let stored = entry.event.details["email"].as_str().unwrap();
        assert!(stored.ends_with("@example.com"));
        assert_ne!(stored, "ab@example.com");
        assert!(!entry.event.success);
        assert_eq!(entry.event.action, AuditAction::LoginFailed);
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("ab@example.com"), "a***b@example.com");
        assert_eq!(mask_email("alice@example.com"), "a***e@example.com");
        assert_eq!(mask_email("x@example.com"), "x***x@example.com");
        assert_eq!(mask_email("@example.com"), "***@example.com");
        assert_eq!(mask_email("not-an-email"), "n***l");
    }

    #[tokio::test]
    async fn test_security_alert_merges_details() {
        let h = harness();
        let entry = h
            .recorder
            .log_security_alert("u1", "MULTIPLE_LOGIN_FAILURES", json!({ "attempts": 6 }))
            .await;

        assert_eq!(entry.event.action, AuditAction::SecurityAlert);
        assert_eq!(entry.event.details["alert"], "MULTIPLE_LOGIN_FAILURES");
        assert_eq!(entry.event.details["attempts"], 6);
    }

    #[tokio::test]
    async fn test_query_logs_pagination_and_total() {
        let h = harness();
        for _ in 0..25 {
            h.recorder.log_login("u1", None, None).await;
        }
        h.recorder.log_login("u2", None, None).await;

        let page = h
            .recorder
            .query_logs(AuditFilter::new().user("u1").limit(10))
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 10);
        assert_eq!(page.total, 25);
        assert_eq!(page.limit, 10);
    }

    #[tokio::test]
    async fn test_query_logs_decrypts_page_ips() {
        let h = harness();
        h.recorder.log_login("u1", Some("198.51.100.7"), None).await;

        let page = h
            .recorder
            .query_logs(AuditFilter::new().user("u1"))
            .await
            .unwrap();
        assert_eq!(
            page.entries[0].event.ip_address.as_deref(),
            Some("198.51.100.7")
        );
    }

    #[tokio::test]
    async fn test_query_logs_surfaces_undecryptable_marker() {
        let h = harness();
        // Store an entry whose "encrypted" IP is garbage, bypassing the
        // recorder.
        h.store
            .append(AuditEntry {
                id: Uuid::new_v4(),
                timestamp: NOW,
                event: AuditEvent::new(AuditAction::Login, "session")
                    .with_user("u1")
                    .with_ip("corrupted-envelope"),
            })
            .await
            .unwrap();

        let page = h
            .recorder
            .query_logs(AuditFilter::new().user("u1"))
            .await
            .unwrap();
        assert_eq!(
            page.entries[0].event.ip_address.as_deref(),
            Some(UNDECRYPTABLE_MARKER)
        );
    }

    #[tokio::test]
    async fn test_user_activity_summary_windows() {
        let h = harness();
        // One entry now, one a day ago, one outside the 30-day window.
        h.recorder.log_login("u1", None, None).await;

        h.clock.set(NOW - SECONDS_PER_DAY);
        h.recorder.log_failed_login("u1@example.com", None, None).await;

        h.clock.set(NOW - 31 * SECONDS_PER_DAY);
        h.recorder.log_login("u1", None, None).await;

        h.clock.set(NOW);
        let summary = h
            .recorder
            .user_activity_summary("u1", DEFAULT_ACTIVITY_WINDOW_DAYS)
            .await
            .unwrap();

        // log_failed_login carries no user id, so only the in-window login
        // counts for u1.
        assert_eq!(summary.total_events, 1);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.last_activity, Some(NOW));
    }

    #[tokio::test]
    async fn test_archive_is_advisory_only() {
        let h = harness();
        h.clock.set(NOW - 100 * SECONDS_PER_DAY);
        h.recorder.log_login("u1", None, None).await;
        h.clock.set(NOW - 10 * SECONDS_PER_DAY);
        h.recorder.log_login("u1", None, None).await;
        h.clock.set(NOW);

        let candidates = h
            .recorder
            .archive_old_logs(DEFAULT_RETENTION_DAYS)
            .await
            .unwrap();
        assert_eq!(candidates, 1);

        // Nothing was deleted.
        let page = h
            .recorder
            .query_logs(AuditFilter::new().user("u1"))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_compliance_report_over_window() {
        let h = harness();
        h.recorder.log_login("u1", None, None).await;
        h.recorder
            .log_data_access("u1", AuditAction::DataRead, "patients", Some("p1"), Value::Null)
            .await;
        h.recorder
            .log_security_alert("u2", "EXCESSIVE_API_USAGE", Value::Null)
            .await;

        let report = h
            .recorder
            .compliance_report(NOW - 3600, NOW + 3600)
            .await
            .unwrap();
        assert_eq!(report.total_events, 3);
        assert_eq!(report.events_by_user["u1"][&AuditAction::Login], 1);
        assert_eq!(report.security_events[&AuditAction::SecurityAlert], 1);
        assert_eq!(report.data_access_events[&AuditAction::DataRead], 1);
    }
}
