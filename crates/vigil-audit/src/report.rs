//! Read-side aggregates: query pages, activity summaries, compliance
//! reports.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::entry::{AuditAction, AuditEntry};

/// One page of query results plus the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    /// Entries for this page, newest first, with IPs decrypted.
    pub entries: Vec<AuditEntry>,
    /// Total matching entries, computed independently of pagination.
    pub total: u64,
    /// Page size used.
    pub limit: usize,
    /// Offset used.
    pub offset: usize,
}

/// Per-principal activity over a trailing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySummary {
    /// The principal summarized.
    pub user_id: String,
    /// Window length in days.
    pub window_days: u32,
    /// Total entries in the window.
    pub total_events: u64,
    /// Entries with `success == true`.
    pub success_count: u64,
    /// Entries with `success == false`.
    pub failure_count: u64,
    /// Counts per action kind.
    pub actions: HashMap<AuditAction, u64>,
    /// Counts per UTC calendar day, keyed `YYYY-MM-DD`. The day boundary is
    /// derived from the entry's stored timestamp, not wall-clock at query
    /// time.
    pub events_by_day: BTreeMap<String, u64>,
    /// Timestamp of the most recent entry in the window.
    pub last_activity: Option<u64>,
}

impl ActivitySummary {
    /// Builds a summary from entries already filtered to one principal and
    /// window.
    pub fn from_entries(
        user_id: impl Into<String>,
        window_days: u32,
        entries: &[AuditEntry],
    ) -> Self {
        let mut summary = Self {
            user_id: user_id.into(),
            window_days,
            total_events: 0,
            success_count: 0,
            failure_count: 0,
            actions: HashMap::new(),
            events_by_day: BTreeMap::new(),
            last_activity: None,
        };

        for entry in entries {
            summary.total_events += 1;
            if entry.event.success {
                summary.success_count += 1;
            } else {
                summary.failure_count += 1;
            }
            *summary.actions.entry(entry.event.action).or_insert(0) += 1;
            *summary
                .events_by_day
                .entry(day_key(entry.timestamp))
                .or_insert(0) += 1;
            summary.last_activity = summary.last_activity.max(Some(entry.timestamp));
        }

        summary
    }
}

/// Aggregated audit activity over a reporting window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Window start (inclusive), unix seconds.
    pub period_start: u64,
    /// Window end (exclusive), unix seconds.
    pub period_end: u64,
    /// When the report was generated, unix seconds.
    pub generated_at: u64,
    /// Total entries in the window.
    pub total_events: u64,
    /// Per-principal counts per action kind. Entries without a principal
    /// aggregate under `"anonymous"`.
    pub events_by_user: BTreeMap<String, HashMap<AuditAction, u64>>,
    /// Security-event counts by kind.
    pub security_events: HashMap<AuditAction, u64>,
    /// Data-access counts by kind.
    pub data_access_events: HashMap<AuditAction, u64>,
}

impl ComplianceReport {
    /// Builds a report in a single pass over the window's entries.
    pub fn from_entries(
        period_start: u64,
        period_end: u64,
        generated_at: u64,
        entries: &[AuditEntry],
    ) -> Self {
        let mut report = Self {
            period_start,
            period_end,
            generated_at,
            total_events: 0,
            events_by_user: BTreeMap::new(),
            security_events: HashMap::new(),
            data_access_events: HashMap::new(),
        };

        for entry in entries {
            report.total_events += 1;

            let user = entry
                .event
                .user_id
                .clone()
                .unwrap_or_else(|| "anonymous".to_string());
            *report
                .events_by_user
                .entry(user)
                .or_default()
                .entry(entry.event.action)
                .or_insert(0) += 1;

            if entry.event.action.is_security_event() {
                *report.security_events.entry(entry.event.action).or_insert(0) += 1;
            }
            if entry.event.action.is_data_access() {
                *report
                    .data_access_events
                    .entry(entry.event.action)
                    .or_insert(0) += 1;
            }
        }

        report
    }
}

/// UTC calendar-day key for a unix timestamp.
fn day_key(timestamp: u64) -> String {
    DateTime::from_timestamp(timestamp as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "invalid".to_string())
}
