//! Persistence collaborator for audit entries.
//!
//! The recorder only ever appends; queries are the read side used by the
//! anomaly detector and compliance reporting. Durability is the store
//! implementation's concern, not specified here.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::VecDeque;
use uuid::Uuid;

use crate::entry::{AuditAction, AuditEntry};
use crate::error::{AuditError, Result};

/// Default number of entries retained by the in-memory store.
const MAX_ENTRIES: usize = 100_000;

/// Filter for querying audit entries.
///
/// The timestamp range is half-open: `from` inclusive, `to` exclusive.
/// `limit`/`offset` apply to the returned page only; counting ignores them.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Filter by principal id.
    pub user_id: Option<String>,
    /// Filter by action kind.
    pub action: Option<AuditAction>,
    /// Filter by resource name.
    pub resource: Option<String>,
    /// Filter by success flag.
    pub success: Option<bool>,
    /// Minimum timestamp (inclusive).
    pub from: Option<u64>,
    /// Maximum timestamp (exclusive).
    pub to: Option<u64>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

impl AuditFilter {
    /// Creates an empty filter matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by principal.
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Filters by action kind.
    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Filters by resource name.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Filters by success flag.
    pub fn success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    /// Filters by half-open timestamp range `[from, to)`.
    pub fn between(mut self, from: u64, to: u64) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Filters by minimum timestamp (inclusive).
    pub fn since(mut self, from: u64) -> Self {
        self.from = Some(from);
        self
    }

    /// Filters by maximum timestamp (exclusive).
    pub fn before(mut self, to: u64) -> Self {
        self.to = Some(to);
        self
    }

    /// Sets the page size.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the page offset.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether an entry matches the non-pagination criteria.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(ref user_id) = self.user_id {
            if entry.event.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        if let Some(action) = self.action {
            if entry.event.action != action {
                return false;
            }
        }
        if let Some(ref resource) = self.resource {
            if entry.event.resource != *resource {
                return false;
            }
        }
        if let Some(success) = self.success {
            if entry.event.success != success {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.timestamp >= to {
                return false;
            }
        }
        true
    }
}

/// Append-capable, queryable store for audit entries.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Appends one entry. Entries are never updated or deleted through this
    /// trait.
    async fn append(&self, entry: AuditEntry) -> Result<()>;

    /// Returns matching entries, newest first, honoring `limit`/`offset`.
    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>>;

    /// Counts matching entries independently of pagination.
    async fn count(&self, filter: &AuditFilter) -> Result<u64>;

    /// Looks up a single entry by id.
    async fn get(&self, id: Uuid) -> Result<AuditEntry> {
        let all = self.query(&AuditFilter::new()).await?;
        all.into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| AuditError::NotFound(id.to_string()))
    }
}

/// Thread-safe in-memory audit store.
///
/// Used as the test collaborator and for single-process deployments; bounded
/// so an abusive caller cannot exhaust memory.
#[derive(Debug)]
pub struct MemoryAuditStore {
    entries: RwLock<VecDeque<AuditEntry>>,
    max_entries: usize,
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuditStore {
    /// Creates a store with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(MAX_ENTRIES)
    }

    /// Creates a store bounded at `max_entries`.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries,
        }
    }

    /// Returns the total number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        let mut entries = self.entries.write();
        // Drop oldest entries if at capacity
        while entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let entries = self.entries.read();
        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);

        Ok(entries
            .iter()
            .rev() // newest first
            .filter(|e| filter.matches(e))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &AuditFilter) -> Result<u64> {
        let entries = self.entries.read();
        Ok(entries.iter().filter(|e| filter.matches(e)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditEvent;

    fn entry(user: &str, action: AuditAction, timestamp: u64) -> AuditEntry {
        AuditEntry {
            id: Uuid::new_v4(),
            timestamp,
            event: AuditEvent::new(action, "resource").with_user(user),
        }
    }

    #[tokio::test]
    async fn test_append_and_query_newest_first() {
        let store = MemoryAuditStore::new();
        store.append(entry("u1", AuditAction::Login, 100)).await.unwrap();
        store.append(entry("u1", AuditAction::Logout, 200)).await.unwrap();

        let results = store.query(&AuditFilter::new()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].timestamp, 200);
        assert_eq!(results[1].timestamp, 100);
    }

    #[tokio::test]
    async fn test_filter_by_user_and_action() {
        let store = MemoryAuditStore::new();
        store.append(entry("u1", AuditAction::Login, 100)).await.unwrap();
        store.append(entry("u2", AuditAction::Login, 101)).await.unwrap();
        store.append(entry("u1", AuditAction::LoginFailed, 102)).await.unwrap();

        let results = store
            .query(&AuditFilter::new().user("u1").action(AuditAction::Login))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].timestamp, 100);
    }

    #[tokio::test]
    async fn test_half_open_time_range() {
        let store = MemoryAuditStore::new();
        for ts in [100, 200, 300] {
            store.append(entry("u1", AuditAction::Login, ts)).await.unwrap();
        }

        let results = store
            .query(&AuditFilter::new().between(100, 300))
            .await
            .unwrap();
        assert_eq!(results.len(), 2); // 300 excluded, 100 included
        assert!(results.iter().all(|e| e.timestamp < 300));
    }

    #[tokio::test]
    async fn test_count_ignores_pagination() {
        let store = MemoryAuditStore::new();
        for ts in 0..10 {
            store.append(entry("u1", AuditAction::Login, ts)).await.unwrap();
        }

        let filter = AuditFilter::new().user("u1").limit(3).offset(2);
        let page = store.query(&filter).await.unwrap();
        let total = store.count(&filter).await.unwrap();

        assert_eq!(page.len(), 3);
        assert_eq!(total, 10);
    }

    #[tokio::test]
    async fn test_capacity_bound_drops_oldest() {
        let store = MemoryAuditStore::with_capacity(5);
        for ts in 0..10 {
            store.append(entry("u1", AuditAction::Login, ts)).await.unwrap();
        }

        assert_eq!(store.len(), 5);
        let results = store.query(&AuditFilter::new()).await.unwrap();
        assert_eq!(results[0].timestamp, 9);
        assert_eq!(results[4].timestamp, 5);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let store = MemoryAuditStore::new();
        let e = entry("u1", AuditAction::Login, 100);
        let id = e.id;
        store.append(e).await.unwrap();

        let found = store.get(id).await.unwrap();
        assert_eq!(found.id, id);

        let missing = store.get(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(AuditError::NotFound(_))));
    }
}
