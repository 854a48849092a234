//! Live notification of recorded audit entries.
//!
//! A broadcast channel in the same shape as the realtime event hub: the
//! recorder publishes fire-and-forget, subscribers come and go freely, and a
//! lagging or absent subscriber never blocks a write.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::entry::{AuditAction, AuditEntry};

/// Capacity of the broadcast channel.
const BROADCAST_CAPACITY: usize = 1024;

/// Notification emitted after an audit entry is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecorded {
    /// Id of the stored entry.
    pub id: Uuid,
    /// Action kind.
    pub action: AuditAction,
    /// Principal, if known.
    pub user_id: Option<String>,
    /// Whether the audited action succeeded.
    pub success: bool,
}

impl From<&AuditEntry> for AuditRecorded {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            id: entry.id,
            action: entry.event.action,
            user_id: entry.event.user_id.clone(),
            success: entry.event.success,
        }
    }
}

/// Publisher side of the recorded-entry channel.
#[derive(Debug, Clone)]
pub struct AuditNotifier {
    tx: broadcast::Sender<AuditRecorded>,
}

impl Default for AuditNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditNotifier {
    /// Creates a notifier with default capacity.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Subscribes a live monitor.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditRecorded> {
        self.tx.subscribe()
    }

    /// Publishes a notification. A send error only means there are no
    /// subscribers, which is fine.
    pub fn publish(&self, notice: AuditRecorded) {
        let _ = self.tx.send(notice);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditEvent;

    #[tokio::test]
    async fn test_subscriber_receives_notice() {
        let notifier = AuditNotifier::new();
        let mut rx = notifier.subscribe();

        let entry = AuditEntry {
            id: Uuid::new_v4(),
            timestamp: 100,
            event: AuditEvent::new(AuditAction::Login, "session").with_user("u1"),
        };
        notifier.publish(AuditRecorded::from(&entry));

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.id, entry.id);
        assert_eq!(notice.action, AuditAction::Login);
        assert_eq!(notice.user_id.as_deref(), Some("u1"));
        assert!(notice.success);
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let notifier = AuditNotifier::new();
        assert_eq!(notifier.subscriber_count(), 0);
        notifier.publish(AuditRecorded {
            id: Uuid::new_v4(),
            action: AuditAction::Logout,
            user_id: None,
            success: true,
        });
    }
}
