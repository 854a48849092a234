//! Audit entry model and the closed action taxonomy.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kinds of security-relevant actions that can be audited.
///
/// This is a closed set: extend it by adding new variants, never by
/// overloading existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Authentication events
    /// Successful login.
    Login,
    /// User logout.
    Logout,
    /// Failed login attempt.
    LoginFailed,
    /// Password changed by the user.
    PasswordChange,
    /// Password reset flow completed.
    PasswordReset,
    /// Multi-factor authentication enabled.
    MfaEnabled,
    /// Multi-factor authentication disabled.
    MfaDisabled,

    // Data access events
    /// Record read.
    DataRead,
    /// Record created.
    DataCreate,
    /// Record updated.
    DataUpdate,
    /// Record deleted.
    DataDelete,
    /// Bulk export of records.
    DataExport,

    // User management events
    /// User account created.
    UserCreate,
    /// User account updated.
    UserUpdate,
    /// User account deleted.
    UserDelete,
    /// User account suspended.
    UserSuspend,
    /// User account re-activated.
    UserActivate,

    // Permission events
    /// Permission granted.
    PermissionGrant,
    /// Permission revoked.
    PermissionRevoke,
    /// Role assigned to a user.
    RoleAssign,
    /// Role removed from a user.
    RoleRemove,

    // API access events
    /// API key created.
    ApiKeyCreate,
    /// API key revoked.
    ApiKeyRevoke,
    /// Generic API access.
    ApiAccess,
    /// API request ended in an error.
    ApiError,

    // Integration events
    /// Third-party integration connected.
    IntegrationConnect,
    /// Third-party integration disconnected.
    IntegrationDisconnect,
    /// Integration data sync performed.
    IntegrationSync,

    // Security events
    /// Security alert raised by the anomaly detector.
    SecurityAlert,
    /// Suspicious activity observed.
    SuspiciousActivity,
    /// Access denied by policy.
    AccessDenied,
}

impl AuditAction {
    /// Returns the severity level of this action.
    pub fn severity(&self) -> AuditSeverity {
        match self {
            AuditAction::SecurityAlert
            | AuditAction::SuspiciousActivity
            | AuditAction::UserDelete
            | AuditAction::DataExport => AuditSeverity::Critical,

            AuditAction::LoginFailed
            | AuditAction::AccessDenied
            | AuditAction::PasswordChange
            | AuditAction::PasswordReset
            | AuditAction::MfaDisabled
            | AuditAction::PermissionRevoke
            | AuditAction::RoleRemove
            | AuditAction::ApiKeyRevoke
            | AuditAction::ApiError
            | AuditAction::UserSuspend
            | AuditAction::DataDelete => AuditSeverity::High,

            AuditAction::Login
            | AuditAction::Logout
            | AuditAction::MfaEnabled
            | AuditAction::PermissionGrant
            | AuditAction::RoleAssign
            | AuditAction::UserCreate
            | AuditAction::UserUpdate
            | AuditAction::UserActivate
            | AuditAction::ApiKeyCreate
            | AuditAction::DataCreate
            | AuditAction::DataUpdate
            | AuditAction::IntegrationConnect
            | AuditAction::IntegrationDisconnect => AuditSeverity::Medium,

            AuditAction::DataRead
            | AuditAction::ApiAccess
            | AuditAction::IntegrationSync => AuditSeverity::Low,
        }
    }

    /// Whether this action belongs to the security-event group.
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            AuditAction::SecurityAlert
                | AuditAction::SuspiciousActivity
                | AuditAction::AccessDenied
        )
    }

    /// Whether this action belongs to the data-access group.
    pub fn is_data_access(&self) -> bool {
        matches!(
            self,
            AuditAction::DataRead
                | AuditAction::DataCreate
                | AuditAction::DataUpdate
                | AuditAction::DataDelete
                | AuditAction::DataExport
        )
    }

    /// Maps an HTTP verb to the corresponding data-access action, with
    /// [`AuditAction::ApiAccess`] as the fallback for anything else.
    pub fn from_http_method(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" => AuditAction::DataRead,
            "POST" => AuditAction::DataCreate,
            "PUT" | "PATCH" => AuditAction::DataUpdate,
            "DELETE" => AuditAction::DataDelete,
            _ => AuditAction::ApiAccess,
        }
    }
}

/// Severity levels for audit actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    /// Low severity - informational events.
    Low = 0,
    /// Medium severity - notable events.
    Medium = 1,
    /// High severity - security-relevant events.
    High = 2,
    /// Critical severity - immediate attention required.
    Critical = 3,
}

/// An audit event as handed to the recorder, before sanitization and
/// storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Principal who triggered the event, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Kind of action performed.
    pub action: AuditAction,
    /// Resource the action targeted.
    pub resource: String,
    /// Identifier of the specific resource instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Structured detail map. Sanitized by the recorder before storage.
    #[serde(default)]
    pub details: Value,
    /// Plaintext source IP. Encrypted by the recorder before storage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// User agent of the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Whether the action succeeded.
    pub success: bool,
}

impl AuditEvent {
    /// Creates a new successful event.
    pub fn new(action: AuditAction, resource: impl Into<String>) -> Self {
        Self {
            user_id: None,
            action,
            resource: resource.into(),
            resource_id: None,
            details: Value::Null,
            ip_address: None,
            user_agent: None,
            success: true,
        }
    }

    /// Sets the principal.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the resource instance id.
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Sets the detail map.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Sets the source IP address.
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Marks the event as failed.
    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

/// One immutable, stored audit entry.
///
/// Append-only: no update or delete is exposed on the happy path. The
/// detail map is sanitized and the IP encrypted before construction, so an
/// entry never needs re-sanitization before display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry id.
    pub id: Uuid,
    /// Unix timestamp (seconds) when the event occurred.
    pub timestamp: u64,
    /// The recorded event. `ip_address` holds the encrypted envelope here.
    #[serde(flatten)]
    pub event: AuditEvent,
}

impl AuditEntry {
    /// Returns the severity of this entry.
    pub fn severity(&self) -> AuditSeverity {
        self.event.action.severity()
    }
}
