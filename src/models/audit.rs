use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AuditEventType, AuditSeverity};

/// One appended audit row. Immutable once written; no update or delete
/// surface exists for the audit table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user_id: String,
    pub action: String,
    pub resource: String,
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    pub timestamp: NaiveDateTime,
}

/// A raised anomaly: the sliding-window check crossed its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditViolation {
    pub user_id: String,
    pub rule: String,
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    pub in_window_count: i64,
}
