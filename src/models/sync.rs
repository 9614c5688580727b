use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::SyncOperation;

/// A pending outbound change. Consumed exactly once: `take_pending` marks
/// entries synced in the same transaction that reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    pub id: Uuid,
    pub table_name: String,
    pub record_id: String,
    pub operation: SyncOperation,
    /// Serialized row payload (JSON), absent for deletes.
    pub data: Option<String>,
    pub synced: bool,
}

impl SyncQueueEntry {
    pub fn new(table_name: &str, record_id: &str, operation: SyncOperation) -> Self {
        Self {
            id: Uuid::new_v4(),
            table_name: table_name.to_string(),
            record_id: record_id.to_string(),
            operation,
            data: None,
            synced: false,
        }
    }
}
