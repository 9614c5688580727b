use std::str::FromStr;
use std::sync::Arc;

use uuid::Uuid;

use crate::db::engine::{query_in, update_in, Order, Predicate, Query, Record, StorageEngine};
use crate::db::DatabaseError;
use crate::models::enums::SyncOperation;
use crate::models::SyncQueueEntry;

use super::parse_uuid;

const TABLE: &str = "sync_queue";

/// Outbound change queue. Entries are appended by callers and drained in
/// creation order; draining marks them synced so each entry is handed out
/// exactly once.
pub struct SyncQueueRepository {
    engine: Arc<StorageEngine>,
}

impl SyncQueueRepository {
    pub(crate) fn new(engine: Arc<StorageEngine>) -> Self {
        Self { engine }
    }

    pub fn enqueue(&self, entry: &SyncQueueEntry) -> Result<Uuid, DatabaseError> {
        self.engine.insert(TABLE, &entry_to_record(entry))?;
        Ok(entry.id)
    }

    /// Take up to `limit` unsynced entries, oldest first, marking them
    /// synced before returning. The read and the marks share one
    /// connection guard, so concurrent drainers serialize and no entry
    /// is ever handed out twice.
    pub fn take_pending(&self, limit: u32) -> Result<Vec<SyncQueueEntry>, DatabaseError> {
        self.engine.with_conn(|conn| {
            let records = query_in(
                conn,
                TABLE,
                &Query::filtered(Predicate::eq("synced", 0_i64))
                    .ordered(Order::asc("created_at"))
                    .limited(limit),
            )?;
            let entries: Vec<SyncQueueEntry> =
                records.iter().map(entry_from_record).collect::<Result<_, _>>()?;

            let mark = Record::new().with("synced", 1_i64);
            for entry in &entries {
                update_in(conn, TABLE, &entry.id.to_string(), &mark)?;
            }
            Ok(entries)
        })
    }

    pub fn pending_count(&self) -> Result<i64, DatabaseError> {
        self.engine
            .count(TABLE, Some(&Predicate::eq("synced", 0_i64)))
    }
}

fn entry_to_record(e: &SyncQueueEntry) -> Record {
    Record::new()
        .with("id", e.id.to_string())
        .with("table_name", e.table_name.clone())
        .with("record_id", e.record_id.clone())
        .with("operation", e.operation.as_str().to_string())
        .with("data", e.data.clone())
        .with("synced", i64::from(e.synced))
}

fn entry_from_record(r: &Record) -> Result<SyncQueueEntry, DatabaseError> {
    Ok(SyncQueueEntry {
        id: parse_uuid(&r.str_col("id")?)?,
        table_name: r.str_col("table_name")?,
        record_id: r.str_col("record_id")?,
        operation: SyncOperation::from_str(&r.str_col("operation")?)?,
        data: r.opt_str_col("data")?,
        synced: r.bool_col("synced")?,
    })
}
