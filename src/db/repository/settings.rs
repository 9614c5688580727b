use std::sync::Arc;

use crate::db::engine::{Record, StorageEngine};
use crate::db::DatabaseError;

const TABLE: &str = "app_settings";

/// Key/value application settings. Keys are the row ids, so writes are
/// plain upserts through the engine.
pub struct SettingsRepository {
    engine: Arc<StorageEngine>,
}

impl SettingsRepository {
    pub(crate) fn new(engine: Arc<StorageEngine>) -> Self {
        Self { engine }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        self.engine
            .query_by_id(TABLE, key)?
            .map(|r| r.str_col("value"))
            .transpose()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.engine.insert(
            TABLE,
            &Record::new()
                .with("id", key.to_string())
                .with("value", value.to_string()),
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<usize, DatabaseError> {
        self.engine.delete(TABLE, key)
    }
}
