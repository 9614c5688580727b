use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::info;

use crate::audit::AuditSink;
use crate::cache::Cache;
use crate::db::engine::StorageEngine;
use crate::db::repository::{
    dashboard_stats, AdminRepository, CarePlanRepository, ConsentRepository, MessageRepository,
    PatientRepository, ReferralRepository, SettingsRepository, SpecialistRepository,
    SyncQueueRepository,
};
use crate::db::sqlite::{open_database, open_memory_database};
use crate::db::DatabaseError;
use crate::events::{EventBus, StoreEvent};
use crate::models::DashboardStats;

/// The top-level handle. Owns the storage engine, the cache tier, the
/// audit sink and the event bus; repositories are cheap views over those
/// shared handles.
pub struct CareStore {
    engine: Arc<StorageEngine>,
    cache: Arc<Cache>,
    audit: Arc<AuditSink>,
    events: EventBus,
    /// None for in-memory stores, which cannot be backed up.
    path: Option<PathBuf>,
}

impl CareStore {
    /// Open (or create) the store at `path` and bring the schema up to
    /// the current version.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = open_database(path)?;
        info!(path = %path.display(), "store opened");
        Ok(Self::assemble(conn, Some(path.to_path_buf())))
    }

    /// Fully in-memory store, used by tests and previews. `backup` and
    /// `restore` are unavailable on it.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = open_memory_database()?;
        Ok(Self::assemble(conn, None))
    }

    fn assemble(conn: rusqlite::Connection, path: Option<PathBuf>) -> Self {
        let engine = Arc::new(StorageEngine::new(conn));
        Self {
            cache: Arc::new(Cache::new()),
            audit: Arc::new(AuditSink::new(engine.clone())),
            events: EventBus::new(),
            engine,
            path,
        }
    }

    // ── Repositories ────────────────────────────────────────

    pub fn patients(&self) -> PatientRepository {
        PatientRepository::new(
            self.engine.clone(),
            self.cache.clone(),
            self.audit.clone(),
            self.events.clone(),
        )
    }

    pub fn specialists(&self) -> SpecialistRepository {
        SpecialistRepository::new(
            self.engine.clone(),
            self.cache.clone(),
            self.audit.clone(),
            self.events.clone(),
        )
    }

    pub fn referrals(&self) -> ReferralRepository {
        ReferralRepository::new(
            self.engine.clone(),
            self.cache.clone(),
            self.audit.clone(),
            self.events.clone(),
        )
    }

    pub fn messages(&self) -> MessageRepository {
        MessageRepository::new(
            self.engine.clone(),
            self.cache.clone(),
            self.audit.clone(),
            self.events.clone(),
        )
    }

    pub fn consents(&self) -> ConsentRepository {
        ConsentRepository::new(self.engine.clone(), self.audit.clone(), self.events.clone())
    }

    pub fn care_plans(&self) -> CarePlanRepository {
        CarePlanRepository::new(self.engine.clone(), self.audit.clone(), self.events.clone())
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.engine.clone())
    }

    pub fn sync_queue(&self) -> SyncQueueRepository {
        SyncQueueRepository::new(self.engine.clone())
    }

    pub fn admin(&self) -> AdminRepository {
        AdminRepository::new(self.engine.clone(), self.audit.clone(), self.events.clone())
    }

    pub fn audit(&self) -> Arc<AuditSink> {
        self.audit.clone()
    }

    // ── Store-level operations ──────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats, DatabaseError> {
        dashboard_stats(&self.engine)
    }

    /// Copy the database file to a timestamped sibling and return its
    /// path. The connection lock is held for the duration of the copy so
    /// no write can interleave.
    pub fn backup(&self) -> Result<PathBuf, DatabaseError> {
        let path = self.path.as_deref().ok_or_else(in_memory_error)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("store");
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let target = path.with_file_name(format!("{stem}-backup-{stamp}.db"));

        self.engine.with_conn(|_conn| {
            std::fs::copy(path, &target)?;
            Ok(())
        })?;
        info!(backup = %target.display(), "backup written");
        Ok(target)
    }

    /// Replace the live database with the contents of `backup`. The old
    /// connection is dropped before the file is overwritten, then the
    /// store reopens and the cache is flushed.
    pub fn restore(&self, backup: &Path) -> Result<(), DatabaseError> {
        let path = self.path.clone().ok_or_else(in_memory_error)?;
        if !backup.is_file() {
            return Err(DatabaseError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("backup not found: {}", backup.display()),
            )));
        }

        let backup = backup.to_path_buf();
        self.engine.replace_connection(move || {
            std::fs::copy(&backup, &path)?;
            open_database(&path)
        })?;
        self.cache.clear();
        info!("store restored from backup");
        Ok(())
    }
}

fn in_memory_error() -> DatabaseError {
    DatabaseError::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "in-memory stores cannot be backed up or restored",
    ))
}
