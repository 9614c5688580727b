use std::sync::Arc;

use uuid::Uuid;

use crate::audit::AuditSink;
use crate::db::engine::{Clause, Predicate, Query, Record, StorageEngine};
use crate::db::DatabaseError;
use crate::events::{ChangeOp, EventBus};
use crate::models::{FeatureFlag, Notification};

use super::parse_uuid;

const FLAGS_TABLE: &str = "feature_flags";
const NOTIFICATIONS_TABLE: &str = "notifications";

/// Feature flags and user notifications.
pub struct AdminRepository {
    engine: Arc<StorageEngine>,
    audit: Arc<AuditSink>,
    events: EventBus,
}

impl AdminRepository {
    pub(crate) fn new(engine: Arc<StorageEngine>, audit: Arc<AuditSink>, events: EventBus) -> Self {
        Self {
            engine,
            audit,
            events,
        }
    }

    /// Upsert a feature flag. Unknown flags read as disabled.
    pub fn set_flag(&self, actor: &str, flag: &FeatureFlag) -> Result<(), DatabaseError> {
        self.engine.insert(
            FLAGS_TABLE,
            &Record::new()
                .with("id", flag.name.clone())
                .with("enabled", i64::from(flag.enabled))
                .with("description", flag.description.clone()),
        )?;
        self.audit
            .record_mutation(actor, "feature_flag_set", &flag.name)?;
        self.events
            .publish(FLAGS_TABLE, ChangeOp::Updated, &flag.name);
        Ok(())
    }

    pub fn flag_enabled(&self, name: &str) -> Result<bool, DatabaseError> {
        match self.engine.query_by_id(FLAGS_TABLE, name)? {
            Some(record) => record.bool_col("enabled"),
            None => Ok(false),
        }
    }

    pub fn flags(&self) -> Result<Vec<FeatureFlag>, DatabaseError> {
        let records = self.engine.query(FLAGS_TABLE, &Query::default())?;
        records.iter().map(flag_from_record).collect()
    }

    pub fn notify(&self, notification: &Notification) -> Result<Uuid, DatabaseError> {
        let id = notification.id.to_string();
        self.engine.insert(
            NOTIFICATIONS_TABLE,
            &Record::new()
                .with("id", id.clone())
                .with("user_id", notification.user_id.clone())
                .with("title", notification.title.clone())
                .with("body", notification.body.clone())
                .with("read", i64::from(notification.read)),
        )?;
        self.events.publish(NOTIFICATIONS_TABLE, ChangeOp::Created, &id);
        Ok(notification.id)
    }

    pub fn unread_for(&self, user_id: &str) -> Result<Vec<Notification>, DatabaseError> {
        let records = self.engine.query(
            NOTIFICATIONS_TABLE,
            &Query::filtered(Predicate::all(vec![
                Clause::eq("user_id", user_id.to_string()),
                Clause::eq("read", 0_i64),
            ])),
        )?;
        records.iter().map(notification_from_record).collect()
    }

    pub fn mark_read(&self, id: &Uuid) -> Result<usize, DatabaseError> {
        let id = id.to_string();
        let affected = self.engine.update(
            NOTIFICATIONS_TABLE,
            &id,
            &Record::new().with("read", 1_i64),
        )?;
        if affected > 0 {
            self.events.publish(NOTIFICATIONS_TABLE, ChangeOp::Updated, &id);
        }
        Ok(affected)
    }
}

fn flag_from_record(r: &Record) -> Result<FeatureFlag, DatabaseError> {
    Ok(FeatureFlag {
        name: r.str_col("id")?,
        enabled: r.bool_col("enabled")?,
        description: r.opt_str_col("description")?,
    })
}

fn notification_from_record(r: &Record) -> Result<Notification, DatabaseError> {
    Ok(Notification {
        id: parse_uuid(&r.str_col("id")?)?,
        user_id: r.str_col("user_id")?,
        title: r.str_col("title")?,
        body: r.opt_str_col("body")?,
        read: r.bool_col("read")?,
    })
}
