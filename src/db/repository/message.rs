use std::str::FromStr;
use std::sync::Arc;

use uuid::Uuid;

use crate::audit::AuditSink;
use crate::cache::Cache;
use crate::db::engine::{parse_stamp, Order, Predicate, Query, Record, StorageEngine, TIMESTAMP_FORMAT};
use crate::db::DatabaseError;
use crate::events::{ChangeOp, EventBus};
use crate::models::enums::MessageStatus;
use crate::models::Message;

use super::parse_uuid;

const TABLE: &str = "messages";

pub struct MessageRepository {
    engine: Arc<StorageEngine>,
    cache: Arc<Cache>,
    audit: Arc<AuditSink>,
    events: EventBus,
}

impl MessageRepository {
    pub(crate) fn new(
        engine: Arc<StorageEngine>,
        cache: Arc<Cache>,
        audit: Arc<AuditSink>,
        events: EventBus,
    ) -> Self {
        Self {
            engine,
            cache,
            audit,
            events,
        }
    }

    pub fn send(&self, actor: &str, message: &Message) -> Result<Uuid, DatabaseError> {
        let id = message.id.to_string();
        self.engine.insert(TABLE, &message_to_record(message))?;
        self.cache.invalidate_conversation(&message.conversation_id);
        self.audit.record_mutation(actor, "message_sent", &id)?;
        self.events.publish(TABLE, ChangeOp::Created, &id);
        Ok(message.id)
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<Message>, DatabaseError> {
        self.engine
            .query_by_id(TABLE, &id.to_string())?
            .map(|r| message_from_record(&r))
            .transpose()
    }

    /// Messages of one conversation, oldest first. Served from the cache
    /// unless `force_refresh` is set.
    pub fn conversation(
        &self,
        conversation_id: &str,
        force_refresh: bool,
    ) -> Result<Arc<Vec<Message>>, DatabaseError> {
        self.cache.conversation(conversation_id, force_refresh, || {
            let records = self.engine.query(
                TABLE,
                &Query::filtered(Predicate::eq(
                    "conversation_id",
                    conversation_id.to_string(),
                ))
                .ordered(Order::asc("timestamp")),
            )?;
            records.iter().map(message_from_record).collect()
        })
    }

    pub fn update_status(
        &self,
        actor: &str,
        id: &Uuid,
        status: MessageStatus,
    ) -> Result<usize, DatabaseError> {
        let id = id.to_string();
        // Fetch first so we know which conversation to drop from the cache.
        let existing = self.engine.query_by_id(TABLE, &id)?;
        let affected = self.engine.update(
            TABLE,
            &id,
            &Record::new().with("status", status.as_str().to_string()),
        )?;
        if affected > 0 {
            if let Some(record) = existing {
                self.cache
                    .invalidate_conversation(&record.str_col("conversation_id")?);
            }
            self.audit
                .record_mutation(actor, "message_status_changed", &id)?;
            self.events.publish(TABLE, ChangeOp::Updated, &id);
        }
        Ok(affected)
    }

    pub fn delete(&self, actor: &str, id: &Uuid) -> Result<usize, DatabaseError> {
        let id = id.to_string();
        let existing = self.engine.query_by_id(TABLE, &id)?;
        let affected = self.engine.delete(TABLE, &id)?;
        if affected > 0 {
            if let Some(record) = existing {
                self.cache
                    .invalidate_conversation(&record.str_col("conversation_id")?);
            }
            self.audit.record_mutation(actor, "message_deleted", &id)?;
            self.events.publish(TABLE, ChangeOp::Deleted, &id);
        }
        Ok(affected)
    }
}

pub(crate) fn message_to_record(m: &Message) -> Record {
    Record::new()
        .with("id", m.id.to_string())
        .with("conversation_id", m.conversation_id.clone())
        .with("sender_id", m.sender_id.clone())
        .with("referral_id", m.referral_id.map(|id| id.to_string()))
        .with("content", m.content.clone())
        .with("timestamp", m.timestamp.format(TIMESTAMP_FORMAT).to_string())
        .with("status", m.status.as_str().to_string())
}

pub(crate) fn message_from_record(r: &Record) -> Result<Message, DatabaseError> {
    Ok(Message {
        id: parse_uuid(&r.str_col("id")?)?,
        conversation_id: r.str_col("conversation_id")?,
        sender_id: r.str_col("sender_id")?,
        referral_id: r
            .opt_str_col("referral_id")?
            .as_deref()
            .map(parse_uuid)
            .transpose()?,
        content: r.str_col("content")?,
        timestamp: parse_stamp(&r.str_col("timestamp")?)?,
        status: MessageStatus::from_str(&r.str_col("status")?)?,
    })
}
