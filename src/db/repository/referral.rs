use std::str::FromStr;
use std::sync::Arc;

use uuid::Uuid;

use crate::audit::AuditSink;
use crate::cache::Cache;
use crate::db::engine::{BatchOp, Clause, Page, Predicate, Query, Record, StorageEngine};
use crate::db::DatabaseError;
use crate::events::{ChangeOp, EventBus};
use crate::models::enums::{ReferralStatus, UrgencyLevel};
use crate::models::{Message, Referral, ReferralFilter};

use super::message::message_to_record;
use super::parse_uuid;

const TABLE: &str = "referrals";

pub struct ReferralRepository {
    engine: Arc<StorageEngine>,
    cache: Arc<Cache>,
    audit: Arc<AuditSink>,
    events: EventBus,
}

impl ReferralRepository {
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

    /// Create a referral, optionally with its opening message. When a
    /// message accompanies the referral both rows go through one batch
    /// transaction — they land together or not at all.
    ///
    /// The consultation fee is denormalized from the specialist at
    /// creation unless the caller already set one.
    pub fn create(
        &self,
        actor: &str,
        referral: &Referral,
        initial_message: Option<&Message>,
    ) -> Result<Uuid, DatabaseError> {
        let mut referral = referral.clone();
        if referral.consultation_fee == 0.0 {
            if let Some(specialist_id) = referral.specialist_id {
                if let Some(rec) = self
                    .engine
                    .query_by_id("specialists", &specialist_id.to_string())?
                {
                    referral.consultation_fee = rec.f64_col("consultation_fee")?;
                }
            }
        }

        let id = referral.id.to_string();
        match initial_message {
            Some(message) => {
                let mut message = message.clone();
                message.referral_id = Some(referral.id);
                self.engine.batch(&[
                    BatchOp::insert(TABLE, referral_to_record(&referral)),
                    BatchOp::insert("messages", message_to_record(&message)),
                ])?;
                self.cache.invalidate_conversation(&message.conversation_id);
            }
            None => {
                self.engine.insert(TABLE, &referral_to_record(&referral))?;
            }
        }

        self.cache.invalidate_referrals();
        self.audit.record_mutation(actor, "referral_created", &id)?;
        self.events.publish(TABLE, ChangeOp::Created, &id);
        Ok(referral.id)
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<Referral>, DatabaseError> {
        self.engine
            .query_by_id(TABLE, &id.to_string())?
            .map(|r| referral_from_record(&r))
            .transpose()
    }

    pub fn get_by_tracking_number(
        &self,
        tracking_number: &str,
    ) -> Result<Option<Referral>, DatabaseError> {
        let mut records = self.engine.query(
            TABLE,
            &Query::filtered(Predicate::eq("tracking_number", tracking_number.to_string()))
                .limited(1),
        )?;
        records.pop().map(|r| referral_from_record(&r)).transpose()
    }

    pub fn update_status(
        &self,
        actor: &str,
        id: &Uuid,
        status: ReferralStatus,
    ) -> Result<usize, DatabaseError> {
        let id = id.to_string();
        let affected = self.engine.update(
            TABLE,
            &id,
            &Record::new().with("status", status.as_str().to_string()),
        )?;
        if affected > 0 {
            self.cache.invalidate_referrals();
            self.audit.record_mutation(actor, "referral_status_changed", &id)?;
            self.events.publish(TABLE, ChangeOp::Updated, &id);
        }
        Ok(affected)
    }

    pub fn delete(&self, actor: &str, id: &Uuid) -> Result<usize, DatabaseError> {
        let id = id.to_string();
        let affected = self.engine.delete(TABLE, &id)?;
        if affected > 0 {
            self.cache.invalidate_referrals();
            // Messages keep a nulled referral_id after the delete.
            self.cache.invalidate_conversations();
            self.audit.record_mutation(actor, "referral_deleted", &id)?;
            self.events.publish(TABLE, ChangeOp::Deleted, &id);
        }
        Ok(affected)
    }

    pub fn list(&self, force_refresh: bool) -> Result<Arc<Vec<Referral>>, DatabaseError> {
        self.cache.referrals(force_refresh, || {
            let records = self.engine.query(TABLE, &Query::default())?;
            records.iter().map(referral_from_record).collect()
        })
    }

    pub fn list_by_patient(&self, patient_id: &Uuid) -> Result<Vec<Referral>, DatabaseError> {
        let records = self.engine.query(
            TABLE,
            &Query::filtered(Predicate::eq("patient_id", patient_id.to_string())),
        )?;
        records.iter().map(referral_from_record).collect()
    }

    /// Filtered listing; every set field narrows the result. The composite
    /// indexes cover the common patient+status and status+urgency shapes.
    pub fn list_filtered(&self, filter: &ReferralFilter) -> Result<Vec<Referral>, DatabaseError> {
        let mut clauses = Vec::new();
        if let Some(patient_id) = filter.patient_id {
            clauses.push(Clause::eq("patient_id", patient_id.to_string()));
        }
        if let Some(specialist_id) = filter.specialist_id {
            clauses.push(Clause::eq("specialist_id", specialist_id.to_string()));
        }
        if let Some(status) = filter.status {
            clauses.push(Clause::eq("status", status.as_str().to_string()));
        }
        if let Some(urgency) = filter.urgency {
            clauses.push(Clause::eq("urgency", urgency.as_str().to_string()));
        }
        let query = if clauses.is_empty() {
            Query::default()
        } else {
            Query::filtered(Predicate::all(clauses))
        };
        let records = self.engine.query(TABLE, &query)?;
        records.iter().map(referral_from_record).collect()
    }

    pub fn list_by_status(&self, status: ReferralStatus) -> Result<Vec<Referral>, DatabaseError> {
        let records = self.engine.query(
            TABLE,
            &Query::filtered(Predicate::eq("status", status.as_str().to_string())),
        )?;
        records.iter().map(referral_from_record).collect()
    }

    pub fn paginate(&self, page: u32, page_size: u32) -> Result<Page<Referral>, DatabaseError> {
        self.engine
            .paginated_query(TABLE, None, None, page, page_size)?
            .try_map(|r| referral_from_record(&r))
    }
}

fn referral_to_record(r: &Referral) -> Record {
    Record::new()
        .with("id", r.id.to_string())
        .with("tracking_number", r.tracking_number.clone())
        .with("patient_id", r.patient_id.to_string())
        .with("specialist_id", r.specialist_id.map(|id| id.to_string()))
        .with("status", r.status.as_str().to_string())
        .with("urgency", r.urgency.as_str().to_string())
        .with("reason", r.reason.clone())
        .with("consultation_fee", r.consultation_fee)
}

pub(crate) fn referral_from_record(r: &Record) -> Result<Referral, DatabaseError> {
    Ok(Referral {
        id: parse_uuid(&r.str_col("id")?)?,
        tracking_number: r.str_col("tracking_number")?,
        patient_id: parse_uuid(&r.str_col("patient_id")?)?,
        specialist_id: r
            .opt_str_col("specialist_id")?
            .as_deref()
            .map(parse_uuid)
            .transpose()?,
        status: ReferralStatus::from_str(&r.str_col("status")?)?,
        urgency: UrgencyLevel::from_str(&r.str_col("urgency")?)?,
        reason: r.opt_str_col("reason")?,
        consultation_fee: r.f64_col("consultation_fee")?,
    })
}
