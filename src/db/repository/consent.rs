use std::str::FromStr;
use std::sync::Arc;

use uuid::Uuid;

use crate::audit::AuditSink;
use crate::db::engine::{parse_stamp, Predicate, Query, Record, StorageEngine, TIMESTAMP_FORMAT};
use crate::db::DatabaseError;
use crate::events::{ChangeOp, EventBus};
use crate::models::enums::{ConsentStatus, ConsentType};
use crate::models::Consent;

use super::parse_uuid;

const TABLE: &str = "consents";

/// Consent status moves one way only: an active consent can be revoked,
/// a revoked one can never be re-activated.
pub struct ConsentRepository {
    engine: Arc<StorageEngine>,
    audit: Arc<AuditSink>,
    events: EventBus,
}

impl ConsentRepository {
    pub(crate) fn new(engine: Arc<StorageEngine>, audit: Arc<AuditSink>, events: EventBus) -> Self {
        Self {
            engine,
            audit,
            events,
        }
    }

    pub fn grant(&self, actor: &str, consent: &Consent) -> Result<Uuid, DatabaseError> {
        let id = consent.id.to_string();
        self.engine.insert(TABLE, &consent_to_record(consent))?;
        self.audit.record_mutation(actor, "consent_granted", &id)?;
        self.events.publish(TABLE, ChangeOp::Created, &id);
        Ok(consent.id)
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<Consent>, DatabaseError> {
        self.engine
            .query_by_id(TABLE, &id.to_string())?
            .map(|r| consent_from_record(&r))
            .transpose()
    }

    pub fn list_for_patient(&self, patient_id: &Uuid) -> Result<Vec<Consent>, DatabaseError> {
        let records = self.engine.query(
            TABLE,
            &Query::filtered(Predicate::eq("patient_id", patient_id.to_string())),
        )?;
        records.iter().map(consent_from_record).collect()
    }

    pub fn revoke(&self, actor: &str, id: &Uuid) -> Result<usize, DatabaseError> {
        self.update_status(actor, id, ConsentStatus::Revoked)
    }

    pub fn update_status(
        &self,
        actor: &str,
        id: &Uuid,
        status: ConsentStatus,
    ) -> Result<usize, DatabaseError> {
        let existing = self
            .get(id)?
            .ok_or_else(|| DatabaseError::NotFound {
                entity_type: "consent".to_string(),
                id: id.to_string(),
            })?;
        if existing.status == ConsentStatus::Revoked && status == ConsentStatus::Active {
            return Err(DatabaseError::ConstraintViolation(
                "a revoked consent cannot be re-activated".to_string(),
            ));
        }

        let id = id.to_string();
        let affected = self.engine.update(
            TABLE,
            &id,
            &Record::new().with("status", status.as_str().to_string()),
        )?;
        if affected > 0 {
            self.audit.record_mutation(actor, "consent_status_changed", &id)?;
            self.events.publish(TABLE, ChangeOp::Updated, &id);
        }
        Ok(affected)
    }
}

fn consent_to_record(c: &Consent) -> Record {
    Record::new()
        .with("id", c.id.to_string())
        .with("patient_id", c.patient_id.to_string())
        .with("consent_type", c.consent_type.as_str().to_string())
        .with("status", c.status.as_str().to_string())
        .with("granted_at", c.granted_at.format(TIMESTAMP_FORMAT).to_string())
        .with(
            "expires_at",
            c.expires_at.map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
        )
}

fn consent_from_record(r: &Record) -> Result<Consent, DatabaseError> {
    Ok(Consent {
        id: parse_uuid(&r.str_col("id")?)?,
        patient_id: parse_uuid(&r.str_col("patient_id")?)?,
        consent_type: ConsentType::from_str(&r.str_col("consent_type")?)?,
        status: ConsentStatus::from_str(&r.str_col("status")?)?,
        granted_at: parse_stamp(&r.str_col("granted_at")?)?,
        expires_at: r
            .opt_str_col("expires_at")?
            .as_deref()
            .map(parse_stamp)
            .transpose()?,
    })
}
