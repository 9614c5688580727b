use std::str::FromStr;
use std::sync::Arc;

use uuid::Uuid;

use crate::audit::AuditSink;
use crate::db::engine::{Predicate, Query, Record, StorageEngine};
use crate::db::DatabaseError;
use crate::events::{ChangeOp, EventBus};
use crate::models::enums::CarePlanStatus;
use crate::models::CarePlan;

use super::{parse_date, parse_uuid};

const TABLE: &str = "care_plans";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CarePlanRepository {
    engine: Arc<StorageEngine>,
    audit: Arc<AuditSink>,
    events: EventBus,
}

impl CarePlanRepository {
    pub(crate) fn new(engine: Arc<StorageEngine>, audit: Arc<AuditSink>, events: EventBus) -> Self {
        Self {
            engine,
            audit,
            events,
        }
    }

    pub fn create(&self, actor: &str, plan: &CarePlan) -> Result<Uuid, DatabaseError> {
        let id = plan.id.to_string();
        self.engine.insert(TABLE, &care_plan_to_record(plan))?;
        self.audit.record_mutation(actor, "care_plan_created", &id)?;
        self.events.publish(TABLE, ChangeOp::Created, &id);
        Ok(plan.id)
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<CarePlan>, DatabaseError> {
        self.engine
            .query_by_id(TABLE, &id.to_string())?
            .map(|r| care_plan_from_record(&r))
            .transpose()
    }

    pub fn update(&self, actor: &str, plan: &CarePlan) -> Result<usize, DatabaseError> {
        let id = plan.id.to_string();
        let affected = self
            .engine
            .update(TABLE, &id, &care_plan_to_record(plan))?;
        if affected > 0 {
            self.audit.record_mutation(actor, "care_plan_updated", &id)?;
            self.events.publish(TABLE, ChangeOp::Updated, &id);
        }
        Ok(affected)
    }

    pub fn update_status(
        &self,
        actor: &str,
        id: &Uuid,
        status: CarePlanStatus,
    ) -> Result<usize, DatabaseError> {
        let id = id.to_string();
        let affected = self.engine.update(
            TABLE,
            &id,
            &Record::new().with("status", status.as_str().to_string()),
        )?;
        if affected > 0 {
            self.audit
                .record_mutation(actor, "care_plan_status_changed", &id)?;
            self.events.publish(TABLE, ChangeOp::Updated, &id);
        }
        Ok(affected)
    }

    pub fn list_for_patient(&self, patient_id: &Uuid) -> Result<Vec<CarePlan>, DatabaseError> {
        let records = self.engine.query(
            TABLE,
            &Query::filtered(Predicate::eq("patient_id", patient_id.to_string())),
        )?;
        records.iter().map(care_plan_from_record).collect()
    }

    pub fn delete(&self, actor: &str, id: &Uuid) -> Result<usize, DatabaseError> {
        let id = id.to_string();
        let affected = self.engine.delete(TABLE, &id)?;
        if affected > 0 {
            self.audit.record_mutation(actor, "care_plan_deleted", &id)?;
            self.events.publish(TABLE, ChangeOp::Deleted, &id);
        }
        Ok(affected)
    }
}

fn care_plan_to_record(p: &CarePlan) -> Record {
    Record::new()
        .with("id", p.id.to_string())
        .with("patient_id", p.patient_id.to_string())
        .with("title", p.title.clone())
        .with("description", p.description.clone())
        .with("status", p.status.as_str().to_string())
        .with("starts_on", p.starts_on.map(|d| d.format(DATE_FORMAT).to_string()))
        .with("ends_on", p.ends_on.map(|d| d.format(DATE_FORMAT).to_string()))
}

fn care_plan_from_record(r: &Record) -> Result<CarePlan, DatabaseError> {
    Ok(CarePlan {
        id: parse_uuid(&r.str_col("id")?)?,
        patient_id: parse_uuid(&r.str_col("patient_id")?)?,
        title: r.str_col("title")?,
        description: r.opt_str_col("description")?,
        status: CarePlanStatus::from_str(&r.str_col("status")?)?,
        starts_on: r
            .opt_str_col("starts_on")?
            .as_deref()
            .map(parse_date)
            .transpose()?,
        ends_on: r
            .opt_str_col("ends_on")?
            .as_deref()
            .map(parse_date)
            .transpose()?,
    })
}
