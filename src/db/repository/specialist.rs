use std::sync::Arc;

use uuid::Uuid;

use crate::audit::AuditSink;
use crate::cache::Cache;
use crate::db::engine::{Clause, Page, Predicate, Query, Record, StorageEngine};
use crate::db::{search, DatabaseError};
use crate::events::{ChangeOp, EventBus};
use crate::models::{Specialist, SpecialistFilter};

use super::parse_uuid;

const TABLE: &str = "specialists";
const SEARCH_LIMIT: u32 = 50;

pub struct SpecialistRepository {
    engine: Arc<StorageEngine>,
    cache: Arc<Cache>,
    audit: Arc<AuditSink>,
    events: EventBus,
}

impl SpecialistRepository {
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

    pub fn create(&self, actor: &str, specialist: &Specialist) -> Result<Uuid, DatabaseError> {
        validate_rating(specialist)?;
        let id = specialist.id.to_string();
        self.engine.insert(TABLE, &specialist_to_record(specialist)?)?;
        self.cache.invalidate_specialists();
        self.audit.record_mutation(actor, "specialist_created", &id)?;
        self.events.publish(TABLE, ChangeOp::Created, &id);
        Ok(specialist.id)
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<Specialist>, DatabaseError> {
        self.engine
            .query_by_id(TABLE, &id.to_string())?
            .map(|r| specialist_from_record(&r))
            .transpose()
    }

    pub fn update(&self, actor: &str, specialist: &Specialist) -> Result<usize, DatabaseError> {
        validate_rating(specialist)?;
        let id = specialist.id.to_string();
        let affected = self
            .engine
            .update(TABLE, &id, &specialist_to_record(specialist)?)?;
        if affected > 0 {
            self.cache.invalidate_specialists();
            self.audit.record_mutation(actor, "specialist_updated", &id)?;
            self.events.publish(TABLE, ChangeOp::Updated, &id);
        }
        Ok(affected)
    }

    /// Deleting a specialist nulls the FK on any referral pointing at it.
    pub fn delete(&self, actor: &str, id: &Uuid) -> Result<usize, DatabaseError> {
        let id = id.to_string();
        let affected = self.engine.delete(TABLE, &id)?;
        if affected > 0 {
            self.cache.invalidate_specialists();
            self.cache.invalidate_referrals();
            self.audit.record_mutation(actor, "specialist_deleted", &id)?;
            self.events.publish(TABLE, ChangeOp::Deleted, &id);
        }
        Ok(affected)
    }

    pub fn list(&self, force_refresh: bool) -> Result<Arc<Vec<Specialist>>, DatabaseError> {
        self.cache.specialists(force_refresh, || {
            let records = self.engine.query(TABLE, &Query::default())?;
            records.iter().map(specialist_from_record).collect()
        })
    }

    pub fn search(&self, term: &str) -> Result<Vec<Specialist>, DatabaseError> {
        let records = self.engine.search(
            TABLE,
            term,
            search::default_search_columns(TABLE),
            SEARCH_LIMIT,
        )?;
        records.iter().map(specialist_from_record).collect()
    }

    pub fn list_filtered(&self, filter: &SpecialistFilter) -> Result<Vec<Specialist>, DatabaseError> {
        let mut clauses = Vec::new();
        if let Some(specialty) = &filter.specialty {
            clauses.push(Clause::eq("specialty", specialty.clone()));
        }
        if let Some(min_rating) = filter.min_rating {
            clauses.push(Clause::ge("rating", min_rating));
        }
        let query = if clauses.is_empty() {
            Query::default()
        } else {
            Query::filtered(Predicate::all(clauses))
        };
        let records = self.engine.query(TABLE, &query)?;
        records.iter().map(specialist_from_record).collect()
    }

    pub fn paginate(&self, page: u32, page_size: u32) -> Result<Page<Specialist>, DatabaseError> {
        self.engine
            .paginated_query(TABLE, None, None, page, page_size)?
            .try_map(|r| specialist_from_record(&r))
    }
}

fn validate_rating(specialist: &Specialist) -> Result<(), DatabaseError> {
    if !specialist.rating_valid() {
        return Err(DatabaseError::ConstraintViolation(format!(
            "rating {} outside [0, 5]",
            specialist.rating
        )));
    }
    Ok(())
}

// languages/insurance are stored as JSON arrays in TEXT columns.
fn specialist_to_record(s: &Specialist) -> Result<Record, DatabaseError> {
    let languages = serde_json::to_string(&s.languages)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("languages: {e}")))?;
    let insurance = serde_json::to_string(&s.insurance)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("insurance: {e}")))?;
    Ok(Record::new()
        .with("id", s.id.to_string())
        .with("name", s.name.clone())
        .with("specialty", s.specialty.clone())
        .with("hospital", s.hospital.clone())
        .with("rating", s.rating)
        .with("success_rate", s.success_rate)
        .with("languages", languages)
        .with("insurance", insurance)
        .with("consultation_fee", s.consultation_fee))
}

fn specialist_from_record(r: &Record) -> Result<Specialist, DatabaseError> {
    Ok(Specialist {
        id: parse_uuid(&r.str_col("id")?)?,
        name: r.str_col("name")?,
        specialty: r.str_col("specialty")?,
        hospital: r.opt_str_col("hospital")?,
        rating: r.f64_col("rating")?,
        success_rate: r.opt_f64_col("success_rate")?,
        languages: serde_json::from_str(&r.str_col("languages")?).unwrap_or_default(),
        insurance: serde_json::from_str(&r.str_col("insurance")?).unwrap_or_default(),
        consultation_fee: r.f64_col("consultation_fee")?,
    })
}
