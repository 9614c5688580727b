use std::str::FromStr;
use std::sync::Arc;

use uuid::Uuid;

use crate::audit::AuditSink;
use crate::cache::Cache;
use crate::db::engine::{parse_stamp, Page, Predicate, Query, Record, StorageEngine, TIMESTAMP_FORMAT};
use crate::db::{search, DatabaseError};
use crate::events::{ChangeOp, EventBus};
use crate::models::enums::*;
use crate::models::*;

use super::{parse_date, parse_uuid};

const TABLE: &str = "patients";
const SEARCH_LIMIT: u32 = 50;

/// Typed operations over patients and their clinical child records.
/// Reads go through the cache; every mutation writes through the engine,
/// invalidates the affected collections, appends an audit row, then
/// publishes a change event.
pub struct PatientRepository {
    engine: Arc<StorageEngine>,
    cache: Arc<Cache>,
    audit: Arc<AuditSink>,
    events: EventBus,
}

impl PatientRepository {
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

    pub fn create(&self, actor: &str, patient: &Patient) -> Result<Uuid, DatabaseError> {
        let id = patient.id.to_string();
        self.engine.insert(TABLE, &patient_to_record(patient))?;
        self.cache.invalidate_patients();
        self.audit.record_mutation(actor, "patient_created", &id)?;
        self.events.publish(TABLE, ChangeOp::Created, &id);
        Ok(patient.id)
    }

    /// Record-level read; feeds the patient-read anomaly window.
    pub fn get(&self, actor: &str, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
        let id = id.to_string();
        let record = self.engine.query_by_id(TABLE, &id)?;
        match record {
            Some(record) => {
                self.audit.record_patient_read(actor, &id)?;
                Ok(Some(patient_from_record(&record)?))
            }
            None => Ok(None),
        }
    }

    /// Full-row replacement, never partial column writes. Absent id is a
    /// zero-effect no-op.
    pub fn update(&self, actor: &str, patient: &Patient) -> Result<usize, DatabaseError> {
        let id = patient.id.to_string();
        let affected = self.engine.update(TABLE, &id, &patient_to_record(patient))?;
        if affected > 0 {
            self.cache.invalidate_patients();
            self.audit.record_mutation(actor, "patient_updated", &id)?;
            self.events.publish(TABLE, ChangeOp::Updated, &id);
        }
        Ok(affected)
    }

    /// Deletes the patient; referrals and all clinical child records
    /// cascade at the store level.
    pub fn delete(&self, actor: &str, id: &Uuid) -> Result<usize, DatabaseError> {
        let id = id.to_string();
        let affected = self.engine.delete(TABLE, &id)?;
        if affected > 0 {
            self.cache.invalidate_patients();
            // Referrals cascade with the patient; their messages keep a
            // nulled referral_id, so cached conversations go too.
            self.cache.invalidate_referrals();
            self.cache.invalidate_conversations();
            self.audit.record_mutation(actor, "patient_deleted", &id)?;
            self.events.publish(TABLE, ChangeOp::Deleted, &id);
        }
        Ok(affected)
    }

    pub fn list(&self, force_refresh: bool) -> Result<Arc<Vec<Patient>>, DatabaseError> {
        self.cache.patients(force_refresh, || {
            let records = self.engine.query(TABLE, &Query::default())?;
            records.iter().map(patient_from_record).collect()
        })
    }

    pub fn search(&self, term: &str) -> Result<Vec<Patient>, DatabaseError> {
        let records = self.engine.search(
            TABLE,
            term,
            search::default_search_columns(TABLE),
            SEARCH_LIMIT,
        )?;
        records.iter().map(patient_from_record).collect()
    }

    pub fn paginate(&self, page: u32, page_size: u32) -> Result<Page<Patient>, DatabaseError> {
        self.engine
            .paginated_query(TABLE, None, None, page, page_size)?
            .try_map(|r| patient_from_record(&r))
    }

    // ── Clinical child records (cascade on patient delete) ──────────

    pub fn add_history(&self, entry: &MedicalHistoryEntry) -> Result<Uuid, DatabaseError> {
        self.engine.insert("medical_history", &history_to_record(entry))?;
        self.events
            .publish("medical_history", ChangeOp::Created, &entry.id.to_string());
        Ok(entry.id)
    }

    pub fn history_for(&self, patient_id: &Uuid) -> Result<Vec<MedicalHistoryEntry>, DatabaseError> {
        self.child_rows("medical_history", patient_id, history_from_record)
    }

    pub fn add_medication(&self, medication: &Medication) -> Result<Uuid, DatabaseError> {
        self.engine.insert("medications", &medication_to_record(medication))?;
        self.events
            .publish("medications", ChangeOp::Created, &medication.id.to_string());
        Ok(medication.id)
    }

    pub fn medications_for(&self, patient_id: &Uuid) -> Result<Vec<Medication>, DatabaseError> {
        self.child_rows("medications", patient_id, medication_from_record)
    }

    pub fn add_condition(&self, condition: &Condition) -> Result<Uuid, DatabaseError> {
        self.engine.insert("conditions", &condition_to_record(condition))?;
        self.events
            .publish("conditions", ChangeOp::Created, &condition.id.to_string());
        Ok(condition.id)
    }

    pub fn conditions_for(&self, patient_id: &Uuid) -> Result<Vec<Condition>, DatabaseError> {
        self.child_rows("conditions", patient_id, condition_from_record)
    }

    pub fn add_document(&self, document: &Document) -> Result<Uuid, DatabaseError> {
        self.engine.insert("documents", &document_to_record(document))?;
        self.events
            .publish("documents", ChangeOp::Created, &document.id.to_string());
        Ok(document.id)
    }

    pub fn documents_for(&self, patient_id: &Uuid) -> Result<Vec<Document>, DatabaseError> {
        self.child_rows("documents", patient_id, document_from_record)
    }

    pub fn add_emergency_contact(&self, contact: &EmergencyContact) -> Result<Uuid, DatabaseError> {
        self.engine
            .insert("emergency_contacts", &contact_to_record(contact))?;
        self.events
            .publish("emergency_contacts", ChangeOp::Created, &contact.id.to_string());
        Ok(contact.id)
    }

    pub fn emergency_contacts_for(
        &self,
        patient_id: &Uuid,
    ) -> Result<Vec<EmergencyContact>, DatabaseError> {
        self.child_rows("emergency_contacts", patient_id, contact_from_record)
    }

    pub fn add_vitals(&self, vitals: &VitalStatistics) -> Result<Uuid, DatabaseError> {
        self.engine.insert("vital_statistics", &vitals_to_record(vitals))?;
        self.events
            .publish("vital_statistics", ChangeOp::Created, &vitals.id.to_string());
        Ok(vitals.id)
    }

    pub fn vitals_for(&self, patient_id: &Uuid) -> Result<Vec<VitalStatistics>, DatabaseError> {
        self.child_rows("vital_statistics", patient_id, vitals_from_record)
    }

    fn child_rows<T>(
        &self,
        table: &str,
        patient_id: &Uuid,
        from_record: impl Fn(&Record) -> Result<T, DatabaseError>,
    ) -> Result<Vec<T>, DatabaseError> {
        let records = self.engine.query(
            table,
            &Query::filtered(Predicate::eq("patient_id", patient_id.to_string())),
        )?;
        records.iter().map(|r| from_record(r)).collect()
    }
}

// ── Row mapping ──────────────────────────────────────────

fn patient_to_record(p: &Patient) -> Record {
    Record::new()
        .with("id", p.id.to_string())
        .with("name", p.name.clone())
        .with("medical_record_number", p.medical_record_number.clone())
        .with("dob", p.dob.to_string())
        .with("gender", p.gender.as_str().to_string())
        .with("blood_type", p.blood_type.clone())
}

fn patient_from_record(r: &Record) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: parse_uuid(&r.str_col("id")?)?,
        name: r.str_col("name")?,
        medical_record_number: r.str_col("medical_record_number")?,
        dob: parse_date(&r.str_col("dob")?)?,
        gender: Gender::from_str(&r.str_col("gender")?)?,
        blood_type: r.opt_str_col("blood_type")?,
    })
}

fn history_to_record(e: &MedicalHistoryEntry) -> Record {
    Record::new()
        .with("id", e.id.to_string())
        .with("patient_id", e.patient_id.to_string())
        .with("description", e.description.clone())
        .with("diagnosed_on", e.diagnosed_on.map(|d| d.to_string()))
}

fn history_from_record(r: &Record) -> Result<MedicalHistoryEntry, DatabaseError> {
    Ok(MedicalHistoryEntry {
        id: parse_uuid(&r.str_col("id")?)?,
        patient_id: parse_uuid(&r.str_col("patient_id")?)?,
        description: r.str_col("description")?,
        diagnosed_on: r
            .opt_str_col("diagnosed_on")?
            .as_deref()
            .map(parse_date)
            .transpose()?,
    })
}

fn medication_to_record(m: &Medication) -> Record {
    Record::new()
        .with("id", m.id.to_string())
        .with("patient_id", m.patient_id.to_string())
        .with("name", m.name.clone())
        .with("dose", m.dose.clone())
        .with("frequency", m.frequency.clone())
        .with("active", m.active as i64)
}

fn medication_from_record(r: &Record) -> Result<Medication, DatabaseError> {
    Ok(Medication {
        id: parse_uuid(&r.str_col("id")?)?,
        patient_id: parse_uuid(&r.str_col("patient_id")?)?,
        name: r.str_col("name")?,
        dose: r.opt_str_col("dose")?,
        frequency: r.opt_str_col("frequency")?,
        active: r.bool_col("active")?,
    })
}

fn condition_to_record(c: &Condition) -> Record {
    Record::new()
        .with("id", c.id.to_string())
        .with("patient_id", c.patient_id.to_string())
        .with("name", c.name.clone())
        .with("status", c.status.as_str().to_string())
}

fn condition_from_record(r: &Record) -> Result<Condition, DatabaseError> {
    Ok(Condition {
        id: parse_uuid(&r.str_col("id")?)?,
        patient_id: parse_uuid(&r.str_col("patient_id")?)?,
        name: r.str_col("name")?,
        status: ConditionStatus::from_str(&r.str_col("status")?)?,
    })
}

fn document_to_record(d: &Document) -> Record {
    Record::new()
        .with("id", d.id.to_string())
        .with("patient_id", d.patient_id.to_string())
        .with("title", d.title.clone())
        .with("kind", d.kind.clone())
        .with("path", d.path.clone())
}

fn document_from_record(r: &Record) -> Result<Document, DatabaseError> {
    Ok(Document {
        id: parse_uuid(&r.str_col("id")?)?,
        patient_id: parse_uuid(&r.str_col("patient_id")?)?,
        title: r.str_col("title")?,
        kind: r.opt_str_col("kind")?,
        path: r.opt_str_col("path")?,
    })
}

fn contact_to_record(c: &EmergencyContact) -> Record {
    Record::new()
        .with("id", c.id.to_string())
        .with("patient_id", c.patient_id.to_string())
        .with("name", c.name.clone())
        .with("relationship", c.relationship.clone())
        .with("phone", c.phone.clone())
}

fn contact_from_record(r: &Record) -> Result<EmergencyContact, DatabaseError> {
    Ok(EmergencyContact {
        id: parse_uuid(&r.str_col("id")?)?,
        patient_id: parse_uuid(&r.str_col("patient_id")?)?,
        name: r.str_col("name")?,
        relationship: r.opt_str_col("relationship")?,
        phone: r.opt_str_col("phone")?,
    })
}

fn vitals_to_record(v: &VitalStatistics) -> Record {
    Record::new()
        .with("id", v.id.to_string())
        .with("patient_id", v.patient_id.to_string())
        .with("recorded_at", v.recorded_at.format(TIMESTAMP_FORMAT).to_string())
        .with("heart_rate", v.heart_rate)
        .with("systolic", v.systolic)
        .with("diastolic", v.diastolic)
        .with("temperature", v.temperature)
        .with("weight", v.weight)
}

fn vitals_from_record(r: &Record) -> Result<VitalStatistics, DatabaseError> {
    Ok(VitalStatistics {
        id: parse_uuid(&r.str_col("id")?)?,
        patient_id: parse_uuid(&r.str_col("patient_id")?)?,
        recorded_at: parse_stamp(&r.str_col("recorded_at")?)?,
        heart_rate: r.opt_i64_col("heart_rate")?,
        systolic: r.opt_i64_col("systolic")?,
        diastolic: r.opt_i64_col("diastolic")?,
        temperature: r.opt_f64_col("temperature")?,
        weight: r.opt_f64_col("weight")?,
    })
}
