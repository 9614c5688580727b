//! Clinical records attached to one patient. All cascade on patient delete.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ConditionStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalHistoryEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub description: String,
    pub diagnosed_on: Option<NaiveDate>,
}

impl MedicalHistoryEntry {
    pub fn new(patient_id: Uuid, description: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            description: description.to_string(),
            diagnosed_on: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub dose: Option<String>,
    pub frequency: Option<String>,
    pub active: bool,
}

impl Medication {
    pub fn new(patient_id: Uuid, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            name: name.to_string(),
            dose: None,
            frequency: None,
            active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub status: ConditionStatus,
}

impl Condition {
    pub fn new(patient_id: Uuid, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            name: name.to_string(),
            status: ConditionStatus::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub title: String,
    pub kind: Option<String>,
    pub path: Option<String>,
}

impl Document {
    pub fn new(patient_id: Uuid, title: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            title: title.to_string(),
            kind: None,
            path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub relationship: Option<String>,
    pub phone: Option<String>,
}

impl EmergencyContact {
    pub fn new(patient_id: Uuid, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            name: name.to_string(),
            relationship: None,
            phone: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalStatistics {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub recorded_at: NaiveDateTime,
    pub heart_rate: Option<i64>,
    pub systolic: Option<i64>,
    pub diastolic: Option<i64>,
    pub temperature: Option<f64>,
    pub weight: Option<f64>,
}

impl VitalStatistics {
    pub fn new(patient_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            recorded_at: chrono::Utc::now().naive_utc(),
            heart_rate: None,
            systolic: None,
            diastolic: None,
            temperature: None,
            weight: None,
        }
    }
}
