use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::CarePlanStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarePlan {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: CarePlanStatus,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

impl CarePlan {
    pub fn new(patient_id: Uuid, title: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            title: title.to_string(),
            description: None,
            status: CarePlanStatus::Active,
            starts_on: None,
            ends_on: None,
        }
    }
}
