use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ConsentStatus, ConsentType};

/// A patient's consent grant. Status transitions are one-way:
/// active → revoked, never back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consent {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub consent_type: ConsentType,
    pub status: ConsentStatus,
    pub granted_at: NaiveDateTime,
    pub expires_at: Option<NaiveDateTime>,
}

impl Consent {
    pub fn grant(patient_id: Uuid, consent_type: ConsentType) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            consent_type,
            status: ConsentStatus::Active,
            granted_at: chrono::Utc::now().naive_utc(),
            expires_at: None,
        }
    }
}
