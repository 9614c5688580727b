use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ReferralStatus, UrgencyLevel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referral {
    pub id: Uuid,
    /// Unique, human-facing tracking identifier.
    pub tracking_number: String,
    pub patient_id: Uuid,
    /// Nulled when the specialist is deleted.
    pub specialist_id: Option<Uuid>,
    pub status: ReferralStatus,
    pub urgency: UrgencyLevel,
    pub reason: Option<String>,
    /// Denormalized from the specialist at creation so completed-referral
    /// revenue survives specialist deletion.
    pub consultation_fee: f64,
}

impl Referral {
    pub fn new(tracking_number: &str, patient_id: Uuid, urgency: UrgencyLevel) -> Self {
        Self {
            id: Uuid::new_v4(),
            tracking_number: tracking_number.to_string(),
            patient_id,
            specialist_id: None,
            status: ReferralStatus::Pending,
            urgency,
            reason: None,
            consultation_fee: 0.0,
        }
    }

    pub fn with_specialist(mut self, specialist_id: Uuid) -> Self {
        self.specialist_id = Some(specialist_id);
        self
    }
}
