use uuid::Uuid;

use super::enums::{ReferralStatus, UrgencyLevel};

#[derive(Debug, Default)]
pub struct ReferralFilter {
    pub patient_id: Option<Uuid>,
    pub specialist_id: Option<Uuid>,
    pub status: Option<ReferralStatus>,
    pub urgency: Option<UrgencyLevel>,
}

#[derive(Debug, Default)]
pub struct SpecialistFilter {
    pub specialty: Option<String>,
    pub min_rating: Option<f64>,
}
