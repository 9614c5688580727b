use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Aggregate counters for the dashboard. Computed straight from the store,
/// never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_patients: i64,
    pub total_specialists: i64,
    pub total_referrals: i64,
    /// Referral count per status, keyed by the stored string value.
    pub referrals_by_status: BTreeMap<String, i64>,
    /// Referral count per urgency level.
    pub referrals_by_urgency: BTreeMap<String, i64>,
    /// Sum of consultation fees over completed referrals.
    pub completed_revenue: f64,
    pub unread_notifications: i64,
}
