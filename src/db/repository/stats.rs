use std::collections::BTreeMap;

use crate::db::engine::{Clause, Predicate, StorageEngine};
use crate::db::DatabaseError;
use crate::models::enums::{ReferralStatus, UrgencyLevel};
use crate::models::DashboardStats;

/// Compute dashboard counters straight from the store. Intentionally not
/// cached: the dashboard is read rarely and must reflect the live state.
pub fn dashboard_stats(engine: &StorageEngine) -> Result<DashboardStats, DatabaseError> {
    let total_patients = engine.count("patients", None)?;
    let total_specialists = engine.count("specialists", None)?;
    let total_referrals = engine.count("referrals", None)?;

    let mut referrals_by_status = BTreeMap::new();
    for status in ReferralStatus::ALL {
        let n = engine.count(
            "referrals",
            Some(&Predicate::eq("status", status.as_str().to_string())),
        )?;
        referrals_by_status.insert(status.as_str().to_string(), n);
    }

    let mut referrals_by_urgency = BTreeMap::new();
    for urgency in UrgencyLevel::ALL {
        let n = engine.count(
            "referrals",
            Some(&Predicate::eq("urgency", urgency.as_str().to_string())),
        )?;
        referrals_by_urgency.insert(urgency.as_str().to_string(), n);
    }

    let completed_revenue = engine.sum(
        "referrals",
        "consultation_fee",
        Some(&Predicate::eq(
            "status",
            ReferralStatus::Completed.as_str().to_string(),
        )),
    )?;

    let unread_notifications = engine.count(
        "notifications",
        Some(&Predicate::all(vec![Clause::eq("read", 0_i64)])),
    )?;

    Ok(DashboardStats {
        total_patients,
        total_specialists,
        total_referrals,
        referrals_by_status,
        referrals_by_urgency,
        completed_revenue,
        unread_notifications,
    })
}
