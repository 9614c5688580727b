//! Typed repositories over the storage engine. Each entity gets one module
//! holding its repository struct plus the record mapping functions; the
//! store wires them all to shared engine, cache, audit and event handles.

pub mod admin;
pub mod care_plan;
pub mod consent;
pub mod message;
pub mod patient;
pub mod referral;
pub mod settings;
pub mod specialist;
pub mod stats;
pub mod sync_queue;

pub use admin::AdminRepository;
pub use care_plan::CarePlanRepository;
pub use consent::ConsentRepository;
pub use message::MessageRepository;
pub use patient::PatientRepository;
pub use referral::ReferralRepository;
pub use settings::SettingsRepository;
pub use specialist::SpecialistRepository;
pub use stats::dashboard_stats;
pub use sync_queue::SyncQueueRepository;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::db::DatabaseError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a stored uuid column, surfacing corruption as a constraint error
/// rather than a panic.
pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw)
        .map_err(|_| DatabaseError::ConstraintViolation(format!("malformed uuid: {raw}")))
}

/// Parse a stored `%Y-%m-%d` date column; corruption surfaces the same
/// way as a malformed uuid.
pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| DatabaseError::ConstraintViolation(format!("malformed date: {raw}")))
}

// ═══════════════════════════════════════════════════════════
// Cross-repository tests
// ═══════════════════════════════════════════════════════════
