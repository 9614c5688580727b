pub mod admin;
pub mod audit;
pub mod care_plan;
pub mod consent;
pub mod enums;
pub mod filters;
pub mod message;
pub mod patient;
pub mod patient_record;
pub mod referral;
pub mod specialist;
pub mod stats;
pub mod sync;

pub use admin::*;
pub use audit::*;
pub use care_plan::*;
pub use consent::*;
pub use filters::*;
pub use message::*;
pub use patient::*;
pub use patient_record::*;
pub use referral::*;
pub use specialist::*;
pub use stats::*;
pub use sync::*;
