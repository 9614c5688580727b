use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Gender {
    Female => "female",
    Male => "male",
    Other => "other",
    Unknown => "unknown",
});

str_enum!(ReferralStatus {
    Pending => "pending",
    Approved => "approved",
    Urgent => "urgent",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(UrgencyLevel {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

str_enum!(MessageStatus {
    Sent => "sent",
    Delivered => "delivered",
    Read => "read",
});

str_enum!(ConditionStatus {
    Active => "active",
    Resolved => "resolved",
    Chronic => "chronic",
});

str_enum!(ConsentType {
    Treatment => "treatment",
    DataSharing => "data_sharing",
    Research => "research",
    Emergency => "emergency",
});

str_enum!(ConsentStatus {
    Active => "active",
    Revoked => "revoked",
});

str_enum!(CarePlanStatus {
    Active => "active",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(SyncOperation {
    Insert => "INSERT",
    Update => "UPDATE",
    Delete => "DELETE",
});

str_enum!(AuditEventType {
    Access => "access",
    Mutation => "mutation",
    Auth => "auth",
    Breach => "breach",
});

str_enum!(AuditSeverity {
    Info => "info",
    Warning => "warning",
    High => "high",
    Critical => "critical",
});
