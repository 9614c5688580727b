//! Append-only audit sink with sliding-window anomaly detection.
//!
//! Repository mutations append their audit row synchronously before
//! returning (write-then-notify), so audit coverage never lags the
//! mutation it describes. The sink is open for the process lifetime;
//! rows are immutable — there is no update or delete surface.
//!
//! Anomaly checks run on every relevant append and are O(window size):
//! a filtered scan of the log by user and cutoff timestamp. Fine at this
//! data scale; a high-volume deployment would keep a per-user ring buffer
//! instead. The append and its window check run under one connection
//! guard, so racing appends serialize and exactly one of them observes
//! the in-window count at the threshold.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use uuid::Uuid;

use rusqlite::Connection;

use crate::db::engine::{
    count_in, insert_in, parse_stamp, Clause, Predicate, Query, Record, StorageEngine,
    TIMESTAMP_FORMAT,
};
use crate::db::DatabaseError;
use crate::models::enums::{AuditEventType, AuditSeverity};
use crate::models::{AuditLogEntry, AuditViolation};

pub const TABLE: &str = "audit_log";

/// Monitored action names.
pub const ACTION_LOGIN_FAILED: &str = "login_failed";
pub const ACTION_PATIENT_READ: &str = "patient_read";
const ACTION_ANOMALY: &str = "anomaly_detected";

const FAILED_LOGIN_WINDOW_MINUTES: i64 = 15;
const FAILED_LOGIN_THRESHOLD: i64 = 5;
const PATIENT_READ_WINDOW_MINUTES: i64 = 60;
const PATIENT_READ_THRESHOLD: i64 = 50;

pub struct AuditSink {
    engine: Arc<StorageEngine>,
}

impl AuditSink {
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        Self { engine }
    }

    /// Append one event and run the anomaly checks for its action.
    /// Returns the violation if this append crossed a threshold.
    ///
    /// The insert and the window count hold the same connection guard, so
    /// two racing appends cannot both skip past the threshold.
    pub fn append(
        &self,
        user_id: &str,
        action: &str,
        resource: &str,
        event_type: AuditEventType,
        severity: AuditSeverity,
    ) -> Result<Option<AuditViolation>, DatabaseError> {
        let record = Record::new()
            .with("user_id", user_id.to_string())
            .with("action", action.to_string())
            .with("resource", resource.to_string())
            .with("event_type", event_type.as_str().to_string())
            .with("severity", severity.as_str().to_string())
            .with("timestamp", Utc::now().format(TIMESTAMP_FORMAT).to_string());

        let rule = match action {
            ACTION_LOGIN_FAILED => Some((
                FAILED_LOGIN_WINDOW_MINUTES,
                FAILED_LOGIN_THRESHOLD,
                "excessive_failed_logins",
            )),
            ACTION_PATIENT_READ => Some((
                PATIENT_READ_WINDOW_MINUTES,
                PATIENT_READ_THRESHOLD,
                "excessive_patient_reads",
            )),
            _ => None,
        };

        self.engine.with_conn(|conn| {
            insert_in(conn, TABLE, &record)?;
            match rule {
                Some((window_minutes, threshold, rule)) => {
                    check_window(conn, user_id, action, window_minutes, threshold, rule)
                }
                None => Ok(None),
            }
        })
    }

    // ── Convenience appenders used by the repositories ───

    pub fn record_access(&self, user_id: &str, action: &str, resource: &str) -> Result<(), DatabaseError> {
        self.append(user_id, action, resource, AuditEventType::Access, AuditSeverity::Info)?;
        Ok(())
    }

    pub fn record_mutation(&self, user_id: &str, action: &str, resource: &str) -> Result<(), DatabaseError> {
        self.append(user_id, action, resource, AuditEventType::Mutation, AuditSeverity::Info)?;
        Ok(())
    }

    pub fn record_failed_login(&self, user_id: &str) -> Result<Option<AuditViolation>, DatabaseError> {
        self.append(user_id, ACTION_LOGIN_FAILED, "session", AuditEventType::Auth, AuditSeverity::Warning)
    }

    pub fn record_patient_read(&self, user_id: &str, patient_id: &str) -> Result<Option<AuditViolation>, DatabaseError> {
        self.append(user_id, ACTION_PATIENT_READ, patient_id, AuditEventType::Access, AuditSeverity::Info)
    }

    // ── Query surface ────────────────────────────────────

    pub fn events_for_user(
        &self,
        user_id: &str,
        since: NaiveDateTime,
    ) -> Result<Vec<AuditLogEntry>, DatabaseError> {
        let records = self.engine.query(
            TABLE,
            &Query::filtered(Predicate::all(vec![
                Clause::eq("user_id", user_id.to_string()),
                Clause::ge("timestamp", since.format(TIMESTAMP_FORMAT).to_string()),
            ])),
        )?;
        records.iter().map(entry_from_record).collect()
    }

    pub fn events_for_resource(&self, resource: &str) -> Result<Vec<AuditLogEntry>, DatabaseError> {
        let records = self.engine.query(
            TABLE,
            &Query::filtered(Predicate::eq("resource", resource.to_string())),
        )?;
        records.iter().map(entry_from_record).collect()
    }

}

// ── Anomaly heuristic ────────────────────────────────────

/// Raise a violation exactly when the in-window count *reaches* the
/// threshold; counts above it do not re-raise while the triggering
/// events remain in the window. Runs on the caller's connection guard,
/// in the same critical section as the append it follows.
fn check_window(
    conn: &Connection,
    user_id: &str,
    action: &str,
    window_minutes: i64,
    threshold: i64,
    rule: &str,
) -> Result<Option<AuditViolation>, DatabaseError> {
    let cutoff = (Utc::now() - Duration::minutes(window_minutes))
        .format(TIMESTAMP_FORMAT)
        .to_string();
    let count = count_in(
        conn,
        TABLE,
        Some(&Predicate::all(vec![
            Clause::eq("user_id", user_id.to_string()),
            Clause::eq("action", action.to_string()),
            Clause::ge("timestamp", cutoff),
        ])),
    )?;

    if count != threshold {
        return Ok(None);
    }

    tracing::warn!(user_id, rule, count, "audit anomaly threshold reached");
    let breach = Record::new()
        .with("user_id", user_id.to_string())
        .with("action", ACTION_ANOMALY.to_string())
        .with("resource", rule.to_string())
        .with("event_type", AuditEventType::Breach.as_str().to_string())
        .with("severity", AuditSeverity::High.as_str().to_string())
        .with("timestamp", Utc::now().format(TIMESTAMP_FORMAT).to_string());
    insert_in(conn, TABLE, &breach)?;

    Ok(Some(AuditViolation {
        user_id: user_id.to_string(),
        rule: rule.to_string(),
        event_type: AuditEventType::Breach,
        severity: AuditSeverity::High,
        in_window_count: count,
    }))
}

fn entry_from_record(record: &Record) -> Result<AuditLogEntry, DatabaseError> {
    Ok(AuditLogEntry {
        id: Uuid::parse_str(&record.str_col("id")?)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        user_id: record.str_col("user_id")?,
        action: record.str_col("action")?,
        resource: record.str_col("resource")?,
        event_type: AuditEventType::from_str(&record.str_col("event_type")?)?,
        severity: AuditSeverity::from_str(&record.str_col("severity")?)?,
        timestamp: parse_stamp(&record.str_col("timestamp")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn sink() -> (Arc<StorageEngine>, AuditSink) {
        let engine = Arc::new(StorageEngine::new(open_memory_database().unwrap()));
        let sink = AuditSink::new(Arc::clone(&engine));
        (engine, sink)
    }

    fn breach_count(engine: &StorageEngine, user: &str) -> i64 {
        engine
            .count(
                TABLE,
                Some(&Predicate::all(vec![
                    Clause::eq("user_id", user.to_string()),
                    Clause::eq("event_type", "breach".to_string()),
                ])),
            )
            .unwrap()
    }

    #[test]
    fn fifth_failed_login_raises_exactly_one_violation() {
        let (engine, sink) = sink();

        for _ in 0..4 {
            assert!(sink.record_failed_login("mallory").unwrap().is_none());
        }
        let violation = sink.record_failed_login("mallory").unwrap().unwrap();
        assert_eq!(violation.rule, "excessive_failed_logins");
        assert_eq!(violation.event_type, AuditEventType::Breach);
        assert_eq!(violation.severity, AuditSeverity::High);
        assert_eq!(violation.in_window_count, 5);

        // A sixth failure in the same window does not duplicate it
        assert!(sink.record_failed_login("mallory").unwrap().is_none());
        assert_eq!(breach_count(&engine, "mallory"), 1);
    }

    #[test]
    fn failed_logins_are_counted_per_user() {
        let (_engine, sink) = sink();
        for _ in 0..4 {
            sink.record_failed_login("alice").unwrap();
            sink.record_failed_login("bob").unwrap();
        }
        // Each user is still below threshold
        assert!(sink.record_failed_login("alice").unwrap().is_some());
        assert!(sink.record_failed_login("bob").unwrap().is_some());
    }

    #[test]
    fn stale_failures_fall_outside_the_window() {
        let (engine, sink) = sink();

        // Backdate four failures to an hour ago, outside the 15-minute window
        let old = (Utc::now() - Duration::hours(1))
            .format(TIMESTAMP_FORMAT)
            .to_string();
        for _ in 0..4 {
            engine
                .insert(
                    TABLE,
                    &Record::new()
                        .with("user_id", "carol".to_string())
                        .with("action", ACTION_LOGIN_FAILED.to_string())
                        .with("resource", "session".to_string())
                        .with("event_type", "auth".to_string())
                        .with("severity", "warning".to_string())
                        .with("timestamp", old.clone()),
                )
                .unwrap();
        }

        // One fresh failure: in-window count is 1, no violation
        assert!(sink.record_failed_login("carol").unwrap().is_none());
        assert_eq!(breach_count(&engine, "carol"), 0);
    }

    #[test]
    fn fiftieth_patient_read_raises_violation() {
        let (engine, sink) = sink();
        for i in 0..49 {
            assert!(
                sink.record_patient_read("dr-x", &format!("patient-{i}")).unwrap().is_none(),
                "read {i} should be below threshold"
            );
        }
        let violation = sink.record_patient_read("dr-x", "patient-49").unwrap().unwrap();
        assert_eq!(violation.rule, "excessive_patient_reads");
        assert_eq!(breach_count(&engine, "dr-x"), 1);
    }

    #[test]
    fn racing_appends_still_raise_exactly_one_violation() {
        let (engine, sink) = sink();
        let sink = Arc::new(sink);

        for _ in 0..4 {
            assert!(sink.record_failed_login("eve").unwrap().is_none());
        }

        // Two appends race past the threshold; serialization under the
        // connection guard means exactly one of them observes count == 5.
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || sink.record_failed_login("eve").unwrap())
            })
            .collect();
        let raised = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Option::is_some)
            .count();

        assert_eq!(raised, 1);
        assert_eq!(breach_count(&engine, "eve"), 1);
    }

    #[test]
    fn append_is_synchronous_and_queryable() {
        let (_engine, sink) = sink();
        sink.record_mutation("system", "patient_created", "p-1").unwrap();

        let since = Utc::now().naive_utc() - Duration::minutes(1);
        let events = sink.events_for_user("system", since).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "patient_created");
        assert_eq!(events[0].resource, "p-1");

        let by_resource = sink.events_for_resource("p-1").unwrap();
        assert_eq!(by_resource.len(), 1);
    }
}
