//! Generic storage engine over the embedded store.
//!
//! Repositories map typed entities to and from [`Record`]s and drive all
//! persistence through this one surface. The engine owns the single shared
//! connection handle; operations serialize behind its lock, and [`batch`]
//! (one transaction, all-or-nothing) is the only multi-statement atomic
//! primitive.
//!
//! [`batch`]: StorageEngine::batch

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{NaiveDateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ErrorCode};
use uuid::Uuid;

use super::search;
use super::DatabaseError;

/// Engine-stamped timestamp format (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn now_stamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored engine timestamp. A malformed stamp is data corruption
/// and surfaces as `ConstraintViolation`, like a malformed uuid.
pub(crate) fn parse_stamp(raw: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|_| DatabaseError::ConstraintViolation(format!("malformed timestamp: {raw}")))
}

// ═══════════════════════════════════════════════════════════
// Record — one row, column name → SQLite value
// ═══════════════════════════════════════════════════════════

/// An ordered column → value map for one table row.
///
/// Repositories convert entities through explicit `to_record` /
/// `from_record` functions; the engine itself never interprets columns
/// beyond `id`, `created_at` and `updated_at`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    cols: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        self.cols.insert(column.to_string(), value.into());
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.cols.remove(column)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cols.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cols.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.cols.values()
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    // ── Typed accessors ──────────────────────────────────
    // Missing or mistyped columns surface as ConstraintViolation, same as
    // other mapping failures.

    pub fn str_col(&self, column: &str) -> Result<String, DatabaseError> {
        match self.cols.get(column) {
            Some(Value::Text(s)) => Ok(s.clone()),
            other => Err(column_error(column, "TEXT", other)),
        }
    }

    pub fn opt_str_col(&self, column: &str) -> Result<Option<String>, DatabaseError> {
        match self.cols.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(s)) => Ok(Some(s.clone())),
            other => Err(column_error(column, "TEXT or NULL", other)),
        }
    }

    pub fn i64_col(&self, column: &str) -> Result<i64, DatabaseError> {
        match self.cols.get(column) {
            Some(Value::Integer(n)) => Ok(*n),
            other => Err(column_error(column, "INTEGER", other)),
        }
    }

    pub fn opt_i64_col(&self, column: &str) -> Result<Option<i64>, DatabaseError> {
        match self.cols.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(n)) => Ok(Some(*n)),
            other => Err(column_error(column, "INTEGER or NULL", other)),
        }
    }

    pub fn f64_col(&self, column: &str) -> Result<f64, DatabaseError> {
        match self.cols.get(column) {
            Some(Value::Real(x)) => Ok(*x),
            Some(Value::Integer(n)) => Ok(*n as f64),
            other => Err(column_error(column, "REAL", other)),
        }
    }

    pub fn opt_f64_col(&self, column: &str) -> Result<Option<f64>, DatabaseError> {
        match self.cols.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Real(x)) => Ok(Some(*x)),
            Some(Value::Integer(n)) => Ok(Some(*n as f64)),
            other => Err(column_error(column, "REAL or NULL", other)),
        }
    }

    pub fn bool_col(&self, column: &str) -> Result<bool, DatabaseError> {
        Ok(self.i64_col(column)? != 0)
    }
}

fn column_error(column: &str, expected: &str, got: Option<&Value>) -> DatabaseError {
    DatabaseError::ConstraintViolation(format!(
        "column {column}: expected {expected}, got {got:?}"
    ))
}

// ═══════════════════════════════════════════════════════════
// Predicates and queries — always parameterized
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl Cmp {
    fn sql(self) -> &'static str {
        match self {
            Cmp::Eq => "=",
            Cmp::Ne => "<>",
            Cmp::Lt => "<",
            Cmp::Le => "<=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
            Cmp::Like => "LIKE",
        }
    }
}

/// One column comparison. Values are always bound parameters, never
/// concatenated into SQL.
#[derive(Debug, Clone)]
pub struct Clause {
    column: String,
    cmp: Cmp,
    value: Value,
}

impl Clause {
    pub fn new(column: &str, cmp: Cmp, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            cmp,
            value: value.into(),
        }
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, Cmp::Eq, value)
    }

    pub fn gt(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, Cmp::Gt, value)
    }

    pub fn ge(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, Cmp::Ge, value)
    }
}

/// A WHERE clause: either an AND of comparisons, or an OR-chain of
/// case-insensitive substring matches over several columns (the search
/// fallback shape).
#[derive(Debug, Clone)]
pub enum Predicate {
    All(Vec<Clause>),
    AnyLike { columns: Vec<String>, term: String },
}

impl Predicate {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Predicate::All(vec![Clause::eq(column, value)])
    }

    pub fn all(clauses: Vec<Clause>) -> Self {
        Predicate::All(clauses)
    }

    pub fn any_like(columns: &[&str], term: &str) -> Self {
        Predicate::AnyLike {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            term: term.to_string(),
        }
    }

    /// Render to SQL with parameter indexes starting at `first`.
    fn to_sql(&self, first: usize) -> (String, Vec<Value>) {
        match self {
            Predicate::All(clauses) => {
                let mut values = Vec::with_capacity(clauses.len());
                let sql = clauses
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        values.push(c.value.clone());
                        format!("{} {} ?{}", c.column, c.cmp.sql(), first + i)
                    })
                    .collect::<Vec<_>>()
                    .join(" AND ");
                (sql, values)
            }
            Predicate::AnyLike { columns, term } => {
                let pattern = format!("%{term}%");
                let sql = columns
                    .iter()
                    .map(|c| format!("LOWER({c}) LIKE LOWER(?{first})"))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                (format!("({sql})"), vec![Value::Text(pattern)])
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: false,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: true,
        }
    }
}

/// Query shape for [`StorageEngine::query`]. Unspecified order means
/// insertion (rowid) order.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub predicate: Option<Predicate>,
    pub order: Option<Order>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Query {
    pub fn filtered(predicate: Predicate) -> Self {
        Self {
            predicate: Some(predicate),
            ..Self::default()
        }
    }

    pub fn ordered(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limited(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ═══════════════════════════════════════════════════════════
// Batch and pagination types
// ═══════════════════════════════════════════════════════════

/// One operation in an atomic batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Insert { table: String, record: Record },
    Update { table: String, id: String, record: Record },
    Delete { table: String, id: String },
}

impl BatchOp {
    pub fn insert(table: &str, record: Record) -> Self {
        BatchOp::Insert {
            table: table.to_string(),
            record,
        }
    }

    pub fn update(table: &str, id: &str, record: Record) -> Self {
        BatchOp::Update {
            table: table.to_string(),
            id: id.to_string(),
            record,
        }
    }

    pub fn delete(table: &str, id: &str) -> Self {
        BatchOp::Delete {
            table: table.to_string(),
            id: id.to_string(),
        }
    }
}

/// One page of a paginated query. Pages are 1-based.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    /// Convert page data through a fallible mapping, preserving metadata.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            data: self.data.into_iter().map(f).collect::<Result<_, E>>()?,
            total_count: self.total_count,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// StorageEngine
// ═══════════════════════════════════════════════════════════

/// The single shared store handle. Constructed once at startup and injected
/// into repositories; tests build a fresh instance over an in-memory store.
pub struct StorageEngine {
    conn: Mutex<Connection>,
}

impl StorageEngine {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let guard = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&guard)
    }

    /// Swap the underlying connection (restore path). The old handle is
    /// dropped (closing the file) before `open` runs, so `open` may copy
    /// over the database file. If `open` fails the engine is left on an
    /// empty in-memory placeholder and the caller should treat the store
    /// as unusable.
    pub(crate) fn replace_connection(
        &self,
        open: impl FnOnce() -> Result<Connection, DatabaseError>,
    ) -> Result<(), DatabaseError> {
        let mut guard = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let old = std::mem::replace(&mut *guard, Connection::open_in_memory()?);
        drop(old);
        *guard = open()?;
        Ok(())
    }

    /// Insert a record, stamping `created_at`/`updated_at` and minting a v4
    /// uuid when the record carries no id. Conflict on the primary key is
    /// last-write-wins (the existing row is overwritten, `created_at`
    /// preserved); any other unique constraint surfaces as
    /// `ConstraintViolation`.
    pub fn insert(&self, table: &str, record: &Record) -> Result<String, DatabaseError> {
        self.with_conn(|conn| insert_in(conn, table, record))
    }

    pub fn query(&self, table: &str, query: &Query) -> Result<Vec<Record>, DatabaseError> {
        self.with_conn(|conn| query_in(conn, table, query))
    }

    pub fn query_by_id(&self, table: &str, id: &str) -> Result<Option<Record>, DatabaseError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT * FROM {table} WHERE id = ?1");
            let mut rows = select_records(conn, &sql, &[Value::Text(id.to_string())])?;
            Ok(rows.pop())
        })
    }

    /// Update a row by id, stamping `updated_at`. An absent id is a no-op
    /// returning 0, not an error.
    pub fn update(&self, table: &str, id: &str, record: &Record) -> Result<usize, DatabaseError> {
        self.with_conn(|conn| update_in(conn, table, id, record))
    }

    /// Delete a row by id. An absent id is a no-op returning 0.
    pub fn delete(&self, table: &str, id: &str) -> Result<usize, DatabaseError> {
        self.with_conn(|conn| delete_in(conn, table, id))
    }

    /// Execute every operation inside one transaction; any failure rolls
    /// back the whole batch.
    pub fn batch(&self, ops: &[BatchOp]) -> Result<(), DatabaseError> {
        let mut guard = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let tx = guard.transaction()?;
        for op in ops {
            match op {
                BatchOp::Insert { table, record } => {
                    insert_in(&tx, table, record)?;
                }
                BatchOp::Update { table, id, record } => {
                    update_in(&tx, table, id, record)?;
                }
                BatchOp::Delete { table, id } => {
                    delete_in(&tx, table, id)?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Paginated query: a separate COUNT(*) with the same predicate, then
    /// the data page via LIMIT/OFFSET. Pages are 1-based.
    pub fn paginated_query(
        &self,
        table: &str,
        predicate: Option<&Predicate>,
        order: Option<&Order>,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Record>, DatabaseError> {
        if page < 1 || page_size < 1 {
            return Err(DatabaseError::InvalidPage { page: page as i64 });
        }

        self.with_conn(|conn| {
            let total_count = count_in(conn, table, predicate)?;
            let total_pages = (total_count as u64).div_ceil(page_size as u64) as u32;

            let query = Query {
                predicate: predicate.cloned(),
                order: order.cloned(),
                limit: Some(page_size),
                offset: Some((page - 1) * page_size),
            };
            let data = query_in(conn, table, &query)?;

            Ok(Page {
                data,
                total_count,
                page,
                page_size,
                total_pages,
                has_next: page < total_pages,
                has_prev: page > 1,
            })
        })
    }

    pub fn count(&self, table: &str, predicate: Option<&Predicate>) -> Result<i64, DatabaseError> {
        self.with_conn(|conn| count_in(conn, table, predicate))
    }

    pub fn sum(
        &self,
        table: &str,
        column: &str,
        predicate: Option<&Predicate>,
    ) -> Result<f64, DatabaseError> {
        self.with_conn(|conn| {
            let (where_sql, values) = build_where(predicate);
            let sql = format!("SELECT COALESCE(SUM({column}), 0) FROM {table}{where_sql}");
            let sum = conn.query_row(&sql, params_from_iter(values.iter()), |row| {
                row.get::<_, f64>(0)
            })?;
            Ok(sum)
        })
    }

    /// Full-text search with deterministic fallback: try the FTS5 virtual
    /// table; if the engine lacks it, run a parameterized LIKE OR-chain
    /// over `fallback_columns`. Both paths return the same record shape.
    pub fn search(
        &self,
        table: &str,
        term: &str,
        fallback_columns: &[&str],
        limit: u32,
    ) -> Result<Vec<Record>, DatabaseError> {
        self.with_conn(|conn| match search::full_text_search(conn, table, term, limit) {
            Ok(records) => Ok(records),
            Err(e) if search::is_fts_unavailable(&e) => {
                tracing::debug!(table, "full-text search unavailable, using LIKE fallback");
                let query = Query::filtered(Predicate::any_like(fallback_columns, term))
                    .limited(limit);
                query_in(conn, table, &query)
            }
            Err(e) => Err(e),
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Connection-level helpers (shared with the batch transaction)
// ═══════════════════════════════════════════════════════════

pub(crate) fn insert_in(
    conn: &Connection,
    table: &str,
    record: &Record,
) -> Result<String, DatabaseError> {
    let mut rec = record.clone();
    let id = match rec.get("id") {
        Some(Value::Text(s)) if !s.is_empty() => s.clone(),
        _ => {
            let id = Uuid::new_v4().to_string();
            rec.set("id", id.clone());
            id
        }
    };
    let now = now_stamp();
    rec.set("created_at", now.clone());
    rec.set("updated_at", now);

    let columns: Vec<&str> = rec.columns().collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let assignments: Vec<String> = columns
        .iter()
        .filter(|c| **c != "id" && **c != "created_at")
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();

    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        columns.join(", "),
        placeholders.join(", "),
        assignments.join(", "),
    );

    conn.execute(&sql, params_from_iter(rec.values()))
        .map_err(map_sqlite_err)?;
    Ok(id)
}

pub(crate) fn update_in(
    conn: &Connection,
    table: &str,
    id: &str,
    record: &Record,
) -> Result<usize, DatabaseError> {
    let mut rec = record.clone();
    // id and created_at are immutable; updated_at is engine-stamped.
    rec.remove("id");
    rec.remove("created_at");
    rec.set("updated_at", now_stamp());

    let assignments: Vec<String> = rec
        .columns()
        .enumerate()
        .map(|(i, c)| format!("{c} = ?{}", i + 1))
        .collect();
    let sql = format!(
        "UPDATE {table} SET {} WHERE id = ?{}",
        assignments.join(", "),
        rec.len() + 1,
    );

    let mut values: Vec<Value> = rec.values().cloned().collect();
    values.push(Value::Text(id.to_string()));

    conn.execute(&sql, params_from_iter(values.iter()))
        .map_err(map_sqlite_err)
}

pub(crate) fn delete_in(conn: &Connection, table: &str, id: &str) -> Result<usize, DatabaseError> {
    let sql = format!("DELETE FROM {table} WHERE id = ?1");
    conn.execute(&sql, [id]).map_err(map_sqlite_err)
}

pub(crate) fn query_in(
    conn: &Connection,
    table: &str,
    query: &Query,
) -> Result<Vec<Record>, DatabaseError> {
    let (where_sql, mut values) = build_where(query.predicate.as_ref());
    let mut sql = format!("SELECT * FROM {table}{where_sql}");

    if let Some(order) = &query.order {
        let dir = if order.descending { "DESC" } else { "ASC" };
        sql.push_str(&format!(" ORDER BY {} {dir}", order.column));
    }
    match (query.limit, query.offset) {
        (Some(limit), offset) => {
            values.push(Value::Integer(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", values.len()));
            if let Some(offset) = offset {
                values.push(Value::Integer(offset as i64));
                sql.push_str(&format!(" OFFSET ?{}", values.len()));
            }
        }
        // OFFSET needs a LIMIT clause; -1 means unbounded in SQLite.
        (None, Some(offset)) => {
            values.push(Value::Integer(offset as i64));
            sql.push_str(&format!(" LIMIT -1 OFFSET ?{}", values.len()));
        }
        (None, None) => {}
    }

    select_records(conn, &sql, &values)
}

pub(crate) fn count_in(
    conn: &Connection,
    table: &str,
    predicate: Option<&Predicate>,
) -> Result<i64, DatabaseError> {
    let (where_sql, values) = build_where(predicate);
    let sql = format!("SELECT COUNT(*) FROM {table}{where_sql}");
    let count = conn.query_row(&sql, params_from_iter(values.iter()), |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count)
}

fn build_where(predicate: Option<&Predicate>) -> (String, Vec<Value>) {
    match predicate {
        None => (String::new(), Vec::new()),
        Some(p) => {
            let (sql, values) = p.to_sql(1);
            (format!(" WHERE {sql}"), values)
        }
    }
}

/// Run an arbitrary SELECT and collect every row as a [`Record`].
pub(crate) fn select_records(
    conn: &Connection,
    sql: &str,
    values: &[Value],
) -> Result<Vec<Record>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let mut rows = stmt.query(params_from_iter(values.iter()))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut rec = Record::new();
        for (i, name) in names.iter().enumerate() {
            rec.set(name, row.get::<_, Value>(i)?);
        }
        records.push(rec);
    }
    Ok(records)
}

fn map_sqlite_err(e: rusqlite::Error) -> DatabaseError {
    match &e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(
                msg.clone().unwrap_or_else(|| err.to_string()),
            )
        }
        _ => DatabaseError::Sqlite(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn engine() -> StorageEngine {
        StorageEngine::new(open_memory_database().unwrap())
    }

    fn patient_record(name: &str, mrn: &str) -> Record {
        Record::new()
            .with("name", name.to_string())
            .with("medical_record_number", mrn.to_string())
            .with("dob", "1984-03-21".to_string())
            .with("gender", "female".to_string())
            .with("blood_type", Some("O+".to_string()))
    }

    #[test]
    fn insert_round_trips_through_query_by_id() {
        let engine = engine();
        let id = engine.insert("patients", &patient_record("Ada", "MRN-001")).unwrap();

        let rec = engine.query_by_id("patients", &id).unwrap().unwrap();
        assert_eq!(rec.str_col("name").unwrap(), "Ada");
        assert_eq!(rec.str_col("medical_record_number").unwrap(), "MRN-001");
        // Engine-stamped, not client-supplied
        assert!(!rec.str_col("created_at").unwrap().is_empty());
        assert!(!rec.str_col("updated_at").unwrap().is_empty());
    }

    #[test]
    fn insert_mints_id_when_absent() {
        let engine = engine();
        let id = engine.insert("patients", &patient_record("Ada", "MRN-002")).unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn insert_is_last_write_wins_on_primary_key() {
        let engine = engine();
        let rec = patient_record("Ada", "MRN-003").with("id", "fixed-id".to_string());
        engine.insert("patients", &rec).unwrap();
        let created = engine
            .query_by_id("patients", "fixed-id")
            .unwrap()
            .unwrap()
            .str_col("created_at")
            .unwrap();

        let rec2 = patient_record("Ada Lovelace", "MRN-003").with("id", "fixed-id".to_string());
        engine.insert("patients", &rec2).unwrap();

        let after = engine.query_by_id("patients", "fixed-id").unwrap().unwrap();
        assert_eq!(after.str_col("name").unwrap(), "Ada Lovelace");
        // created_at survives the overwrite
        assert_eq!(after.str_col("created_at").unwrap(), created);
        assert_eq!(engine.count("patients", None).unwrap(), 1);
    }

    #[test]
    fn unique_constraint_surfaces_violation() {
        let engine = engine();
        engine.insert("patients", &patient_record("Ada", "MRN-dup")).unwrap();
        let result = engine.insert("patients", &patient_record("Grace", "MRN-dup"));
        assert!(matches!(result, Err(DatabaseError::ConstraintViolation(_))));
    }

    #[test]
    fn update_absent_id_is_zero_not_error() {
        let engine = engine();
        let n = engine
            .update("patients", "nope", &Record::new().with("name", "X".to_string()))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn update_stamps_updated_at_and_preserves_created_at() {
        let engine = engine();
        let id = engine.insert("patients", &patient_record("Ada", "MRN-010")).unwrap();
        let before = engine.query_by_id("patients", &id).unwrap().unwrap();

        let n = engine
            .update("patients", &id, &Record::new().with("name", "Ada L".to_string()))
            .unwrap();
        assert_eq!(n, 1);

        let after = engine.query_by_id("patients", &id).unwrap().unwrap();
        assert_eq!(after.str_col("name").unwrap(), "Ada L");
        assert_eq!(
            after.str_col("created_at").unwrap(),
            before.str_col("created_at").unwrap()
        );
    }

    #[test]
    fn delete_absent_id_is_zero() {
        let engine = engine();
        assert_eq!(engine.delete("patients", "nope").unwrap(), 0);
    }

    #[test]
    fn query_defaults_to_insertion_order() {
        let engine = engine();
        for i in 0..5 {
            engine
                .insert("patients", &patient_record(&format!("P{i}"), &format!("MRN-{i}")))
                .unwrap();
        }
        let rows = engine.query("patients", &Query::default()).unwrap();
        let names: Vec<String> = rows.iter().map(|r| r.str_col("name").unwrap()).collect();
        assert_eq!(names, vec!["P0", "P1", "P2", "P3", "P4"]);
    }

    #[test]
    fn predicate_values_are_parameterized() {
        let engine = engine();
        engine
            .insert("patients", &patient_record("Robert'); DROP TABLE patients;--", "MRN-inj"))
            .unwrap();
        // The hostile name is stored literally and matchable
        let rows = engine
            .query(
                "patients",
                &Query::filtered(Predicate::eq(
                    "name",
                    "Robert'); DROP TABLE patients;--".to_string(),
                )),
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(engine.count("patients", None).unwrap(), 1);
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let engine = engine();
        let ops = vec![
            BatchOp::insert("patients", patient_record("Ada", "MRN-b1")),
            BatchOp::insert("patients", patient_record("Grace", "MRN-b1")), // duplicate MRN
        ];
        let result = engine.batch(&ops);
        assert!(matches!(result, Err(DatabaseError::ConstraintViolation(_))));
        // First insert rolled back too
        assert_eq!(engine.count("patients", None).unwrap(), 0);
    }

    #[test]
    fn batch_commits_atomically() {
        let engine = engine();
        let pid = engine.insert("patients", &patient_record("Ada", "MRN-b2")).unwrap();
        let ops = vec![
            BatchOp::insert(
                "referrals",
                Record::new()
                    .with("tracking_number", "TRK-1".to_string())
                    .with("patient_id", pid.clone())
                    .with("status", "pending".to_string())
                    .with("urgency", "high".to_string()),
            ),
            BatchOp::update(
                "patients",
                &pid,
                Record::new().with("name", "Ada Lovelace".to_string()),
            ),
        ];
        engine.batch(&ops).unwrap();
        assert_eq!(engine.count("referrals", None).unwrap(), 1);
        let p = engine.query_by_id("patients", &pid).unwrap().unwrap();
        assert_eq!(p.str_col("name").unwrap(), "Ada Lovelace");
    }

    #[test]
    fn pagination_covers_every_row_exactly_once() {
        let engine = engine();
        let n = 23u32;
        let page_size = 5u32;
        for i in 0..n {
            engine
                .insert("patients", &patient_record(&format!("P{i:02}"), &format!("MRN-p{i:02}")))
                .unwrap();
        }

        let mut seen = std::collections::HashSet::new();
        let mut page = 1;
        loop {
            let result = engine
                .paginated_query("patients", None, None, page, page_size)
                .unwrap();
            assert_eq!(result.total_count, n as i64);
            assert_eq!(result.total_pages, 5); // ceil(23/5)
            assert_eq!(result.has_prev, page > 1);
            for rec in &result.data {
                assert!(seen.insert(rec.str_col("id").unwrap()), "duplicate row");
            }
            if !result.has_next {
                assert_eq!(page, result.total_pages);
                break;
            }
            page += 1;
        }
        assert_eq!(seen.len(), n as usize);
    }

    #[test]
    fn offset_without_limit_skips_rows() {
        let engine = engine();
        for i in 0..5 {
            engine
                .insert("patients", &patient_record(&format!("O{i}"), &format!("MRN-o{i}")))
                .unwrap();
        }
        let query = Query {
            offset: Some(2),
            ..Query::default()
        };
        let rows = engine.query("patients", &query).unwrap();
        let names: Vec<String> = rows.iter().map(|r| r.str_col("name").unwrap()).collect();
        assert_eq!(names, vec!["O2", "O3", "O4"]);
    }

    #[test]
    fn pagination_rejects_page_zero() {
        let engine = engine();
        let result = engine.paginated_query("patients", None, None, 0, 10);
        assert!(matches!(result, Err(DatabaseError::InvalidPage { page: 0 })));
    }

    #[test]
    fn sum_with_predicate() {
        let engine = engine();
        let pid = engine.insert("patients", &patient_record("Ada", "MRN-s1")).unwrap();
        for (i, (status, fee)) in [("completed", 120.0), ("completed", 80.0), ("pending", 55.0)]
            .iter()
            .enumerate()
        {
            engine
                .insert(
                    "referrals",
                    &Record::new()
                        .with("tracking_number", format!("TRK-s{i}"))
                        .with("patient_id", pid.clone())
                        .with("status", status.to_string())
                        .with("urgency", "low".to_string())
                        .with("consultation_fee", *fee),
                )
                .unwrap();
        }
        let revenue = engine
            .sum(
                "referrals",
                "consultation_fee",
                Some(&Predicate::eq("status", "completed".to_string())),
            )
            .unwrap();
        assert!((revenue - 200.0).abs() < f64::EPSILON);
    }
}
