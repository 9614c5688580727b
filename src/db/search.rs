//! Full-text search over the optional FTS5 virtual tables.
//!
//! Callers go through [`StorageEngine::search`], which tries the MATCH path
//! here and falls back to a parameterized LIKE OR-chain when the engine was
//! built without fts5. Both paths return plain table records, so callers
//! cannot tell which one executed.
//!
//! [`StorageEngine::search`]: super::engine::StorageEngine::search

use rusqlite::types::Value;
use rusqlite::Connection;

use super::engine::{select_records, Record};
use super::DatabaseError;

/// Default LIKE-fallback column sets per searchable table.
pub fn default_search_columns(table: &str) -> &'static [&'static str] {
    match table {
        "patients" => &["name", "medical_record_number"],
        "specialists" => &["name", "specialty", "hospital"],
        _ => &["name"],
    }
}

/// Query the `<table>_fts` virtual table, joining back to the content table
/// so results carry full rows, ranked by relevance.
pub fn full_text_search(
    conn: &Connection,
    table: &str,
    term: &str,
    limit: u32,
) -> Result<Vec<Record>, DatabaseError> {
    let sanitized = sanitize_fts_query(term);
    if sanitized.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {table}.* FROM {table}_fts
         JOIN {table} ON {table}.rowid = {table}_fts.rowid
         WHERE {table}_fts MATCH ?1
         ORDER BY rank
         LIMIT ?2"
    );

    select_records(
        conn,
        &sql,
        &[Value::Text(sanitized), Value::Integer(limit as i64)],
    )
}

/// Whether an FTS query error means "engine has no full-text support".
/// These are recovered locally by the LIKE fallback, never surfaced.
pub fn is_fts_unavailable(e: &DatabaseError) -> bool {
    match e {
        DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(_, Some(msg))) => {
            msg.contains("no such module")
                || (msg.contains("no such table") && msg.contains("_fts"))
        }
        _ => false,
    }
}

/// Sanitize a search query for FTS5.
/// Escapes special characters and wraps terms for prefix matching.
pub fn sanitize_fts_query(query: &str) -> String {
    // Remove FTS5 operators that could cause syntax errors
    let cleaned: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '\'')
        .collect();

    // Split into terms and add prefix matching with *
    cleaned
        .split_whitespace()
        .filter(|w| !w.is_empty())
        .map(|w| format!("\"{w}\"*"))
        .collect::<Vec<_>>()
        .join(" ")
}
