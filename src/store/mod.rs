use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub mod models;
pub mod writer;

use models::Row;

/// Errors at the store seam, classified so the writer can retry only what is
/// worth retrying.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient: network failure, timeout, busy/locked database.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A uniqueness constraint rejected the write.
    #[error("constraint conflict: {0}")]
    Conflict(String),
    /// Malformed request (bad table/column identifier, empty record).
    #[error("invalid store request: {0}")]
    Invalid(String),
    /// Anything else the backend reported.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) => match e.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    StoreError::Unavailable(err.to_string())
                }
                rusqlite::ErrorCode::ConstraintViolation => StoreError::Conflict(err.to_string()),
                _ => StoreError::Backend(err.to_string()),
            },
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Equality filter on one column.
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// The three operations the pipeline needs from any tabular store. The
/// writer composes them into the manual upsert; nothing in the pipeline
/// assumes transactions.
#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn select_where(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, StoreError>;
    async fn insert(&self, table: &str, record: Row) -> Result<(), StoreError>;
    async fn update_where(
        &self,
        table: &str,
        filters: &[Filter],
        fields: Row,
    ) -> Result<u64, StoreError>;
}

/// SQLite-backed store: single connection behind a mutex, WAL journal,
/// idempotent schema applied on open.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

/// Table and column names come from our own code, but guard them anyway so a
/// stray value can never reach the SQL text.
fn check_ident(ident: &str) -> Result<(), StoreError> {
    let mut chars = ident.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if head_ok && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::Invalid(format!("bad identifier {:?}", ident)))
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        // Nested structures are stored as their JSON text
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql_value(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(r) => Value::from(r),
        ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(_) => Value::Null,
    }
}

fn where_clause(filters: &[Filter]) -> Result<(String, Vec<SqlValue>), StoreError> {
    if filters.is_empty() {
        return Ok((String::new(), Vec::new()));
    }
    let mut terms = Vec::with_capacity(filters.len());
    let mut params = Vec::with_capacity(filters.len());
    for (i, f) in filters.iter().enumerate() {
        check_ident(&f.column)?;
        terms.push(format!("{} = ?{}", f.column, i + 1));
        params.push(to_sql_value(&f.value));
    }
    Ok((format!(" WHERE {}", terms.join(" AND ")), params))
}

#[async_trait]
impl TabularStore for SqliteStore {
    async fn select_where(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, StoreError> {
        check_ident(table)?;
        let (clause, params) = where_clause(filters)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT * FROM {}{}", table, clause))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params), |sql_row| {
                let mut row = Row::new();
                for (i, col) in columns.iter().enumerate() {
                    row.insert(col.clone(), from_sql_value(sql_row.get_ref(i)?));
                }
                Ok(row)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, record: Row) -> Result<(), StoreError> {
        check_ident(table)?;
        if record.is_empty() {
            return Err(StoreError::Invalid("empty record".into()));
        }
        let mut columns = Vec::with_capacity(record.len());
        let mut placeholders = Vec::with_capacity(record.len());
        let mut params = Vec::with_capacity(record.len());
        for (i, (col, value)) in record.iter().enumerate() {
            check_ident(col)?;
            columns.push(col.as_str());
            placeholders.push(format!("?{}", i + 1));
            params.push(to_sql_value(value));
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        let conn = self.conn.lock().unwrap();
        conn.execute(&sql, rusqlite::params_from_iter(params))?;
        Ok(())
    }

    async fn update_where(
        &self,
        table: &str,
        filters: &[Filter],
        fields: Row,
    ) -> Result<u64, StoreError> {
        check_ident(table)?;
        if fields.is_empty() {
            return Err(StoreError::Invalid("empty update".into()));
        }
        let mut assignments = Vec::with_capacity(fields.len());
        let mut params = Vec::with_capacity(fields.len() + filters.len());
        for (i, (col, value)) in fields.iter().enumerate() {
            check_ident(col)?;
            assignments.push(format!("{} = ?{}", col, i + 1));
            params.push(to_sql_value(value));
        }
        let mut terms = Vec::with_capacity(filters.len());
        for (i, f) in filters.iter().enumerate() {
            check_ident(&f.column)?;
            terms.push(format!("{} = ?{}", f.column, fields.len() + i + 1));
            params.push(to_sql_value(&f.value));
        }
        let clause = if terms.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", terms.join(" AND "))
        };
        let sql = format!("UPDATE {} SET {}{}", table, assignments.join(", "), clause);
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(&sql, rusqlite::params_from_iter(params))?;
        Ok(changed as u64)
    }
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS). UNIQUE indexes enforce
/// the natural keys the writer upserts on.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS leagues (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    name     TEXT NOT NULL UNIQUE,
    country  TEXT,
    logo_url TEXT
);

CREATE TABLE IF NOT EXISTS fixtures (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    sport            TEXT    NOT NULL,
    league           TEXT    NOT NULL DEFAULT 'Unknown',
    home_team        TEXT    NOT NULL,
    away_team        TEXT    NOT NULL,
    kickoff_utc      TEXT    NOT NULL,
    home_avg_score   REAL    NOT NULL DEFAULT 0,
    away_avg_score   REAL    NOT NULL DEFAULT 0,
    home_streak      INTEGER NOT NULL DEFAULT 0,
    away_streak      INTEGER NOT NULL DEFAULT 0,
    weather_code     INTEGER,
    importance       INTEGER NOT NULL DEFAULT 1,
    home_form5       REAL    NOT NULL DEFAULT 0,
    away_form5       REAL    NOT NULL DEFAULT 0,
    lineup_available INTEGER NOT NULL DEFAULT 1,
    player_stats     TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_fixtures_natural_key
    ON fixtures(sport, home_team, away_team, kickoff_utc);

CREATE TABLE IF NOT EXISTS predictions (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    sport        TEXT NOT NULL,
    league       TEXT NOT NULL,
    match_name   TEXT NOT NULL,
    kickoff_utc  TEXT NOT NULL,
    forecast     TEXT NOT NULL,
    confidence   REAL NOT NULL,
    market_2     TEXT NOT NULL,
    confidence_2 REAL NOT NULL,
    market_3     TEXT NOT NULL,
    confidence_3 REAL NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_predictions_natural_key
    ON predictions(sport, match_name, kickoff_utc);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_insert_and_select() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert(
                "leagues",
                row(&[("name", json!("Premier League")), ("country", json!("England"))]),
            )
            .await
            .unwrap();

        let rows = store
            .select_where("leagues", &[Filter::eq("name", "Premier League")])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["country"], json!("England"));
        assert!(rows[0]["id"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_update_where_reports_changed_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert("leagues", row(&[("name", json!("La Liga"))]))
            .await
            .unwrap();

        let changed = store
            .update_where(
                "leagues",
                &[Filter::eq("name", "La Liga")],
                row(&[("country", json!("Spain"))]),
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let missed = store
            .update_where(
                "leagues",
                &[Filter::eq("name", "Serie A")],
                row(&[("country", json!("Italy"))]),
            )
            .await
            .unwrap();
        assert_eq!(missed, 0);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_conflict() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert("leagues", row(&[("name", json!("Bundesliga"))]))
            .await
            .unwrap();
        let err = store
            .insert("leagues", row(&[("name", json!("Bundesliga"))]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_bad_identifier_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .select_where("leagues; DROP TABLE leagues", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_select_all_with_empty_filters() {
        let store = SqliteStore::open_in_memory().unwrap();
        for name in ["A-League", "B-League"] {
            store
                .insert("leagues", row(&[("name", json!(name))]))
                .await
                .unwrap();
        }
        let rows = store.select_where("leagues", &[]).await.unwrap();
        assert_eq!(rows.len(), 2);
    }
}
