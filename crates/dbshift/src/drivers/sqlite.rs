//! SQLite client.
//!
//! The database is a local file named by `ConnectionParams::database`; host,
//! port, credentials and TLS settings do not apply.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use super::{not_connected, ConnectionParams, QueryResult};
use crate::config::Driver;
use crate::error::{Result, ShiftError};

/// SQLite client holding a single file connection.
pub struct SqliteClient {
    params: ConnectionParams,
    conn: Option<Connection>,
}

impl SqliteClient {
    /// Create an unconnected client.
    pub fn new(params: ConnectionParams) -> Self {
        Self { params, conn: None }
    }

    pub async fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = Connection::open(&self.params.database).map_err(|e| {
            ShiftError::Connection(format!("opening {}: {}", self.params.database, e))
        })?;
        info!("Opened SQLite database: {}", self.params.database);
        self.conn = Some(conn);
        Ok(())
    }

    /// Run SQL. A single row-returning statement yields its rows; anything
    /// else (DDL, DML, multi-statement scripts) runs as a batch.
    pub async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| not_connected(Driver::Sqlite))?;

        let columns: Vec<String> = match conn.prepare(sql) {
            Ok(stmt) => stmt.column_names().into_iter().map(String::from).collect(),
            Err(rusqlite::Error::MultipleStatement) => Vec::new(),
            Err(e) => return Err(query_error(e)),
        };

        if columns.is_empty() {
            conn.execute_batch(sql).map_err(query_error)?;
            return Ok(QueryResult::empty());
        }

        let mut stmt = conn.prepare(sql).map_err(query_error)?;
        let mut rows = stmt.query([]).map_err(query_error)?;
        let mut result = QueryResult {
            columns,
            rows: Vec::new(),
        };
        while let Some(row) = rows.next().map_err(query_error)? {
            let mut cells = Vec::with_capacity(result.columns.len());
            for i in 0..result.columns.len() {
                cells.push(value_to_text(row.get_ref(i).map_err(query_error)?));
            }
            result.rows.push(cells);
        }
        Ok(result)
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                warn!("SQLite database did not close cleanly: {}", e);
            }
            debug!("Closed SQLite database");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }
}

fn value_to_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(v) => Some(v.to_string()),
        ValueRef::Real(v) => Some(v.to_string()),
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Some(bytes.iter().map(|b| format!("{:02x}", b)).collect()),
    }
}

fn query_error(e: rusqlite::Error) -> ShiftError {
    ShiftError::Query(e.to_string())
}
