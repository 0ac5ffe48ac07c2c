//! MySQL client.

use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Row, Value};
use tracing::{debug, info, warn};

use super::{not_connected, ConnectionParams, QueryResult};
use crate::config::Driver;
use crate::error::{Result, ShiftError};

/// ER_ACCESS_DENIED_ERROR
const ACCESS_DENIED: u16 = 1045;

/// MySQL client holding a single connection.
pub struct MysqlClient {
    params: ConnectionParams,
    conn: Option<Conn>,
}

impl MysqlClient {
    /// Create an unconnected client.
    pub fn new(params: ConnectionParams) -> Self {
        Self { params, conn: None }
    }

    fn opts(&self) -> OptsBuilder {
        let mut builder = OptsBuilder::default()
            .ip_or_hostname(self.params.host.clone())
            .tcp_port(self.params.port_or_default(Driver::Mysql))
            .db_name(Some(self.params.database.clone()))
            .user(self.params.username.clone())
            .pass(self.params.password.clone())
            .init(vec!["SET NAMES utf8mb4"]);

        if let Some(ssl) = self.params.ssl_mode.mysql_opts() {
            builder = builder.ssl_opts(ssl);
        }
        builder
    }

    pub async fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        if !self.params.ssl_mode.requires_tls() {
            debug!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
        }

        let conn = Conn::new(self.opts()).await.map_err(classify_error)?;

        info!(
            "Connected to MySQL: {}:{}/{}",
            self.params.host,
            self.params.port_or_default(Driver::Mysql),
            self.params.database
        );
        self.conn = Some(conn);
        Ok(())
    }

    /// Run SQL and collect the first result set.
    pub async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| not_connected(Driver::Mysql))?;

        let rows: Vec<Row> = conn
            .query(sql)
            .await
            .map_err(|e| ShiftError::Query(e.to_string()))?;

        let mut result = QueryResult::empty();
        if let Some(first) = rows.first() {
            result.columns = first
                .columns_ref()
                .iter()
                .map(|c| c.name_str().into_owned())
                .collect();
        }
        for row in &rows {
            let cells = (0..row.len())
                .map(|i| row.as_ref(i).and_then(value_to_text))
                .collect();
            result.rows.push(cells);
        }
        Ok(result)
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.disconnect().await {
                warn!("MySQL connection did not close cleanly: {}", e);
            }
            debug!("Disconnected from MySQL");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Int(v) => Some(v.to_string()),
        Value::UInt(v) => Some(v.to_string()),
        Value::Float(v) => Some(v.to_string()),
        Value::Double(v) => Some(v.to_string()),
        Value::Date(y, mo, d, h, mi, s, _) => Some(format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            y, mo, d, h, mi, s
        )),
        Value::Time(neg, days, h, mi, s, _) => {
            let hours = *days * 24 + u32::from(*h);
            let sign = if *neg { "-" } else { "" };
            Some(format!("{}{:02}:{:02}:{:02}", sign, hours, mi, s))
        }
    }
}

fn classify_error(e: mysql_async::Error) -> ShiftError {
    match &e {
        mysql_async::Error::Server(server) if is_auth_failure(server.code) => {
            ShiftError::Authentication(e.to_string())
        }
        _ => ShiftError::Connection(e.to_string()),
    }
}

fn is_auth_failure(code: u16) -> bool {
    code == ACCESS_DENIED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_code() {
        assert!(is_auth_failure(1045));
        assert!(!is_auth_failure(1049));
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&Value::NULL), None);
        assert_eq!(value_to_text(&Value::Int(-3)), Some("-3".to_string()));
        assert_eq!(
            value_to_text(&Value::Bytes(b"abc".to_vec())),
            Some("abc".to_string())
        );
        assert_eq!(
            value_to_text(&Value::Date(2024, 1, 2, 3, 4, 5, 0)),
            Some("2024-01-02 03:04:05".to_string())
        );
    }
}
