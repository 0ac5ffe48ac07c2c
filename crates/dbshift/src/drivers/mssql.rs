//! SQL Server client.

use tiberius::{AuthMethod, Client, ColumnData, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use super::{not_connected, ConnectionParams, QueryResult};
use crate::config::Driver;
use crate::error::{Result, ShiftError};

/// "Login failed for user"
const LOGIN_FAILED: u32 = 18456;

/// SQL Server client holding a single TDS connection.
pub struct MssqlClient {
    params: ConnectionParams,
    client: Option<Client<Compat<TcpStream>>>,
}

impl MssqlClient {
    /// Create an unconnected client.
    pub fn new(params: ConnectionParams) -> Self {
        Self {
            params,
            client: None,
        }
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.params.host);
        config.port(self.params.port_or_default(Driver::Mssql));
        config.database(&self.params.database);
        config.application_name("dbshift");
        config.authentication(AuthMethod::sql_server(
            self.params.username.as_deref().unwrap_or_default(),
            self.params.password.as_deref().unwrap_or_default(),
        ));
        self.params.ssl_mode.apply_to_mssql(&mut config);

        config
    }

    pub async fn connect(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }

        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| ShiftError::Connection(format!("{}: {}", config.get_addr(), e)))?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(classify_error)?;

        info!(
            "Connected to SQL Server: {}:{}/{}",
            self.params.host,
            self.params.port_or_default(Driver::Mssql),
            self.params.database
        );
        self.client = Some(client);
        Ok(())
    }

    /// Run a batch and collect its first result set.
    pub async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| not_connected(Driver::Mssql))?;

        let rows = client
            .simple_query(sql)
            .await
            .map_err(|e| ShiftError::Query(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| ShiftError::Query(e.to_string()))?;

        let mut result = QueryResult::empty();
        if let Some(first) = rows.first() {
            result.columns = first.columns().iter().map(|c| c.name().to_string()).collect();
        }
        for row in &rows {
            result
                .rows
                .push(row.cells().map(|(_, data)| column_to_text(data)).collect());
        }
        Ok(result)
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.close().await {
                warn!("SQL Server connection did not close cleanly: {}", e);
            }
            debug!("Disconnected from SQL Server");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}

fn column_to_text(data: &ColumnData<'_>) -> Option<String> {
    match data {
        ColumnData::U8(v) => v.map(|v| v.to_string()),
        ColumnData::I16(v) => v.map(|v| v.to_string()),
        ColumnData::I32(v) => v.map(|v| v.to_string()),
        ColumnData::I64(v) => v.map(|v| v.to_string()),
        ColumnData::F32(v) => v.map(|v| v.to_string()),
        ColumnData::F64(v) => v.map(|v| v.to_string()),
        ColumnData::Bit(v) => v.map(|v| if v { "1" } else { "0" }.to_string()),
        ColumnData::String(v) => v.as_ref().map(|s| s.to_string()),
        ColumnData::Guid(v) => v.as_ref().map(|g| g.to_string()),
        ColumnData::Numeric(v) => v.as_ref().map(|n| n.to_string()),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|bytes| bytes.iter().map(|b| format!("{:02x}", b)).collect()),
        other => Some(format!("{:?}", other)),
    }
}

fn classify_error(e: tiberius::error::Error) -> ShiftError {
    match &e {
        tiberius::error::Error::Server(token) if is_auth_failure(token.code()) => {
            ShiftError::Authentication(e.to_string())
        }
        _ => ShiftError::Connection(e.to_string()),
    }
}

fn is_auth_failure(code: u32) -> bool {
    code == LOGIN_FAILED
}
