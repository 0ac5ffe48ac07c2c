//! PostgreSQL client.

use tokio::task::JoinHandle;
use tokio_postgres::{Client, Config as PgConfig, NoTls, SimpleQueryMessage};
use tracing::{debug, info, warn};

use super::{not_connected, ConnectionParams, QueryResult};
use crate::config::Driver;
use crate::error::{Result, ShiftError};

/// Authentication failure SQLSTATEs: invalid_password and
/// invalid_authorization_specification.
const AUTH_SQLSTATES: [&str; 2] = ["28P01", "28000"];

/// PostgreSQL client holding a single connection.
pub struct PostgresClient {
    params: ConnectionParams,
    client: Option<Client>,
    connection: Option<JoinHandle<()>>,
}

impl PostgresClient {
    /// Create an unconnected client.
    pub fn new(params: ConnectionParams) -> Self {
        Self {
            params,
            client: None,
            connection: None,
        }
    }

    fn pg_config(&self) -> PgConfig {
        let mut pg_config = PgConfig::new();
        pg_config.host(&self.params.host);
        pg_config.port(self.params.port_or_default(Driver::Postgres));
        pg_config.dbname(&self.params.database);
        if let Some(user) = &self.params.username {
            pg_config.user(user);
        }
        if let Some(password) = &self.params.password {
            pg_config.password(password);
        }
        pg_config.application_name("dbshift");
        pg_config
    }

    /// Open the connection and spawn its driver task.
    pub async fn connect(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }

        let pg_config = self.pg_config();
        let tls = self.params.ssl_mode.postgres_connector()?;

        let (client, handle) = match tls {
            None => {
                let (client, connection) =
                    pg_config.connect(NoTls).await.map_err(classify_error)?;
                let handle = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!("PostgreSQL connection closed with error: {}", e);
                    }
                });
                (client, handle)
            }
            Some(connector) => {
                let (client, connection) =
                    pg_config.connect(connector).await.map_err(classify_error)?;
                let handle = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!("PostgreSQL connection closed with error: {}", e);
                    }
                });
                (client, handle)
            }
        };

        info!(
            "Connected to PostgreSQL: {}:{}/{} (ssl_mode={:?})",
            self.params.host,
            self.params.port_or_default(Driver::Postgres),
            self.params.database,
            self.params.ssl_mode
        );

        self.client = Some(client);
        self.connection = Some(handle);
        Ok(())
    }

    /// Run SQL through the simple query protocol.
    pub async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| not_connected(Driver::Postgres))?;

        let messages = client
            .simple_query(sql)
            .await
            .map_err(|e| ShiftError::Query(e.to_string()))?;

        let mut result = QueryResult::empty();
        for message in messages {
            match message {
                SimpleQueryMessage::Row(row) => {
                    if result.columns.is_empty() {
                        result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    let cells = (0..row.len())
                        .map(|i| row.get(i).map(str::to_string))
                        .collect();
                    result.rows.push(cells);
                }
                SimpleQueryMessage::CommandComplete(_) if !result.rows.is_empty() => break,
                _ => {}
            }
        }
        Ok(result)
    }

    /// Drop the client and wait for the connection task to finish.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.client = None;
        if let Some(handle) = self.connection.take() {
            if let Err(e) = handle.await {
                warn!("PostgreSQL connection task did not shut down cleanly: {}", e);
            }
            debug!("Disconnected from PostgreSQL");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}

fn classify_error(e: tokio_postgres::Error) -> ShiftError {
    let code = e.as_db_error().map(|db| db.code().code());
    if code.is_some_and(is_auth_failure) {
        ShiftError::Authentication(e.to_string())
    } else {
        ShiftError::Connection(e.to_string())
    }
}

fn is_auth_failure(sqlstate: &str) -> bool {
    AUTH_SQLSTATES.contains(&sqlstate)
}
