//! Database driver clients.
//!
//! Each backend gets a client type bound to exactly one connection:
//!
//! - [`postgres`]: PostgreSQL via tokio-postgres (optional rustls TLS)
//! - [`mysql`]: MySQL/MariaDB via mysql_async
//! - [`mssql`]: SQL Server via tiberius
//! - [`sqlite`]: SQLite via rusqlite
//! - [`ssl`]: TLS mode and its per-backend mapping
//!
//! # Dispatch
//!
//! [`DriverClient`] is a closed enum over the backends, dispatched with a
//! `match` on each call (the same approach as a hand-written
//! `enum_dispatch`). Adding a backend means adding a variant, and the
//! compiler points at every place that needs a new arm.
//!
//! # Lifecycle
//!
//! Creating a client never touches the network. [`DriverClient::connect`]
//! acquires the connection, [`QueryExecutor::query`] uses it and
//! [`DriverClient::disconnect`] releases it. Disconnect is idempotent.

pub mod mssql;
pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub mod ssl;

pub use mssql::MssqlClient;
pub use mysql::MysqlClient;
pub use postgres::PostgresClient;
pub use sqlite::SqliteClient;
pub use ssl::SslMode;

use async_trait::async_trait;

use crate::config::{Config, Driver};
use crate::error::{Result, ShiftError};

/// Rows returned by a raw query, with every cell rendered as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column names in select order.
    pub columns: Vec<String>,
    /// Row cells; `None` is SQL NULL.
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    /// Result with no columns and no rows (DDL, DML).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Cell at `row`, `column` (NULL and out-of-range both yield `None`).
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column)?.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The query-execution capability handed to the migration engine.
#[async_trait]
pub trait QueryExecutor: Send {
    /// Run raw SQL (possibly several statements) and collect the rows of the
    /// first result set.
    async fn query(&mut self, sql: &str) -> Result<QueryResult>;

    /// Backend this executor talks to.
    fn driver(&self) -> Driver;
}

/// Connection parameters for one backend.
#[derive(Clone, PartialEq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: Option<u16>,
    /// Database name, or file path for SQLite.
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: SslMode,
}

impl ConnectionParams {
    /// Extract connection parameters from a resolved configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            ssl_mode: config.ssl_mode,
        }
    }

    /// Port, falling back to the driver's standard port.
    pub fn port_or_default(&self, driver: Driver) -> u16 {
        self.port.or(driver.default_port()).unwrap_or_default()
    }
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// A client bound to exactly one backend.
pub enum DriverClient {
    Postgres(PostgresClient),
    Mysql(MysqlClient),
    Mssql(MssqlClient),
    Sqlite(SqliteClient),
}

impl DriverClient {
    /// Create an unconnected client for `driver`.
    pub fn create(driver: Driver, params: ConnectionParams) -> Self {
        match driver {
            Driver::Postgres => DriverClient::Postgres(PostgresClient::new(params)),
            Driver::Mysql => DriverClient::Mysql(MysqlClient::new(params)),
            Driver::Mssql => DriverClient::Mssql(MssqlClient::new(params)),
            Driver::Sqlite => DriverClient::Sqlite(SqliteClient::new(params)),
        }
    }

    /// Create an unconnected client from a driver identifier.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedDriver` if the identifier is not recognized.
    pub fn from_name(driver: &str, params: ConnectionParams) -> Result<Self> {
        Ok(Self::create(Driver::parse(driver)?, params))
    }

    /// Establish the connection.
    pub async fn connect(&mut self) -> Result<()> {
        match self {
            DriverClient::Postgres(c) => c.connect().await,
            DriverClient::Mysql(c) => c.connect().await,
            DriverClient::Mssql(c) => c.connect().await,
            DriverClient::Sqlite(c) => c.connect().await,
        }
    }

    /// Release the connection. Safe to call when not connected.
    pub async fn disconnect(&mut self) -> Result<()> {
        match self {
            DriverClient::Postgres(c) => c.disconnect().await,
            DriverClient::Mysql(c) => c.disconnect().await,
            DriverClient::Mssql(c) => c.disconnect().await,
            DriverClient::Sqlite(c) => c.disconnect().await,
        }
    }

    pub fn is_connected(&self) -> bool {
        match self {
            DriverClient::Postgres(c) => c.is_connected(),
            DriverClient::Mysql(c) => c.is_connected(),
            DriverClient::Mssql(c) => c.is_connected(),
            DriverClient::Sqlite(c) => c.is_connected(),
        }
    }
}

#[async_trait]
impl QueryExecutor for DriverClient {
    async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        match self {
            DriverClient::Postgres(c) => c.query(sql).await,
            DriverClient::Mysql(c) => c.query(sql).await,
            DriverClient::Mssql(c) => c.query(sql).await,
            DriverClient::Sqlite(c) => c.query(sql).await,
        }
    }

    fn driver(&self) -> Driver {
        match self {
            DriverClient::Postgres(_) => Driver::Postgres,
            DriverClient::Mysql(_) => Driver::Mysql,
            DriverClient::Mssql(_) => Driver::Mssql,
            DriverClient::Sqlite(_) => Driver::Sqlite,
        }
    }
}

pub(crate) fn not_connected(driver: Driver) -> ShiftError {
    ShiftError::Connection(format!("{} client is not connected", driver.display_name()))
}
