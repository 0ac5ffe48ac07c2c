//! Configuration type definitions for the three resolution tiers.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

use crate::drivers::SslMode;
use crate::error::{Result, ShiftError};

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    Postgres,
    Mysql,
    Mssql,
    Sqlite,
}

impl Driver {
    /// Parse a driver identifier.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pg" | "postgres" | "postgresql" => Ok(Driver::Postgres),
            "mysql" | "mariadb" => Ok(Driver::Mysql),
            "mssql" | "sqlserver" | "sql_server" => Ok(Driver::Mssql),
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            _ => Err(ShiftError::UnsupportedDriver(s.to_string())),
        }
    }

    /// Canonical short identifier.
    pub fn name(&self) -> &'static str {
        match self {
            Driver::Postgres => "pg",
            Driver::Mysql => "mysql",
            Driver::Mssql => "mssql",
            Driver::Sqlite => "sqlite",
        }
    }

    /// Human-readable product name for log lines.
    pub fn display_name(&self) -> &'static str {
        match self {
            Driver::Postgres => "PostgreSQL",
            Driver::Mysql => "MySQL",
            Driver::Mssql => "SQL Server",
            Driver::Sqlite => "SQLite",
        }
    }

    /// Standard port of the backend; `None` for file-based drivers.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Driver::Postgres => Some(5432),
            Driver::Mysql => Some(3306),
            Driver::Mssql => Some(1433),
            Driver::Sqlite => None,
        }
    }

    /// Whether the driver talks to a network server.
    pub fn is_networked(&self) -> bool {
        !matches!(self, Driver::Sqlite)
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Desired end state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetVersion {
    /// Highest version reachable forward from the current database version.
    #[default]
    Max,
    /// Exact version, forward or backward.
    Exact(u64),
}

impl TargetVersion {
    /// Parse `max` (case-insensitive) or a non-negative integer. Leading
    /// zeros are accepted (`"0003"` is version 3).
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("max") {
            return Ok(TargetVersion::Max);
        }
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ShiftError::Config(format!(
                "Invalid target version '{}': expected a number or 'max'",
                s
            )));
        }
        s.parse::<u64>()
            .map(TargetVersion::Exact)
            .map_err(|e| ShiftError::Config(format!("Invalid target version '{}': {}", s, e)))
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetVersion::Max => f.write_str("max"),
            TargetVersion::Exact(v) => write!(f, "{}", v),
        }
    }
}

/// A config-file scalar that may be spelled as a JSON number, boolean or string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(u64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    /// Textual form used for coercion.
    pub fn as_text(&self) -> String {
        match self {
            Scalar::Number(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Text(s) => s.trim().to_string(),
        }
    }

    /// Coerce to a boolean (`true`/`false`, `1`/`0`, `yes`/`no`).
    pub fn as_bool(&self, field: &str) -> Result<bool> {
        match self {
            Scalar::Bool(b) => Ok(*b),
            Scalar::Number(0) => Ok(false),
            Scalar::Number(1) => Ok(true),
            other => match other.as_text().to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                text => Err(ShiftError::Config(format!(
                    "Invalid value for {}: '{}' is not a boolean",
                    field, text
                ))),
            },
        }
    }
}

/// Built-in defaults (lowest precedence tier).
#[derive(Debug, Clone)]
pub struct Defaults {
    pub driver: String,
    pub host: String,
    pub migration_pattern: String,
    pub schema_table: String,
    pub to: TargetVersion,
    pub validate_checksum: bool,
    pub prompt_password: bool,
    pub ssl_mode: SslMode,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            driver: "pg".to_string(),
            host: "localhost".to_string(),
            migration_pattern: "migrations/*".to_string(),
            schema_table: "schemaversion".to_string(),
            to: TargetVersion::Max,
            validate_checksum: true,
            prompt_password: false,
            ssl_mode: SslMode::Disable,
        }
    }
}

/// Values read from a JSON configuration file (middle tier).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(default)]
    pub driver: Option<String>,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<Scalar>,

    #[serde(default)]
    pub database: Option<String>,

    #[serde(default, alias = "user")]
    pub username: Option<String>,

    /// `""` is a real (empty) password; `null` or absence means unset.
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub migration_pattern: Option<String>,

    /// Alternate migration directory, used as `<dir>/*`.
    #[serde(default)]
    pub migration_directory: Option<String>,

    #[serde(default)]
    pub schema_table: Option<String>,

    #[serde(default)]
    pub validate_checksum: Option<Scalar>,

    #[serde(default)]
    pub prompt_password: Option<Scalar>,

    #[serde(default)]
    pub ssl_mode: Option<String>,

    #[serde(default)]
    pub to: Option<Scalar>,
}

/// Values supplied explicitly on the command line (highest tier).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub driver: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub migration_pattern: Option<String>,
    pub schema_table: Option<String>,
    pub validate_checksum: Option<bool>,
    pub prompt_password: Option<bool>,
    pub ssl_mode: Option<String>,
    pub to: Option<String>,
}

/// Effective configuration for one invocation. Never mutated after
/// resolution; credential resolution produces a new value.
#[derive(Clone, PartialEq)]
pub struct Config {
    pub driver: Driver,
    pub host: String,
    /// `None` only for drivers without a network port.
    pub port: Option<u16>,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub migration_pattern: String,
    pub schema_table: String,
    pub target_version: TargetVersion,
    pub validate_checksum: bool,
    pub prompt_password: bool,
    pub ssl_mode: SslMode,
    pub no_config_file: bool,
    /// Configuration file the values were read from, if any.
    pub config_file: Option<PathBuf>,
    pub help: bool,
    pub version: bool,
}

impl Config {
    /// Copy of this configuration with the password set.
    pub fn with_password(&self, password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..self.clone()
        }
    }

    /// `host:port/database` label for log lines.
    pub fn endpoint(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}/{}", self.host, port, self.database),
            None => self.database.clone(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("migration_pattern", &self.migration_pattern)
            .field("schema_table", &self.schema_table)
            .field("target_version", &self.target_version)
            .field("validate_checksum", &self.validate_checksum)
            .field("prompt_password", &self.prompt_password)
            .field("ssl_mode", &self.ssl_mode)
            .field("no_config_file", &self.no_config_file)
            .field("config_file", &self.config_file)
            .finish()
    }
}
