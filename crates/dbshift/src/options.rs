//! Command-line options.
//!
//! Parsing lives in the library so that [`crate::MigrationRunner::run`] can be
//! driven by a raw argument vector, both from the binary and from tests.
//! clap's own `--help`/`--version` handling is disabled: those flags are plain
//! booleans and the runner renders the text to its output sink.

use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::CliOverrides;
use crate::error::{Result, ShiftError};

const EXAMPLES: &str = "\
Examples:
  dbshift 5                         Migrate to version 5 using ./dbshift.json
  dbshift --to max                  Apply every pending migration
  dbshift --to 0                    Undo every applied migration
  dbshift --driver pg --host localhost --database app --username app \\
          --migration-pattern 'migrations/*' --to 3
  dbshift --config deploy/dbshift.json --prompt-password
  dbshift --driver sqlite --database ./app.db --no-config";

/// Raw command-line options as supplied by the operator.
///
/// Every value that can also come from the configuration file is an
/// `Option`: `None` means "not supplied", so it never masks a file value.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "dbshift")]
#[command(about = "Versioned schema migrations for PostgreSQL, MySQL, SQL Server and SQLite")]
#[command(disable_help_flag = true, disable_version_flag = true)]
#[command(after_help = EXAMPLES)]
pub struct CliArgs {
    /// Target version (shorthand for --to)
    #[arg(value_name = "VERSION")]
    pub target: Option<String>,

    /// Target version number, or "max" for the latest
    #[arg(long, value_name = "VERSION|max")]
    pub to: Option<String>,

    /// Database driver: pg, mysql, mssql or sqlite
    #[arg(short = 'r', long)]
    pub driver: Option<String>,

    /// Database host
    #[arg(long)]
    pub host: Option<String>,

    /// Database port (defaults to the driver's standard port)
    #[arg(long)]
    pub port: Option<String>,

    /// Database name (file path for sqlite)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Database user
    #[arg(short, long)]
    pub username: Option<String>,

    /// Database password
    #[arg(short, long)]
    pub password: Option<String>,

    /// Glob pattern locating migration files
    #[arg(short, long, value_name = "GLOB")]
    pub migration_pattern: Option<String>,

    /// Table recording the applied schema version
    #[arg(short = 't', long, value_name = "NAME")]
    pub schema_table: Option<String>,

    /// Validate checksums of already applied migrations
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub validate_checksum: Option<bool>,

    /// TLS mode: disable, require, verify-ca, verify-full
    #[arg(long)]
    pub ssl_mode: Option<String>,

    /// Path to JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ignore dbshift.json in the working directory
    #[arg(long)]
    pub no_config: bool,

    /// Ask for the password when none is configured
    #[arg(long)]
    pub prompt_password: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    pub log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    pub verbosity: String,

    /// Print help
    #[arg(long)]
    pub help: bool,

    /// Print version
    #[arg(short = 'v', long)]
    pub version: bool,
}

impl CliArgs {
    /// Parse an argument vector. The first element is the program name.
    pub fn parse_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).map_err(|e| ShiftError::InvalidArguments(e.to_string()))
    }

    /// Parse option values without a leading program name.
    pub fn parse_options<I, T>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let argv = std::iter::once(OsString::from("dbshift"))
            .chain(options.into_iter().map(Into::into));
        Self::parse_args(argv)
    }

    /// Effective `to` value: the flag wins over the positional shorthand.
    pub fn target_version(&self) -> Option<&str> {
        self.to.as_deref().or(self.target.as_deref())
    }

    /// Values the operator supplied explicitly.
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            driver: self.driver.clone(),
            host: self.host.clone(),
            port: self.port.clone(),
            database: self.database.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            migration_pattern: self.migration_pattern.clone(),
            schema_table: self.schema_table.clone(),
            validate_checksum: self.validate_checksum,
            prompt_password: self.prompt_password.then_some(true),
            ssl_mode: self.ssl_mode.clone(),
            to: self.target_version().map(str::to_string),
        }
    }
}

/// Full help text, ending with the examples section.
pub fn help_text() -> String {
    CliArgs::command().render_long_help().to_string()
}

/// Version line.
pub fn version_text() -> String {
    format!("Version: {}", env!("CARGO_PKG_VERSION"))
}
