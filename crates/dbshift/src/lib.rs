//! # dbshift
//!
//! Versioned schema migrations for PostgreSQL, MySQL, SQL Server and SQLite.
//!
//! A run resolves one effective configuration from built-in defaults, an
//! optional JSON file (`dbshift.json`) and command-line flags, optionally
//! prompts for the password, connects a driver client and moves the
//! database from its recorded schema version to the target version:
//!
//! - **Forward** (`do`) or **backward** (`undo`) to an exact version
//! - **`max`** to apply everything currently pending
//! - **Checksum validation** of migrations that were already applied
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbshift::{MigrationRunner, ResultReporter};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut runner = MigrationRunner::new();
//!     let result = runner
//!         .run_args(["dbshift", "--driver", "pg", "--database", "app", "--to", "3"])
//!         .await;
//!     let code = ResultReporter::stdio().report(&result);
//!     std::process::exit(i32::from(code));
//! }
//! ```

pub mod config;
pub mod drivers;
pub mod engine;
pub mod error;
pub mod options;
pub mod prompt;
pub mod report;
pub mod runner;

// Re-exports for convenient access
pub use config::{Config, ConfigResolver, Driver, TargetVersion};
pub use drivers::{ConnectionParams, DriverClient, QueryExecutor, QueryResult};
pub use engine::{
    Action, EngineError, MigrationEngine, MigrationRecord, MigrationRequest, SqlMigrationEngine,
};
pub use error::{Result, ShiftError};
pub use options::CliArgs;
pub use prompt::{LineInput, ScriptedInput, TerminalInput};
pub use report::ResultReporter;
pub use runner::{ConnectionEvent, ConnectionTrace, MigrationRunner, RunResult};
