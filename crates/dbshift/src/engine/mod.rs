//! Migration engine.
//!
//! The runner hands a connected [`QueryExecutor`] and a [`MigrationRequest`]
//! to a [`MigrationEngine`] and gets back the records it applied, in
//! application order. [`SqlMigrationEngine`] is the built-in engine working
//! from `<version>.<do|undo>[.<name>].sql` files.

mod files;
mod history;
mod sql;

pub use files::{discover, parse_file_name, MigrationFile};
pub use history::{AppliedMigration, SchemaHistory};
pub use sql::SqlMigrationEngine;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::config::TargetVersion;
use crate::drivers::QueryExecutor;
use crate::error::ShiftError;

/// Direction of a migration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    Do,
    Undo,
}

impl Action {
    /// Parse the action segment of a migration file name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "do" => Some(Action::Do),
            "undo" => Some(Action::Undo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Do => "do",
            Action::Undo => "undo",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One migration step the engine applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub version: u64,
    pub action: Action,
    pub name: Option<String>,
}

impl MigrationRecord {
    pub fn new(version: u64, action: Action, name: Option<String>) -> Self {
        Self {
            version,
            action,
            name,
        }
    }
}

/// Everything the engine needs besides the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRequest {
    /// Glob locating migration files (`*`, `?`, `[...]` and `**`).
    pub migration_pattern: String,
    /// Table recording applied versions.
    pub schema_table: String,
    /// Compare recorded checksums against the files before migrating.
    pub validate_checksum: bool,
    pub target: TargetVersion,
}

/// Failures reported by a migration engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No migration files found matching '{0}'")]
    NoMigrationFiles(String),

    #[error("Two migrations found with version {version} and action {action}")]
    Conflict { version: u64, action: Action },

    #[error("{0}")]
    Execution(String),
}

impl From<ShiftError> for EngineError {
    fn from(e: ShiftError) -> Self {
        EngineError::Execution(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Execution(e.to_string())
    }
}

impl From<EngineError> for ShiftError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NoMigrationFiles(pattern) => ShiftError::NoMigrationFilesFound(pattern),
            EngineError::Conflict { version, action } => ShiftError::conflict(version, action.as_str()),
            EngineError::Execution(msg) => ShiftError::MigrationExecution(msg),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Computes and applies the ordered steps from the current recorded version
/// to the requested target.
#[async_trait]
pub trait MigrationEngine: Send + Sync {
    async fn migrate(
        &self,
        executor: &mut dyn QueryExecutor,
        request: &MigrationRequest,
    ) -> EngineResult<Vec<MigrationRecord>>;
}
