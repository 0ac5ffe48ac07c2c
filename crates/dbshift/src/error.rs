//! Error types for the migration layer.

use thiserror::Error;

/// Main error type for dbshift operations.
#[derive(Error, Debug)]
pub enum ShiftError {
    /// Configuration error (missing or unparsable config file, invalid values).
    #[error("{0}")]
    Config(String),

    /// Command-line arguments could not be parsed.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Driver identifier is not one of the supported backends.
    #[error("Unsupported driver '{0}'. Supported drivers: pg, mysql, mssql, sqlite")]
    UnsupportedDriver(String),

    /// A password prompt was requested but stdin is not a terminal.
    #[error("Password prompt requested but no interactive input is available")]
    NoInteractiveInput,

    /// The backend rejected the supplied credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Connecting to (or talking to) the backend failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement failed on a connected client.
    #[error("Query failed: {0}")]
    Query(String),

    /// The migration pattern matched no migration files.
    #[error("No migration files found matching '{0}'")]
    NoMigrationFilesFound(String),

    /// Two migration files declare the same version and action.
    #[error("Two migrations found with version {version} and action {action}")]
    MigrationConflict { version: u64, action: String },

    /// Engine-reported failure not otherwise classified.
    #[error("Migration failed: {0}")]
    MigrationExecution(String),

    /// Run was interrupted by a termination signal.
    #[error("Migration cancelled")]
    Cancelled,

    /// IO error (file operations, output sinks)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShiftError {
    /// Create a Config error for a missing configuration file.
    pub fn config_not_found(path: impl std::fmt::Display) -> Self {
        ShiftError::Config(format!("Config file not found: {}", path))
    }

    /// Create a MigrationConflict error.
    pub fn conflict(version: u64, action: impl Into<String>) -> Self {
        ShiftError::MigrationConflict {
            version,
            action: action.into(),
        }
    }

    /// Process exit code for this error. Always non-zero.
    pub fn exit_code(&self) -> u8 {
        match self {
            ShiftError::Config(_)
            | ShiftError::InvalidArguments(_)
            | ShiftError::UnsupportedDriver(_)
            | ShiftError::Json(_) => 1,
            ShiftError::NoInteractiveInput => 2,
            ShiftError::Authentication(_) | ShiftError::Connection(_) => 3,
            ShiftError::Query(_)
            | ShiftError::NoMigrationFilesFound(_)
            | ShiftError::MigrationConflict { .. }
            | ShiftError::MigrationExecution(_) => 4,
            ShiftError::Io(_) => 7,
            ShiftError::Cancelled => 130,
        }
    }

    /// The message followed by every underlying cause, one per line.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for dbshift operations.
pub type Result<T> = std::result::Result<T, ShiftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_not_found_message_prefix() {
        let err = ShiftError::config_not_found("test/missing.json");
        assert_eq!(err.to_string(), "Config file not found: test/missing.json");
    }

    #[test]
    fn test_conflict_message() {
        let err = ShiftError::conflict(2, "do");
        assert!(err
            .to_string()
            .starts_with("Two migrations found with version 2 and action do"));
    }

    #[test]
    fn test_no_files_message_prefix() {
        let err = ShiftError::NoMigrationFilesFound("empty/*".into());
        assert!(err.to_string().starts_with("No migration files found"));
    }

    #[test]
    fn test_exit_codes_are_nonzero() {
        let errors = [
            ShiftError::Config("x".into()),
            ShiftError::NoInteractiveInput,
            ShiftError::Authentication("x".into()),
            ShiftError::MigrationExecution("x".into()),
            ShiftError::Cancelled,
        ];
        for err in errors {
            assert_ne!(err.exit_code(), 0, "{} must map to a failure code", err);
        }
    }

    #[test]
    fn test_format_detailed_lists_causes() {
        let err = ShiftError::from(std::io::Error::other("disk full"));
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: disk full"));
        assert!(detailed.contains("Caused by:\n  1: disk full"));

        assert_eq!(ShiftError::Config("bad".into()).format_detailed(), "Error: bad");
    }
}
