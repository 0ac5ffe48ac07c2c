//! Configuration validation.

use super::Config;
use crate::error::{Result, ShiftError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.database.trim().is_empty() {
        return Err(ShiftError::Config(format!(
            "database is required for driver '{}'",
            config.driver
        )));
    }

    if config.driver.is_networked() {
        if config.host.trim().is_empty() {
            return Err(ShiftError::Config("host is required".into()));
        }
        if config.port == Some(0) {
            return Err(ShiftError::Config("port must be between 1 and 65535".into()));
        }
    }

    if config.migration_pattern.trim().is_empty() {
        return Err(ShiftError::Config("migration pattern must not be empty".into()));
    }
    if let Err(e) = glob::Pattern::new(&config.migration_pattern) {
        return Err(ShiftError::Config(format!(
            "Invalid migration pattern '{}': {}",
            config.migration_pattern, e
        )));
    }

    if !is_valid_table_name(&config.schema_table) {
        return Err(ShiftError::Config(format!(
            "schema table '{}' must be an identifier, optionally schema-qualified",
            config.schema_table
        )));
    }

    Ok(())
}

/// `name` or `schema.name`, each part letters, digits and underscores,
/// not starting with a digit. The table name is spliced into SQL text.
fn is_valid_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.is_empty() || parts.len() > 2 {
        return false;
    }
    parts.iter().all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Driver, TargetVersion};
    use crate::drivers::SslMode;

    fn valid_config() -> Config {
        Config {
            driver: Driver::Postgres,
            host: "localhost".to_string(),
            port: Some(5432),
            database: "app".to_string(),
            username: Some("app".to_string()),
            password: Some("password".to_string()),
            migration_pattern: "migrations/*".to_string(),
            schema_table: "schemaversion".to_string(),
            target_version: TargetVersion::Max,
            validate_checksum: true,
            prompt_password: false,
            ssl_mode: SslMode::Disable,
            no_config_file: false,
            config_file: None,
            help: false,
            version: false,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_database() {
        let mut config = valid_config();
        config.database = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_host_for_server_driver() {
        let mut config = valid_config();
        config.host = " ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_sqlite_needs_no_host() {
        let mut config = valid_config();
        config.driver = Driver::Sqlite;
        config.host = "".to_string();
        config.port = None;
        config.database = "app.db".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_migration_pattern_must_be_a_glob() {
        let mut config = valid_config();
        config.migration_pattern = "migrations/**/*.sql".to_string();
        assert!(validate(&config).is_ok());

        config.migration_pattern = "migrations/[001.do.sql".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().starts_with("Invalid migration pattern"));
    }

    #[test]
    fn test_schema_table_names() {
        assert!(is_valid_table_name("schemaversion"));
        assert!(is_valid_table_name("public.schema_version"));
        assert!(is_valid_table_name("_versions2"));
        assert!(!is_valid_table_name("2versions"));
        assert!(!is_valid_table_name("versions; DROP TABLE x"));
        assert!(!is_valid_table_name("a.b.c"));
        assert!(!is_valid_table_name(""));
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let mut config = valid_config();
        config.password = Some("super_secret_password_123".to_string());
        let debug_output = format!("{:?}", config);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }
}
