//! Schema version table access.

use chrono::{SecondsFormat, Utc};

use super::{EngineError, EngineResult, MigrationFile};
use crate::config::Driver;
use crate::drivers::QueryExecutor;

/// A row of the schema version table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: u64,
    pub name: Option<String>,
    pub checksum: Option<String>,
}

/// SQL for one schema version table on one backend. The table name is
/// validated as a (schema-qualified) identifier during configuration.
#[derive(Debug, Clone)]
pub struct SchemaHistory {
    table: String,
    driver: Driver,
}

impl SchemaHistory {
    pub fn new(table: impl Into<String>, driver: Driver) -> Self {
        Self {
            table: table.into(),
            driver,
        }
    }

    pub fn create_table_sql(&self) -> String {
        let t = &self.table;
        match self.driver {
            Driver::Postgres => format!(
                "CREATE TABLE IF NOT EXISTS {t} (version BIGINT PRIMARY KEY, name TEXT, checksum TEXT, run_at TEXT)"
            ),
            Driver::Mysql => format!(
                "CREATE TABLE IF NOT EXISTS {t} (version BIGINT PRIMARY KEY, name VARCHAR(255), checksum VARCHAR(64), run_at VARCHAR(40))"
            ),
            Driver::Mssql => format!(
                "IF OBJECT_ID(N'{t}', N'U') IS NULL CREATE TABLE {t} (version BIGINT PRIMARY KEY, name NVARCHAR(255), checksum NVARCHAR(64), run_at NVARCHAR(40))"
            ),
            Driver::Sqlite => format!(
                "CREATE TABLE IF NOT EXISTS {t} (version INTEGER PRIMARY KEY, name TEXT, checksum TEXT, run_at TEXT)"
            ),
        }
    }

    pub fn select_sql(&self) -> String {
        format!(
            "SELECT version, name, checksum FROM {} ORDER BY version",
            self.table
        )
    }

    pub fn insert_sql(&self, file: &MigrationFile, run_at: &str) -> String {
        let name = match &file.name {
            Some(name) => self.literal(name),
            None => "NULL".to_string(),
        };
        format!(
            "INSERT INTO {} (version, name, checksum, run_at) VALUES ({}, {}, {}, {})",
            self.table,
            file.version,
            name,
            self.literal(&file.checksum),
            self.literal(run_at)
        )
    }

    pub fn delete_sql(&self, version: u64) -> String {
        format!("DELETE FROM {} WHERE version = {}", self.table, version)
    }

    /// Create the table if it does not exist yet.
    pub async fn ensure(&self, executor: &mut dyn QueryExecutor) -> EngineResult<()> {
        executor.query(&self.create_table_sql()).await?;
        Ok(())
    }

    /// Applied migrations in ascending version order.
    pub async fn applied(
        &self,
        executor: &mut dyn QueryExecutor,
    ) -> EngineResult<Vec<AppliedMigration>> {
        let result = executor.query(&self.select_sql()).await?;

        let mut applied = Vec::with_capacity(result.rows.len());
        for row in 0..result.rows.len() {
            let text = result.cell(row, 0).unwrap_or_default();
            let version = text.trim().parse::<u64>().map_err(|_| {
                EngineError::Execution(format!(
                    "Unreadable version '{}' in {}",
                    text, self.table
                ))
            })?;
            applied.push(AppliedMigration {
                version,
                name: result.cell(row, 1).map(str::to_string),
                checksum: result.cell(row, 2).map(str::to_string),
            });
        }
        applied.sort_by_key(|m| m.version);
        Ok(applied)
    }

    pub async fn record(
        &self,
        executor: &mut dyn QueryExecutor,
        file: &MigrationFile,
    ) -> EngineResult<()> {
        let run_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        executor.query(&self.insert_sql(file, &run_at)).await?;
        Ok(())
    }

    pub async fn remove(&self, executor: &mut dyn QueryExecutor, version: u64) -> EngineResult<()> {
        executor.query(&self.delete_sql(version)).await?;
        Ok(())
    }

    fn literal(&self, value: &str) -> String {
        let escaped = value.replace('\'', "''");
        match self.driver {
            Driver::Mysql => format!("'{}'", escaped.replace('\\', "\\\\")),
            _ => format!("'{}'", escaped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Action;
    use std::path::PathBuf;

    fn file(name: Option<&str>) -> MigrationFile {
        MigrationFile {
            version: 4,
            action: Action::Do,
            name: name.map(str::to_string),
            path: PathBuf::from("004.do.sql"),
            sql: String::new(),
            checksum: "abc".to_string(),
        }
    }

    #[test]
    fn test_create_table_per_driver() {
        let pg = SchemaHistory::new("schemaversion", Driver::Postgres);
        assert!(pg
            .create_table_sql()
            .starts_with("CREATE TABLE IF NOT EXISTS schemaversion"));

        let mssql = SchemaHistory::new("dbo.schemaversion", Driver::Mssql);
        assert!(mssql
            .create_table_sql()
            .starts_with("IF OBJECT_ID(N'dbo.schemaversion', N'U') IS NULL"));
    }

    #[test]
    fn test_insert_escapes_quotes() {
        let history = SchemaHistory::new("schemaversion", Driver::Postgres);
        let sql = history.insert_sql(&file(Some("o'brien")), "2024-01-01T00:00:00.000Z");
        assert_eq!(
            sql,
            "INSERT INTO schemaversion (version, name, checksum, run_at) VALUES (4, 'o''brien', 'abc', '2024-01-01T00:00:00.000Z')"
        );
    }

    #[test]
    fn test_insert_without_name_uses_null() {
        let history = SchemaHistory::new("schemaversion", Driver::Sqlite);
        let sql = history.insert_sql(&file(None), "now");
        assert!(sql.contains("VALUES (4, NULL, 'abc', 'now')"));
    }

    #[test]
    fn test_mysql_escapes_backslash() {
        let history = SchemaHistory::new("schemaversion", Driver::Mysql);
        assert_eq!(history.literal(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_delete_sql() {
        let history = SchemaHistory::new("schemaversion", Driver::Mysql);
        assert_eq!(history.delete_sql(3), "DELETE FROM schemaversion WHERE version = 3");
    }
}
