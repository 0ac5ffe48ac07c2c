//! Built-in engine applying plain SQL migration files.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{
    discover, AppliedMigration, Action, EngineError, EngineResult, MigrationEngine,
    MigrationFile, MigrationRecord, MigrationRequest, SchemaHistory,
};
use crate::config::TargetVersion;
use crate::drivers::QueryExecutor;

/// Applies `<version>.<do|undo>[.<name>].sql` files and records each
/// applied version in the schema table. Steps run one at a time, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlMigrationEngine;

impl SqlMigrationEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MigrationEngine for SqlMigrationEngine {
    async fn migrate(
        &self,
        executor: &mut dyn QueryExecutor,
        request: &MigrationRequest,
    ) -> EngineResult<Vec<MigrationRecord>> {
        let files = discover(&request.migration_pattern)?;

        let history = SchemaHistory::new(&request.schema_table, executor.driver());
        history.ensure(executor).await?;
        let applied = history.applied(executor).await?;
        let current = applied.last().map(|m| m.version).unwrap_or(0);

        if request.validate_checksum {
            validate_checksums(&files, &applied)?;
        }

        let steps = plan(&files, &applied, current, request.target)?;
        info!(
            "Current version {}, target {}: {} migration(s) to run",
            current,
            request.target,
            steps.len()
        );

        let mut records = Vec::with_capacity(steps.len());
        for file in steps {
            info!(
                "Running {} {}{}",
                file.action,
                file.version,
                file.name.as_deref().map(|n| format!(" ({})", n)).unwrap_or_default()
            );
            executor.query(&file.sql).await.map_err(|e| {
                EngineError::Execution(format!(
                    "{} migration {} ({}) failed: {}",
                    file.action,
                    file.version,
                    file.path.display(),
                    e
                ))
            })?;

            match file.action {
                Action::Do => history.record(executor, file).await?,
                Action::Undo => history.remove(executor, file.version).await?,
            }
            records.push(MigrationRecord::new(file.version, file.action, file.name.clone()));
        }

        Ok(records)
    }
}

/// Resolve the target and pick the files to run, in execution order.
///
/// `max` means the highest `do` version on disk, or the current version if
/// the database is already ahead of the files.
fn plan<'a>(
    files: &'a [MigrationFile],
    applied: &[AppliedMigration],
    current: u64,
    target: TargetVersion,
) -> EngineResult<Vec<&'a MigrationFile>> {
    let target = match target {
        TargetVersion::Exact(version) => version,
        TargetVersion::Max => files
            .iter()
            .filter(|f| f.action == Action::Do)
            .map(|f| f.version)
            .max()
            .unwrap_or(0)
            .max(current),
    };

    if target > current {
        return Ok(files
            .iter()
            .filter(|f| f.action == Action::Do && f.version > current && f.version <= target)
            .collect());
    }

    let mut steps = Vec::new();
    for migration in applied
        .iter()
        .rev()
        .filter(|m| m.version > target && m.version <= current)
    {
        let undo = files
            .iter()
            .find(|f| f.action == Action::Undo && f.version == migration.version)
            .ok_or_else(|| {
                EngineError::Execution(format!(
                    "No undo migration found for version {}",
                    migration.version
                ))
            })?;
        steps.push(undo);
    }
    Ok(steps)
}

/// Every applied version that still has a `do` file must match its recorded
/// checksum.
fn validate_checksums(files: &[MigrationFile], applied: &[AppliedMigration]) -> EngineResult<()> {
    for migration in applied {
        let Some(recorded) = migration.checksum.as_deref().filter(|c| !c.is_empty()) else {
            continue;
        };
        let Some(file) = files
            .iter()
            .find(|f| f.action == Action::Do && f.version == migration.version)
        else {
            continue;
        };
        if file.checksum != recorded {
            return Err(EngineError::Execution(format!(
                "Checksum mismatch for migration {}: {} has changed since it was applied",
                migration.version,
                file.path.display()
            )));
        }
    }
    debug!("Checksums verified for {} applied migration(s)", applied.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Driver;
    use crate::drivers::{ConnectionParams, DriverClient, SslMode};
    use std::fs;
    use tempfile::TempDir;

    const MAX_REVISION: u64 = 5;

    struct Fixture {
        dir: TempDir,
        client: DriverClient,
    }

    impl Fixture {
        async fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let migrations = dir.path().join("migrations");
            fs::create_dir(&migrations).unwrap();
            for v in 1..=MAX_REVISION {
                fs::write(
                    migrations.join(format!("{:03}.do.table-{}.sql", v, v)),
                    format!("CREATE TABLE t{} (id INTEGER);", v),
                )
                .unwrap();
                fs::write(
                    migrations.join(format!("{:03}.undo.table-{}.sql", v, v)),
                    format!("DROP TABLE t{};", v),
                )
                .unwrap();
            }

            let mut client = DriverClient::create(
                Driver::Sqlite,
                ConnectionParams {
                    host: String::new(),
                    port: None,
                    database: dir.path().join("app.db").to_string_lossy().into_owned(),
                    username: None,
                    password: None,
                    ssl_mode: SslMode::Disable,
                },
            );
            client.connect().await.unwrap();
            Self { dir, client }
        }

        fn request(&self, target: TargetVersion) -> MigrationRequest {
            MigrationRequest {
                migration_pattern: self
                    .dir
                    .path()
                    .join("migrations/*")
                    .to_string_lossy()
                    .into_owned(),
                schema_table: "schemaversion".to_string(),
                validate_checksum: true,
                target,
            }
        }

        async fn migrate(&mut self, target: TargetVersion) -> EngineResult<Vec<MigrationRecord>> {
            let request = self.request(target);
            SqlMigrationEngine::new()
                .migrate(&mut self.client, &request)
                .await
        }
    }

    fn versions(records: &[MigrationRecord]) -> Vec<u64> {
        records.iter().map(|r| r.version).collect()
    }

    #[tokio::test]
    async fn test_forward_then_back_to_zero() {
        let mut fx = Fixture::new().await;

        let forward = fx.migrate(TargetVersion::Exact(3)).await.unwrap();
        assert_eq!(versions(&forward), vec![1, 2, 3]);
        assert!(forward.iter().all(|r| r.action == Action::Do));
        assert_eq!(forward[0].name.as_deref(), Some("table-1"));

        let back = fx.migrate(TargetVersion::Exact(0)).await.unwrap();
        assert_eq!(versions(&back), vec![3, 2, 1]);
        assert!(back.iter().all(|r| r.action == Action::Undo));
    }

    #[tokio::test]
    async fn test_same_target_twice_is_empty() {
        let mut fx = Fixture::new().await;
        fx.migrate(TargetVersion::Exact(2)).await.unwrap();
        let again = fx.migrate(TargetVersion::Exact(2)).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_max_applies_everything_pending() {
        let mut fx = Fixture::new().await;
        fx.migrate(TargetVersion::Exact(2)).await.unwrap();

        let records = fx.migrate(TargetVersion::Max).await.unwrap();
        assert_eq!(versions(&records), vec![3, 4, MAX_REVISION]);

        let again = fx.migrate(TargetVersion::Max).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_partial_rollback() {
        let mut fx = Fixture::new().await;
        fx.migrate(TargetVersion::Max).await.unwrap();
        let back = fx.migrate(TargetVersion::Exact(3)).await.unwrap();
        assert_eq!(versions(&back), vec![5, 4]);
    }

    #[tokio::test]
    async fn test_changed_file_fails_checksum() {
        let mut fx = Fixture::new().await;
        fx.migrate(TargetVersion::Exact(1)).await.unwrap();
        fs::write(
            fx.dir.path().join("migrations/001.do.table-1.sql"),
            "CREATE TABLE t1 (id INTEGER, extra TEXT);",
        )
        .unwrap();

        let err = fx.migrate(TargetVersion::Max).await.unwrap_err();
        assert!(err.to_string().starts_with("Checksum mismatch for migration 1"));

        let mut request = fx.request(TargetVersion::Max);
        request.validate_checksum = false;
        let records = SqlMigrationEngine::new()
            .migrate(&mut fx.client, &request)
            .await
            .unwrap();
        assert_eq!(versions(&records), vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_missing_undo_file() {
        let mut fx = Fixture::new().await;
        fx.migrate(TargetVersion::Exact(2)).await.unwrap();
        fs::remove_file(fx.dir.path().join("migrations/002.undo.table-2.sql")).unwrap();

        let err = fx.migrate(TargetVersion::Exact(0)).await.unwrap_err();
        assert_eq!(err.to_string(), "No undo migration found for version 2");
    }

    #[tokio::test]
    async fn test_failing_statement_stops_run() {
        let mut fx = Fixture::new().await;
        fs::write(
            fx.dir.path().join("migrations/002.do.table-2.sql"),
            "CREATE TABLE t1 (id INTEGER);",
        )
        .unwrap();

        let err = fx.migrate(TargetVersion::Max).await.unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
        assert!(err.to_string().starts_with("do migration 2"));

        let history = SchemaHistory::new("schemaversion", Driver::Sqlite);
        let applied = history.applied(&mut fx.client).await.unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].version, 1);
    }

    #[test]
    fn test_plan_max_when_database_is_ahead() {
        let applied = vec![AppliedMigration {
            version: 9,
            name: None,
            checksum: None,
        }];
        let steps = plan(&[], &applied, 9, TargetVersion::Max).unwrap();
        assert!(steps.is_empty());
    }
}
