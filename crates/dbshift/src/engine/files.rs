//! Migration file discovery.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{Action, EngineError, EngineResult};

/// A migration file that follows the naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub version: u64,
    pub action: Action,
    pub name: Option<String>,
    pub path: PathBuf,
    pub sql: String,
    /// SHA-256 of the body with CRLF line endings normalized to LF.
    pub checksum: String,
}

/// Find migration files matching the glob `pattern`, sorted by version
/// then action.
///
/// A pattern naming a directory is treated as `<dir>/*`. Matching files that
/// do not follow `<version>.<do|undo>[.<name>].sql` are skipped.
pub fn discover(pattern: &str) -> EngineResult<Vec<MigrationFile>> {
    let pattern = if Path::new(pattern).is_dir() {
        format!("{}/*", glob::Pattern::escape(pattern.trim_end_matches(['/', '\\'])))
    } else {
        pattern.to_string()
    };

    let paths = glob::glob(&pattern).map_err(|e| {
        EngineError::Execution(format!("Invalid migration pattern '{}': {}", pattern, e))
    })?;

    let mut migrations = Vec::new();
    for path in paths {
        let path = path.map_err(glob::GlobError::into_error)?;
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let Some((version, action, name)) = parse_file_name(&file_name) else {
            debug!("Skipping {}: not a migration file name", path.display());
            continue;
        };

        let sql = std::fs::read_to_string(&path)?;
        migrations.push(MigrationFile {
            version,
            action,
            name,
            checksum: checksum(&sql),
            path,
            sql,
        });
    }

    if migrations.is_empty() {
        return Err(EngineError::NoMigrationFiles(pattern));
    }

    migrations.sort_by_key(|m| (m.version, m.action));
    if let Some(pair) = migrations
        .windows(2)
        .find(|w| w[0].version == w[1].version && w[0].action == w[1].action)
    {
        return Err(EngineError::Conflict {
            version: pair[0].version,
            action: pair[0].action,
        });
    }

    debug!("Found {} migration files for {}", migrations.len(), pattern);
    Ok(migrations)
}

/// Split `<version>.<do|undo>[.<name>].sql` into its parts.
///
/// The version must be a positive integer; leading zeros are allowed.
pub fn parse_file_name(file_name: &str) -> Option<(u64, Action, Option<String>)> {
    if !file_name.to_ascii_lowercase().ends_with(".sql") {
        return None;
    }
    let stem = &file_name[..file_name.len() - 4];

    let mut parts = stem.splitn(3, '.');
    let version = parts.next()?;
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let version: u64 = version.parse().ok().filter(|v| *v > 0)?;
    let action = Action::parse(parts.next()?)?;
    let name = parts.next().filter(|s| !s.is_empty()).map(str::to_string);

    Some((version, action, name))
}

fn checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.replace("\r\n", "\n").as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, sql: &str) {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, sql).unwrap();
    }

    fn pattern(dir: &TempDir, glob: &str) -> String {
        dir.path().join(glob).to_string_lossy().into_owned()
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(parse_file_name("001.do.sql"), Some((1, Action::Do, None)));
        assert_eq!(
            parse_file_name("0002.undo.drop-users.sql"),
            Some((2, Action::Undo, Some("drop-users".to_string())))
        );
        assert_eq!(
            parse_file_name("3.do.v1.2.sql"),
            Some((3, Action::Do, Some("v1.2".to_string())))
        );
        assert_eq!(parse_file_name("000.do.sql"), None);
        assert_eq!(parse_file_name("001.redo.sql"), None);
        assert_eq!(parse_file_name("abc.do.sql"), None);
        assert_eq!(parse_file_name("001.do.js"), None);
        assert_eq!(parse_file_name("README.md"), None);
    }

    #[test]
    fn test_checksum_normalizes_line_endings() {
        assert_eq!(checksum("SELECT 1;\r\nSELECT 2;"), checksum("SELECT 1;\nSELECT 2;"));
        assert_ne!(checksum("SELECT 1;"), checksum("SELECT 2;"));
        assert_eq!(checksum("").len(), 64);
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        write(&dir, "002.do.sql", "CREATE TABLE b (id INT);");
        write(&dir, "001.undo.sql", "DROP TABLE a;");
        write(&dir, "001.do.create-a.sql", "CREATE TABLE a (id INT);");
        write(&dir, "notes.txt", "not a migration");

        let files = discover(&pattern(&dir, "*")).unwrap();
        let keys: Vec<(u64, Action)> = files.iter().map(|f| (f.version, f.action)).collect();
        assert_eq!(
            keys,
            vec![(1, Action::Do), (1, Action::Undo), (2, Action::Do)]
        );
        assert_eq!(files[0].name.as_deref(), Some("create-a"));
    }

    #[test]
    fn test_discover_directory_pattern() {
        let dir = TempDir::new().unwrap();
        write(&dir, "001.do.sql", "SELECT 1;");
        let files = discover(&dir.path().to_string_lossy()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_discover_no_files() {
        let dir = TempDir::new().unwrap();
        let err = discover(&pattern(&dir, "*")).unwrap_err();
        assert!(err.to_string().starts_with("No migration files found"));

        let err = discover(&pattern(&dir, "missing/*")).unwrap_err();
        assert!(matches!(err, EngineError::NoMigrationFiles(_)));
    }

    #[test]
    fn test_discover_conflict() {
        let dir = TempDir::new().unwrap();
        write(&dir, "001.do.sql", "SELECT 1;");
        write(&dir, "002.do.first.sql", "SELECT 2;");
        write(&dir, "002.do.second.sql", "SELECT 3;");

        let err = discover(&pattern(&dir, "*")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Two migrations found with version 2 and action do"
        );
    }

    #[test]
    fn test_discover_recursive_and_directory_wildcards() {
        let dir = TempDir::new().unwrap();
        write(&dir, "migrations/002.do.sql", "SELECT 2;");
        write(&dir, "migrations/2024/001.do.sql", "SELECT 1;");
        write(&dir, "migrations/2025/003.do.sql", "SELECT 3;");

        let all = discover(&pattern(&dir, "migrations/**/*.sql")).unwrap();
        let versions: Vec<u64> = all.iter().map(|f| f.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);

        let nested = discover(&pattern(&dir, "migrations/20*/*.sql")).unwrap();
        let versions: Vec<u64> = nested.iter().map(|f| f.version).collect();
        assert_eq!(versions, vec![1, 3]);
    }

    #[test]
    fn test_discover_character_class() {
        let dir = TempDir::new().unwrap();
        write(&dir, "001.do.sql", "SELECT 1;");
        write(&dir, "002.do.sql", "SELECT 2;");
        write(&dir, "003.do.sql", "SELECT 3;");

        let files = discover(&pattern(&dir, "00[12].do.sql")).unwrap();
        let versions: Vec<u64> = files.iter().map(|f| f.version).collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn test_discover_invalid_pattern() {
        let dir = TempDir::new().unwrap();
        let err = discover(&pattern(&dir, "[0-9.sql")).unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
    }
}
