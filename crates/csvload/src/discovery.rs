//! Source file discovery

use crate::config::SourceConfig;
use crate::error::{IngestError, Result};
use chrono::{DateTime, Local, NaiveDateTime, SubsecRound};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// A file found in the source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Destination table name: the file name without its extension
    pub table_name: String,
    /// Absolute path of the file
    pub path: PathBuf,
    /// Modification time in local time, truncated to microseconds
    pub modified_at: NaiveDateTime,
}

impl SourceFile {
    /// Build a record for one path, reading its modification time
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path = std::fs::canonicalize(path).map_err(|e| IngestError::io(path, e))?;

        let table_name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .ok_or_else(|| IngestError::InvalidIdentifier(path.display().to_string()))?;

        let modified = std::fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .map_err(|e| IngestError::io(&path, e))?;

        Ok(Self {
            table_name,
            path,
            modified_at: local_timestamp(modified),
        })
    }
}

/// Convert a filesystem time to the naive local timestamp stored in checkpoints
///
/// PostgreSQL `TIMESTAMP` keeps microseconds; truncating here keeps a stored
/// checkpoint exactly equal to the value it was computed from.
pub fn local_timestamp(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local().trunc_subsecs(6)
}

/// List loadable files in the source directory, sorted by file name
///
/// Sub-directories and entries whose name starts with the reserved prefix
/// are skipped.
pub fn discover(config: &SourceConfig) -> Result<Vec<SourceFile>> {
    let dir = &config.dir;
    if !dir.is_dir() {
        return Err(IngestError::SourceDirMissing(dir.clone()));
    }

    let mut files = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| IngestError::io(dir, e))?;
        let file_name = entry.file_name();

        let Some(name) = file_name.to_str() else {
            warn!(path = %entry.path().display(), "Skipping file with non UTF-8 name");
            continue;
        };

        if !config.reserved_prefix.is_empty() && name.starts_with(&config.reserved_prefix) {
            debug!(file = %name, "Skipping reserved file");
            continue;
        }

        let file_type = entry.file_type().map_err(|e| IngestError::io(entry.path(), e))?;
        if file_type.is_dir() {
            debug!(file = %name, "Skipping directory");
            continue;
        }

        files.push(SourceFile::from_path(entry.path())?);
    }

    files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));

    debug!(dir = %dir.display(), count = files.len(), "Discovered source files");
    Ok(files)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use std::fs;
    use tempfile::TempDir;

    fn source(dir: &TempDir) -> SourceConfig {
        SourceConfig {
            dir: dir.path().to_path_buf(),
            reserved_prefix: "README".to_string(),
        }
    }

    #[test]
    fn test_discover_skips_reserved_and_directories() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("patients.csv"), "id\n1\n").unwrap();
        fs::write(dir.path().join("appointments.csv"), "id\n1\n").unwrap();
        fs::write(dir.path().join("README.md"), "docs").unwrap();
        fs::write(dir.path().join("README_schema.csv"), "id\n").unwrap();
        fs::create_dir(dir.path().join("archive")).unwrap();

        let files = discover(&source(&dir)).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.table_name.as_str()).collect();

        assert_eq!(names, vec!["appointments", "patients"]);
        assert!(files.iter().all(|f| f.path.is_absolute()));
    }

    #[test]
    fn test_table_name_strips_only_last_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lab.results.csv"), "id\n").unwrap();

        let files = discover(&source(&dir)).unwrap();
        assert_eq!(files[0].table_name, "lab.results");
    }

    #[test]
    fn test_empty_prefix_keeps_everything() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "docs").unwrap();

        let config = SourceConfig {
            dir: dir.path().to_path_buf(),
            reserved_prefix: String::new(),
        };
        assert_eq!(discover(&config).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let config = SourceConfig {
            dir: dir.path().join("nope"),
            reserved_prefix: "README".to_string(),
        };

        assert!(matches!(
            discover(&config),
            Err(IngestError::SourceDirMissing(_))
        ));
    }

    #[test]
    fn test_modified_at_has_microsecond_precision() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visits.csv");
        fs::write(&path, "id\n").unwrap();

        let file = SourceFile::from_path(&path).unwrap();
        assert_eq!(file.modified_at.nanosecond() % 1_000, 0);

        let expected = local_timestamp(fs::metadata(&path).unwrap().modified().unwrap());
        assert_eq!(file.modified_at, expected);
    }
}
