//! Audit log persisted as JSON lines through `cap_std`.
//!
//! Each record is one line. Appends open the file in append mode under a
//! process-local lock; reads parse the whole file and skip lines that do not
//! decode, logging each at warn level.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use cap_std::fs::{Dir, OpenOptions};
use cap_std::ambient_authority;
use tracing::warn;

use crate::domain::ports::{AuditLogRepository, AuditLogRepositoryError};
use crate::domain::{ApiCallRecord, AuditFilter};

#[derive(Debug)]
struct JsonlFile {
    dir: Dir,
    file_name: PathBuf,
    append_lock: Mutex<()>,
}

/// [`AuditLogRepository`] writing to a single `.jsonl` file.
#[derive(Debug, Clone)]
pub struct JsonlAuditLog {
    file: Arc<JsonlFile>,
}

impl JsonlAuditLog {
    /// Open (or prepare to create) the log at `path`.
    ///
    /// The parent directory is created when missing. The file itself is
    /// created on first append.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditLogRepositoryError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| {
                AuditLogRepositoryError::backend(format!(
                    "audit log path {} has no file name",
                    path.display()
                ))
            })?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Dir::create_ambient_dir_all(parent, ambient_authority())
            .map_err(|err| io_error(parent, &err))?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority())
            .map_err(|err| io_error(parent, &err))?;
        Ok(Self {
            file: Arc::new(JsonlFile {
                dir,
                file_name,
                append_lock: Mutex::new(()),
            }),
        })
    }
}

fn io_error(path: &Path, err: &io::Error) -> AuditLogRepositoryError {
    AuditLogRepositoryError::backend(format!("{}: {err}", path.display()))
}

impl JsonlFile {
    fn append_line(&self, line: &str) -> Result<(), AuditLogRepositoryError> {
        let _guard = self
            .append_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        let mut file = self
            .dir
            .open_with(&self.file_name, &options)
            .map_err(|err| io_error(&self.file_name, &err))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.flush())
            .map_err(|err| io_error(&self.file_name, &err))
    }

    fn read_all(&self) -> Result<Vec<ApiCallRecord>, AuditLogRepositoryError> {
        let contents = match self.dir.read_to_string(&self.file_name) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(&self.file_name, &err)),
        };
        Ok(contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(index, line)| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(line = index + 1, error = %err, "skipping malformed audit line");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl AuditLogRepository for JsonlAuditLog {
    async fn append(&self, record: &ApiCallRecord) -> Result<(), AuditLogRepositoryError> {
        let line = serde_json::to_string(record)
            .map_err(|err| AuditLogRepositoryError::serialization(err.to_string()))?;
        let file = Arc::clone(&self.file);
        tokio::task::spawn_blocking(move || file.append_line(&line))
            .await
            .map_err(|err| AuditLogRepositoryError::backend(err.to_string()))?
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<ApiCallRecord>, AuditLogRepositoryError> {
        let file = Arc::clone(&self.file);
        let records = tokio::task::spawn_blocking(move || file.read_all())
            .await
            .map_err(|err| AuditLogRepositoryError::backend(err.to_string()))??;
        Ok(filter.apply(records.iter().rev()))
    }
}
