use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::domain::{CertificationSubmission, StudentId, SubmissionId};
use super::repository::{check_version, RepositoryError, RequestContext, SubmissionRepository};

/// Process-local store keyed by student.
#[derive(Debug, Default)]
pub struct InMemorySubmissionRepository {
    records: Mutex<HashMap<StudentId, CertificationSubmission>>,
}

impl InMemorySubmissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SubmissionRepository for InMemorySubmissionRepository {
    fn save(
        &self,
        ctx: &RequestContext,
        record: CertificationSubmission,
    ) -> Result<(), RepositoryError> {
        ctx.ensure_active()?;
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        check_version(guard.get(&record.student_id), &record)?;
        guard.insert(record.student_id.clone(), record);
        Ok(())
    }

    fn find(
        &self,
        ctx: &RequestContext,
        id: &SubmissionId,
    ) -> Result<Option<CertificationSubmission>, RepositoryError> {
        ctx.ensure_active()?;
        let guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.values().find(|record| &record.id == id).cloned())
    }

    fn find_by_student(
        &self,
        ctx: &RequestContext,
        student_id: &StudentId,
    ) -> Result<Option<CertificationSubmission>, RepositoryError> {
        ctx.ensure_active()?;
        let guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(student_id).cloned())
    }

    fn find_all(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<CertificationSubmission>, RepositoryError> {
        ctx.ensure_active()?;
        let guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.values().cloned().collect())
    }
}

/// Keeps every submission in one JSON document on disk.
///
/// Each read loads the document so separate handles, in this process or another, observe each
/// other's commits. A missing or malformed document reads as an empty store. Saves hold an
/// exclusive lock on a sibling `.lock` file across load, version check and write, and replace
/// the document by renaming a uniquely named temp file over it.
#[derive(Debug)]
pub struct SnapshotFileRepository {
    path: PathBuf,
}

impl SnapshotFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<CertificationSubmission>, RepositoryError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(unavailable(err)),
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "submission snapshot is malformed; treating store as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    fn directory(&self) -> &Path {
        self.path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Blocks until this handle owns the snapshot. Dropping the returned file releases it.
    fn lock(&self) -> Result<File, RepositoryError> {
        fs::create_dir_all(self.directory()).map_err(unavailable)?;
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(unavailable)?;
        lock.lock_exclusive().map_err(unavailable)?;
        Ok(lock)
    }

    fn persist(&self, records: &[CertificationSubmission]) -> Result<(), RepositoryError> {
        let payload = serde_json::to_vec_pretty(records).map_err(unavailable)?;

        let mut staging = NamedTempFile::new_in(self.directory()).map_err(unavailable)?;
        staging.write_all(&payload).map_err(unavailable)?;
        staging.as_file().sync_all().map_err(unavailable)?;
        staging
            .persist(&self.path)
            .map_err(|err| unavailable(err.error))?;

        debug!(path = %self.path.display(), records = records.len(), "submission snapshot written");
        Ok(())
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }
}

fn unavailable(err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(err.to_string())
}

impl SubmissionRepository for SnapshotFileRepository {
    fn save(
        &self,
        ctx: &RequestContext,
        record: CertificationSubmission,
    ) -> Result<(), RepositoryError> {
        ctx.ensure_active()?;
        let _lock = self.lock()?;

        let mut records = self.load()?;
        let position = records
            .iter()
            .position(|existing| existing.student_id == record.student_id);
        check_version(position.map(|index| &records[index]), &record)?;

        match position {
            Some(index) => records[index] = record,
            None => records.push(record),
        }

        self.persist(&records)
    }

    fn find(
        &self,
        ctx: &RequestContext,
        id: &SubmissionId,
    ) -> Result<Option<CertificationSubmission>, RepositoryError> {
        ctx.ensure_active()?;
        Ok(self.load()?.into_iter().find(|record| &record.id == id))
    }

    fn find_by_student(
        &self,
        ctx: &RequestContext,
        student_id: &StudentId,
    ) -> Result<Option<CertificationSubmission>, RepositoryError> {
        ctx.ensure_active()?;
        Ok(self
            .load()?
            .into_iter()
            .find(|record| &record.student_id == student_id))
    }

    fn find_all(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<CertificationSubmission>, RepositoryError> {
        ctx.ensure_active()?;
        self.load()
    }
}
