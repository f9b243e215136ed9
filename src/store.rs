//! Durable endpoint storage
//!
//! Join persists each endpoint after its interface exists. The JSON store
//! keeps one file per endpoint under `<state_dir>/endpoints/`. Processes
//! sharing a state directory serialize through an exclusive `flock` on
//! `<state_dir>/lock`.

use crate::endpoint::EndpointRecord;
use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::info;

const LOCK_FILE: &str = "lock";

/// Persistence capability used by the driver
pub trait EndpointStore: Send + Sync {
    /// Insert or replace an endpoint record
    fn upsert_endpoint(&self, record: &EndpointRecord) -> Result<()>;

    /// Load every persisted endpoint record
    fn load_endpoints(&self) -> Result<Vec<EndpointRecord>>;
}

/// File-backed store writing one JSON document per endpoint
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
    dir: PathBuf,
}

impl JsonStore {
    /// Open the store under `state_dir`, creating it if needed
    pub fn open(state_dir: &Path) -> Result<Self> {
        let dir = state_dir.join("endpoints");
        fs::create_dir_all(&dir).map_err(|e| {
            Error::Store(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            root: state_dir.to_path_buf(),
            dir,
        })
    }

    /// Take the state directory lock, waiting for other holders
    pub fn lock(&self) -> Result<StateLock> {
        let path = self.root.join(LOCK_FILE);
        if let Some(held) = StateLock::try_acquire(&path)? {
            return Ok(held);
        }
        info!(lock = %path.display(), "Waiting for another macvland process");
        StateLock::acquire(&path)
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(Error::InvalidEndpointId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

/// Exclusive lock on the state directory, released on drop
#[derive(Debug)]
pub struct StateLock {
    _file: File,
}

impl StateLock {
    /// Block until the lock at `path` is held
    pub fn acquire(path: &Path) -> Result<Self> {
        Self::flock(path, libc::LOCK_EX)?.ok_or_else(|| {
            Error::Store(format!("Lock {} unavailable", path.display()))
        })
    }

    /// Take the lock at `path` if nobody holds it
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        Self::flock(path, libc::LOCK_EX | libc::LOCK_NB)
    }

    fn flock(path: &Path, operation: libc::c_int) -> Result<Option<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| Error::Store(format!("Failed to open {}: {}", path.display(), e)))?;

        if unsafe { libc::flock(file.as_raw_fd(), operation) } == 0 {
            return Ok(Some(Self { _file: file }));
        }

        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock {
            return Ok(None);
        }
        Err(Error::Store(format!(
            "Failed to lock {}: {}",
            path.display(),
            err
        )))
    }
}

impl EndpointStore for JsonStore {
    fn upsert_endpoint(&self, record: &EndpointRecord) -> Result<()> {
        let path = self.path_for(&record.id)?;
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(record)?;

        // Write-then-rename so a crash never leaves a torn record
        fs::write(&tmp, data)
            .map_err(|e| Error::Store(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| Error::Store(format!("Failed to commit {}: {}", path.display(), e)))?;

        Ok(())
    }

    fn load_endpoints(&self) -> Result<Vec<EndpointRecord>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = fs::read(&path)?;
            let record: EndpointRecord = serde_json::from_slice(&data).map_err(|e| {
                Error::Store(format!("Corrupt endpoint record {}: {}", path.display(), e))
            })?;
            records.push(record);
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}
