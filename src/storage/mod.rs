//! Session persistence
//!
//! Records are append-only and grouped by calendar day. The JSON-lines store
//! writes one file per day (`sessions-YYYY-MM-DD.jsonl`) with one record per
//! line; readers may list a day while another record is being appended.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::NaiveDate;

use crate::error::{log_storage_error, StorageError};
use crate::session::{local_day, SessionRecord};

const FILE_PREFIX: &str = "sessions-";
const FILE_SUFFIX: &str = ".jsonl";

/// Persistence collaborator receiving one record per stopped session.
pub trait SessionStore: Send + Sync {
    fn append(&self, record: &SessionRecord) -> Result<(), StorageError>;
    fn list_day(&self, day: NaiveDate) -> Result<Vec<SessionRecord>, StorageError>;
    /// Days with at least one record, oldest first.
    fn days(&self) -> Result<Vec<NaiveDate>, StorageError>;
}

/// Calendar day (local time) a record is filed under.
pub fn record_day(record: &SessionRecord) -> NaiveDate {
    local_day(record.summary.started_at)
}

/// One JSON-lines file per day under a directory.
pub struct JsonlSessionStore {
    directory: PathBuf,
    lock: RwLock<()>,
}

impl JsonlSessionStore {
    /// Open a store rooted at `directory`, creating it if needed.
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self, StorageError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).map_err(|err| io_error(&directory, err))?;
        log::info!("[SessionStore] Storing sessions under {}", directory.display());
        Ok(Self {
            directory,
            lock: RwLock::new(()),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn day_path(&self, day: NaiveDate) -> PathBuf {
        self.directory
            .join(format!("{}{}{}", FILE_PREFIX, day.format("%Y-%m-%d"), FILE_SUFFIX))
    }
}

impl SessionStore for JsonlSessionStore {
    fn append(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let line = serde_json::to_string(record)?;
        let path = self.day_path(record_day(record));

        let _guard = self.lock.write().map_err(|_| StorageError::LockPoisoned)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| io_error(&path, err))?;
        writeln!(file, "{}", line).map_err(|err| io_error(&path, err))?;

        log::info!(
            "[SessionStore] Appended session ({} pulses) to {}",
            record.summary.total_pulses,
            path.display()
        );
        Ok(())
    }

    fn list_day(&self, day: NaiveDate) -> Result<Vec<SessionRecord>, StorageError> {
        let path = self.day_path(day);
        let _guard = self.lock.read().map_err(|_| StorageError::LockPoisoned)?;

        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(&path, err)),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|err| io_error(&path, err))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => log::warn!(
                    "[SessionStore] Skipping malformed line {} in {}: {}",
                    index + 1,
                    path.display(),
                    err
                ),
            }
        }
        Ok(records)
    }

    fn days(&self) -> Result<Vec<NaiveDate>, StorageError> {
        let _guard = self.lock.read().map_err(|_| StorageError::LockPoisoned)?;
        let entries = fs::read_dir(&self.directory).map_err(|err| io_error(&self.directory, err))?;

        let mut days: Vec<NaiveDate> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                let stamp = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
                NaiveDate::parse_from_str(stamp, "%Y-%m-%d").ok()
            })
            .collect();
        days.sort();
        Ok(days)
    }
}

/// In-process store for replays and tests.
#[derive(Default)]
pub struct MemorySessionStore {
    records: Mutex<BTreeMap<NaiveDate, Vec<SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record in filing order.
    pub fn all(&self) -> Result<Vec<SessionRecord>, StorageError> {
        let records = self.records.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.values().flatten().cloned().collect())
    }
}

impl SessionStore for MemorySessionStore {
    fn append(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut records = self.records.lock().map_err(|_| StorageError::LockPoisoned)?;
        records
            .entry(record_day(record))
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn list_day(&self, day: NaiveDate) -> Result<Vec<SessionRecord>, StorageError> {
        let records = self.records.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.get(&day).cloned().unwrap_or_default())
    }

    fn days(&self) -> Result<Vec<NaiveDate>, StorageError> {
        let records = self.records.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.keys().copied().collect())
    }
}

fn io_error(path: &Path, err: std::io::Error) -> StorageError {
    let err = StorageError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    };
    log_storage_error(&err, "session_store");
    err
}
