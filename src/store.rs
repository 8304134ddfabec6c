use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::DownloadError;
use crate::model::{SegmentRecord, SegmentStatus};

/// Durable keyed map from segment scratch-path to segment record. A trait so
/// the on-disk format is swappable; the interface is the contract, not any
/// particular backing implementation.
///
/// Thread-safety: the contract only requires serialized access, since only
/// the coordinator (and the scheduler it hands a reference to) ever call
/// this. `FileSegmentStore` guards its state with a `std::sync::Mutex`
/// accordingly.
pub trait SegmentStore: Send + Sync {
    fn put(&self, record: &SegmentRecord) -> Result<(), DownloadError>;
    fn get(&self, scratch_path: &Path) -> Result<Option<SegmentRecord>, DownloadError>;
    fn update_status(
        &self,
        scratch_path: &Path,
        status: SegmentStatus,
    ) -> Result<(), DownloadError>;
}

#[derive(Serialize, Deserialize)]
enum JournalEntry {
    Put(SegmentRecord),
    StatusUpdate { key: String, status: SegmentStatus },
}

struct StoreState {
    records: HashMap<String, SegmentRecord>,
    file: std::fs::File,
}

/// Append-only journal backing: an initial `Put` entry per record, followed
/// by `StatusUpdate` entries for every status transition. Guarantees writes
/// are committed (via `sync_all`) before `put`/`update_status` return, so a
/// crash cannot lose a completed-status record — this is what makes
/// cross-run resume safe.
pub struct FileSegmentStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl FileSegmentStore {
    pub fn load_or_create(path: PathBuf) -> Result<Self, DownloadError> {
        let mut records = HashMap::new();

        if path.exists() {
            let mut reader = OpenOptions::new().read(true).open(&path)?;
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;

            let mut offset = 0usize;
            while offset < data.len() {
                match bincode::deserialize::<JournalEntry>(&data[offset..]) {
                    Ok(entry) => {
                        let size = bincode::serialized_size(&entry)
                            .map_err(|err| DownloadError::Store(err.to_string()))?
                            as usize;
                        apply(&mut records, entry);
                        offset += size;
                    }
                    Err(_) => break, // stop on partial/corrupt trailing entry
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            path,
            state: Mutex::new(StoreState { records, file }),
        })
    }

    /// All records currently known to the store, ordered by `segment_index`.
    /// Not part of the `SegmentStore` trait; an inherent convenience the
    /// coordinator uses to detect a resumable prior run.
    pub fn all(&self) -> Vec<SegmentRecord> {
        let state = self.state.lock().unwrap();
        let mut records: Vec<SegmentRecord> = state.records.values().cloned().collect();
        records.sort_by_key(|record| record.segment_index);
        records
    }

    /// Discards all persisted records and truncates the journal. Used by the
    /// Coordinator when an existing store doesn't match a fresh plan (e.g.
    /// the remote resource's size changed since the last run).
    pub fn clear(&self) -> Result<(), DownloadError> {
        let mut state = self.state.lock().unwrap();
        state.records.clear();
        state.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(())
    }

    fn append(&self, entry: &JournalEntry) -> Result<(), DownloadError> {
        let mut state = self.state.lock().unwrap();
        let bytes =
            bincode::serialize(entry).map_err(|err| DownloadError::Store(err.to_string()))?;
        state.file.write_all(&bytes)?;
        state.file.sync_all()?;
        Ok(())
    }
}

fn apply(records: &mut HashMap<String, SegmentRecord>, entry: JournalEntry) {
    match entry {
        JournalEntry::Put(record) => {
            records.insert(record.store_key(), record);
        }
        JournalEntry::StatusUpdate { key, status } => {
            if let Some(record) = records.get_mut(&key) {
                record.status = status;
            }
        }
    }
}

impl SegmentStore for FileSegmentStore {
    fn put(&self, record: &SegmentRecord) -> Result<(), DownloadError> {
        self.append(&JournalEntry::Put(record.clone()))?;
        let mut state = self.state.lock().unwrap();
        state.records.insert(record.store_key(), record.clone());
        Ok(())
    }

    fn get(&self, scratch_path: &Path) -> Result<Option<SegmentRecord>, DownloadError> {
        let key = scratch_path.to_string_lossy().into_owned();
        let state = self.state.lock().unwrap();
        Ok(state.records.get(&key).cloned())
    }

    fn update_status(
        &self,
        scratch_path: &Path,
        status: SegmentStatus,
    ) -> Result<(), DownloadError> {
        let key = scratch_path.to_string_lossy().into_owned();
        {
            let mut state = self.state.lock().unwrap();
            let record = state
                .records
                .get_mut(&key)
                .ok_or_else(|| DownloadError::Store(format!("unknown segment key {key}")))?;
            record.status = status;
        }
        self.append(&JournalEntry::StatusUpdate { key, status })
    }
}
