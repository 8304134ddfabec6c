use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;

/// Transfer strategy selected by the caller.
///
/// `worker_count` on [`DownloadRequest`] is only consulted for
/// [`Mode::SegmentedPool`]; [`Mode::SegmentedFixed`] always spawns exactly
/// `segment_count` workers (one per segment, no queue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sequential,
    SegmentedPool,
    SegmentedFixed,
}

/// Caller-supplied event sinks. Modeled as plain callbacks rather than a
/// tagged event stream, and used consistently that way throughout the crate.
#[derive(Default)]
pub struct Sinks {
    pub on_progress: Option<Box<dyn Fn(f64) + Send + Sync>>,
    pub on_complete: Option<Box<dyn Fn(&Path) + Send + Sync>>,
    pub on_error: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl std::fmt::Debug for Sinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sinks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl Sinks {
    pub fn progress(&self, percent: f64) {
        if let Some(cb) = &self.on_progress {
            cb(percent);
        }
    }

    pub fn complete(&self, path: &Path) {
        if let Some(cb) = &self.on_complete {
            cb(path);
        }
    }

    pub fn error(&self, message: &str) {
        if let Some(cb) = &self.on_error {
            cb(message);
        }
    }
}

/// Immutable request describing one download. Created by the caller/embedder.
#[derive(Debug)]
pub struct DownloadRequest {
    pub url: Url,
    pub destination_directory: PathBuf,
    pub mode: Mode,
    pub segment_count: usize,
    pub worker_count: usize,
    pub max_retries: usize,
    pub allow_resume: bool,
    pub request_timeout: Option<Duration>,
    pub sinks: Sinks,
}

impl DownloadRequest {
    /// Requires segment_count >= 1 and worker_count >= 1, otherwise an
    /// immediate fatal error (`ConfigInvalid`) before any I/O.
    pub fn validate(&self) -> Result<(), crate::error::DownloadError> {
        if self.segment_count == 0 {
            return Err(crate::error::DownloadError::ConfigInvalid(
                "segment_count must be >= 1".into(),
            ));
        }
        if self.worker_count == 0 {
            return Err(crate::error::DownloadError::ConfigInvalid(
                "worker_count must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// Produced by probing the resource before any download starts.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
    pub total_bytes: u64,
    pub range_supported: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SegmentStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One planned, persisted segment. Keyed by `scratch_path` in the store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SegmentRecord {
    pub segment_index: usize,
    pub start_byte: u64,
    pub end_byte: u64,
    pub scratch_path: PathBuf,
    pub status: SegmentStatus,
}

impl SegmentRecord {
    pub fn len(&self) -> u64 {
        self.end_byte.saturating_sub(self.start_byte) + 1
    }

    pub fn store_key(&self) -> String {
        self.scratch_path.to_string_lossy().into_owned()
    }
}

/// Derived progress percentage. `0 <= percent`; reaches 100 on success. The
/// byte sum that feeds this may briefly exceed `total_bytes` under retries,
/// so callers should clamp for display, which is exactly what this helper
/// does.
pub fn percent(bytes_downloaded_total: u64, total_bytes: u64) -> f64 {
    if total_bytes == 0 {
        return 100.0;
    }
    let fraction = bytes_downloaded_total as f64 / total_bytes as f64;
    (fraction * 100.0).min(100.0)
}
