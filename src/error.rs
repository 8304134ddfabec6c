use thiserror::Error;

/// Error taxonomy for the segmented-parallel download coordinator.
///
/// Every fatal path the coordinator can take ends in one of these variants;
/// see the module docs on [`crate::coordinator`] for how each one propagates.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("failed to probe resource: {0}")]
    ProbeFailed(String),

    #[error("segment {segment_index} failed: {reason}")]
    SegmentFailed { segment_index: usize, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("assembly failed: {0}")]
    AssemblyFailed(String),

    #[error("download failed: {0}")]
    Failed(String),

    #[error("integrity mismatch: expected {expected} bytes, got {actual}")]
    IntegrityMismatch { expected: u64, actual: u64 },

    #[error("segment store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
