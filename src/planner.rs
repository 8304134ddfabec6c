use std::path::Path;

use crate::error::DownloadError;
use crate::model::{SegmentRecord, SegmentStatus};
use crate::store::SegmentStore;

/// Deterministic partitioning: `segment_size = ceil(total / n)`; the last
/// segment absorbs the remainder. Persists each record as `Pending` via
/// `store` before returning.
pub fn plan(
    total: u64,
    n: usize,
    dir: &Path,
    file_name: &str,
    store: &dyn SegmentStore,
) -> Result<Vec<SegmentRecord>, DownloadError> {
    if total == 0 || n == 0 {
        return Err(DownloadError::ConfigInvalid(
            "planner requires total > 0 and segment_count > 0".into(),
        ));
    }

    let n_u64 = n as u64;
    let segment_size = (total + n_u64 - 1) / n_u64;

    let mut records = Vec::with_capacity(n);
    let mut start = 0u64;
    for i in 0..n {
        let end = if i == n - 1 {
            total - 1
        } else {
            (start + segment_size - 1).min(total - 1)
        };
        let scratch_path = dir.join(format!("{file_name}.part{i}"));
        let record = SegmentRecord {
            segment_index: i,
            start_byte: start,
            end_byte: end,
            scratch_path,
            status: SegmentStatus::Pending,
        };
        store.put(&record)?;
        records.push(record);
        start = end + 1;
    }

    Ok(records)
}
