use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::error::DownloadError;
use crate::model::SegmentRecord;

/// Concatenates segment scratch files, in `segment_index` order, into the
/// final file. A missing scratch file is a fatal `AssemblyFailed` — the
/// partially-written final file is left in place for inspection, never
/// deleted here.
pub fn assemble(records: &[SegmentRecord], final_path: &Path) -> Result<(), DownloadError> {
    let mut ordered: Vec<&SegmentRecord> = records.iter().collect();
    ordered.sort_by_key(|record| record.segment_index);

    let mut out = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(final_path)?;

    for record in ordered {
        let mut part = File::open(&record.scratch_path).map_err(|err| {
            DownloadError::AssemblyFailed(format!(
                "segment {} scratch file {} missing or unreadable: {err}",
                record.segment_index,
                record.scratch_path.display()
            ))
        })?;
        io::copy(&mut part, &mut out).map_err(|err| {
            DownloadError::AssemblyFailed(format!(
                "failed copying segment {} into {}: {err}",
                record.segment_index,
                final_path.display()
            ))
        })?;
    }

    out.sync_all()?;
    Ok(())
}

/// Deletes every segment's scratch file. Callers only reach this after
/// assembly AND the integrity check both succeed — never before, so a failed
/// run always leaves its scratch files behind for retry/inspection.
pub fn cleanup_scratch_files(records: &[SegmentRecord]) {
    for record in records {
        if let Err(err) = fs::remove_file(&record.scratch_path) {
            log::warn!(
                "failed to remove scratch file {}: {err}",
                record.scratch_path.display()
            );
        }
    }
}
