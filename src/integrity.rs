use std::fs;
use std::path::Path;

use crate::error::DownloadError;

/// Size-only integrity check: compares the assembled file's length against
/// the expected total. Does not delete the file either way; that decision
/// belongs to the caller (the coordinator only cleans up scratch files, and
/// only once this check passes).
pub fn verify_size(final_path: &Path, expected_total: u64) -> Result<(), DownloadError> {
    let actual = fs::metadata(final_path)?.len();
    if actual != expected_total {
        return Err(DownloadError::IntegrityMismatch {
            expected: expected_total,
            actual,
        });
    }
    Ok(())
}
