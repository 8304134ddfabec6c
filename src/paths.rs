use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;

use crate::error::DownloadError;

const DEFAULT_FILENAME: &str = "download.bin";

/// Derives the final file name for a URL, e.g. `https://host/a/b/file.tar.gz`
/// -> `file.tar.gz`. Falls back to a fixed default when the URL path has no
/// usable final segment (trailing slash, empty path, ...).
pub fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .filter(|name| !name.trim().is_empty())
        .map(|name| name.to_string())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// Ensures `dir` exists, creating it (and any parents) if necessary.
pub fn ensure_dir(dir: &Path) -> Result<(), DownloadError> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Path to the durable segment store for a given final file path.
pub fn segment_store_path(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|os| os.to_os_string())
        .unwrap_or_else(|| DEFAULT_FILENAME.into());
    name.push(".kdl.segments");
    final_path.with_file_name(name)
}
