use std::path::PathBuf;

use log::info;
use reqwest::Client;

use crate::assembler;
use crate::error::DownloadError;
use crate::integrity;
use crate::model::{DownloadRequest, Mode, SegmentStatus};
use crate::paths;
use crate::planner;
use crate::probe;
use crate::scheduler::{self, SchedulerConfig};
use crate::sequential;
use crate::store::FileSegmentStore;

/// Validates the request, ensures the destination directory exists, derives
/// the output filename, probes the resource, dispatches to the selected
/// mode, then (for segmented modes) assembles and integrity-checks. Calls
/// `sinks.complete()`/`sinks.error()` exactly once around the whole flow and
/// returns the final file's path on success.
pub async fn run(request: DownloadRequest) -> Result<PathBuf, DownloadError> {
    match run_inner(&request).await {
        Ok(final_path) => {
            request.sinks.complete(&final_path);
            Ok(final_path)
        }
        Err(err) => {
            request.sinks.error(&err.to_string());
            Err(err)
        }
    }
}

async fn run_inner(request: &DownloadRequest) -> Result<PathBuf, DownloadError> {
    request.validate()?;
    paths::ensure_dir(&request.destination_directory)?;

    let file_name = paths::filename_from_url(&request.url);
    let final_path = request.destination_directory.join(&file_name);

    let client = Client::new();
    let descriptor = probe::probe(&client, &request.url, request.request_timeout).await?;

    if descriptor.total_bytes == 0 {
        return Err(DownloadError::ProbeFailed(
            "resource reported zero or unknown length".into(),
        ));
    }

    info!(
        "probed {}: {} bytes, range_supported={}",
        request.url, descriptor.total_bytes, descriptor.range_supported
    );

    match request.mode {
        Mode::Sequential => {
            sequential::run(
                &client,
                &request.url,
                &final_path,
                descriptor.total_bytes,
                descriptor.range_supported,
                request.allow_resume,
                request.request_timeout,
                &request.sinks,
            )
            .await?;
            Ok(final_path)
        }
        Mode::SegmentedPool | Mode::SegmentedFixed => {
            run_segmented(request, &client, descriptor.total_bytes, &final_path).await
        }
    }
}

async fn run_segmented(
    request: &DownloadRequest,
    client: &Client,
    total_bytes: u64,
    final_path: &PathBuf,
) -> Result<PathBuf, DownloadError> {
    let store_path = paths::segment_store_path(final_path);
    let store = FileSegmentStore::load_or_create(store_path)?;

    // A prior store is only reusable if its segment count and total span
    // match what we'd plan now; otherwise it describes a different resource
    // (or a resized one) and must be reset.
    let existing = store.all();
    let reusable = !existing.is_empty()
        && existing.len() == request.segment_count
        && existing.last().map(|r| r.end_byte + 1) == Some(total_bytes);

    let records = if reusable {
        info!(
            "reusing existing segment store ({} segments already {} complete)",
            existing.len(),
            existing
                .iter()
                .filter(|r| r.status == SegmentStatus::Completed)
                .count()
        );
        existing
    } else {
        if !existing.is_empty() {
            store.clear()?;
        }
        let dir = final_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        planner::plan(total_bytes, request.segment_count, &dir, &file_name, &store)?
    };

    let cfg = SchedulerConfig {
        client: client.clone(),
        url: request.url.clone(),
        max_retries: request.max_retries,
        request_timeout: request.request_timeout,
        store: &store,
        sinks: &request.sinks,
        total_bytes,
    };

    let outcome = match request.mode {
        Mode::SegmentedPool => scheduler::run_pool(cfg, records, request.worker_count).await,
        Mode::SegmentedFixed => scheduler::run_fixed(cfg, records).await,
        Mode::Sequential => unreachable!("run_segmented only called for segmented modes"),
    };

    // On abort the scheduler has already deleted every scratch file, so the
    // store's `Completed` records point at nothing. Clear it before the
    // error propagates so a later run against this destination replans from
    // scratch instead of trusting those records and failing assembly.
    let finished = match outcome {
        Ok(finished) => finished,
        Err(err) => {
            store.clear()?;
            return Err(err);
        }
    };

    assembler::assemble(&finished, final_path)?;
    integrity::verify_size(final_path, total_bytes)?;
    assembler::cleanup_scratch_files(&finished);
    // Same reasoning on the success path: cleanup just deleted the scratch
    // files these records point at, so the store must not outlive them.
    store.clear()?;

    Ok(final_path.clone())
}
