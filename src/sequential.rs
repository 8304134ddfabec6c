use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use log::{info, warn};
use reqwest::{header, Client, StatusCode, Url};

use crate::error::DownloadError;
use crate::integrity;
use crate::model::{percent, Sinks};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

enum FetchError {
    RangeNotSatisfiable,
    Fatal(DownloadError),
}

impl From<DownloadError> for FetchError {
    fn from(err: DownloadError) -> Self {
        FetchError::Fatal(err)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Fatal(err.into())
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Fatal(err.into())
    }
}

/// Alternate single-stream mode: one ranged or full GET writing directly to
/// the final file, with resume from existing file length.
pub async fn run(
    client: &Client,
    url: &Url,
    destination: &Path,
    total_bytes: u64,
    range_supported: bool,
    allow_resume: bool,
    request_timeout: Option<Duration>,
    sinks: &Sinks,
) -> Result<(), DownloadError> {
    let mut start_offset = 0u64;
    let can_resume = allow_resume && range_supported;

    if destination.exists() && can_resume {
        let existing_len = fs::metadata(destination)?.len();
        if existing_len == total_bytes {
            // Already complete; no GET issued.
            info!("sequential download already complete at {total_bytes} bytes");
            return Ok(());
        } else if existing_len > total_bytes {
            // Corrupt/stale partial; restart from scratch.
            fs::remove_file(destination)?;
        } else {
            start_offset = existing_len;
        }
    } else if destination.exists() {
        fs::remove_file(destination)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(destination)?;
    file.seek(SeekFrom::Start(start_offset))?;

    if start_offset > 0 {
        info!("resuming sequential download from byte {start_offset}");
    }

    let result = fetch_body(
        client,
        url,
        &mut file,
        start_offset,
        total_bytes,
        request_timeout,
        sinks,
    )
    .await;

    match result {
        Err(FetchError::RangeNotSatisfiable) => {
            // the server resource changed since we recorded `start_offset`;
            // delete the partial file and restart fully.
            drop(file);
            fs::remove_file(destination)?;
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(destination)?;
            fetch_body(client, url, &mut file, 0, total_bytes, request_timeout, sinks)
                .await
                .map_err(|err| match err {
                    // a full from-scratch GET reporting 416 means the server
                    // cannot serve this resource at all; nothing left to retry.
                    FetchError::RangeNotSatisfiable => {
                        DownloadError::Failed("server rejected full-range request".into())
                    }
                    FetchError::Fatal(err) => err,
                })?;
        }
        Err(FetchError::Fatal(err)) => return Err(err),
        Ok(()) => {}
    }

    integrity::verify_size(destination, total_bytes)
}

async fn fetch_body(
    client: &Client,
    url: &Url,
    file: &mut File,
    start_offset: u64,
    total_bytes: u64,
    request_timeout: Option<Duration>,
    sinks: &Sinks,
) -> Result<(), FetchError> {
    let mut request = client
        .get(url.clone())
        .timeout(request_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT));
    if start_offset > 0 {
        request = request.header(header::RANGE, format!("bytes={start_offset}-"));
    }

    let response = request.send().await?;
    match response.status() {
        StatusCode::OK | StatusCode::PARTIAL_CONTENT => {}
        StatusCode::RANGE_NOT_SATISFIABLE if start_offset > 0 => {
            return Err(FetchError::RangeNotSatisfiable);
        }
        other => {
            return Err(FetchError::Fatal(DownloadError::Failed(format!(
                "download failed with status {other}"
            ))));
        }
    }

    let mut downloaded = start_offset;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(chunk.as_ref())?;
        downloaded += chunk.len() as u64;
        sinks.progress(percent(downloaded, total_bytes));
    }
    file.sync_all()?;

    if downloaded == 0 && start_offset == 0 {
        warn!("sequential download received zero bytes for a non-empty resource");
    }
    Ok(())
}
