use std::fs::OpenOptions;
use std::io::Write;
use std::time::Duration;

use futures_util::StreamExt;
use log::warn;
use reqwest::{header, Client, StatusCode, Url};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::SegmentRecord;

/// One unit of work handed to a worker's inbox.
#[derive(Debug, Clone)]
pub struct SegmentAssignment {
    pub record: SegmentRecord,
}

/// Messages a worker emits onto the scheduler's shared aggregate inbox.
/// `worker_id` lets the scheduler address a specific worker's own inbox when
/// redispatching (pool mode).
#[derive(Debug)]
pub enum WorkerMessage {
    Ready {
        worker_id: usize,
        inbox: mpsc::Sender<SegmentAssignment>,
    },
    BytesDownloaded {
        worker_id: usize,
        segment_index: usize,
        n: u64,
    },
    SegmentDone {
        worker_id: usize,
        segment_index: usize,
    },
    SegmentError {
        worker_id: usize,
        segment_index: usize,
        reason: String,
    },
}

/// Spawns one worker task. The worker announces its own inbox via `Ready`,
/// then loops: receive an assignment, download it with retry, report a
/// terminal outcome, receive the next assignment. The loop ends the moment
/// its inbox is dropped by the scheduler; the per-worker channel doubles as
/// the cancellation signal.
pub fn spawn(
    worker_id: usize,
    url: Url,
    client: Client,
    max_retries: usize,
    request_timeout: Option<Duration>,
    outbox: mpsc::Sender<WorkerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (inbox_tx, mut inbox_rx) = mpsc::channel::<SegmentAssignment>(1);
        if outbox
            .send(WorkerMessage::Ready {
                worker_id,
                inbox: inbox_tx,
            })
            .await
            .is_err()
        {
            return;
        }

        while let Some(assignment) = inbox_rx.recv().await {
            let record = assignment.record;
            let segment_index = record.segment_index;
            match download_segment_with_retry(
                &client,
                &url,
                &record,
                max_retries,
                request_timeout,
                worker_id,
                &outbox,
            )
            .await
            {
                Ok(()) => {
                    if outbox
                        .send(WorkerMessage::SegmentDone {
                            worker_id,
                            segment_index,
                        })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Err(reason) => {
                    let _ = outbox
                        .send(WorkerMessage::SegmentError {
                            worker_id,
                            segment_index,
                            reason,
                        })
                        .await;
                    // A segment failure is terminal for the run; this worker
                    // has nothing further to do.
                    return;
                }
            }
        }
    })
}

async fn download_segment_with_retry(
    client: &Client,
    url: &Url,
    record: &SegmentRecord,
    max_retries: usize,
    request_timeout: Option<Duration>,
    worker_id: usize,
    outbox: &mpsc::Sender<WorkerMessage>,
) -> Result<(), String> {
    let mut attempt = 0usize;
    loop {
        match download_segment_once(client, url, record, request_timeout, worker_id, outbox)
            .await
        {
            Ok(()) => return Ok(()),
            Err(err) => {
                attempt += 1;
                if attempt < max_retries {
                    warn!(
                        "segment {} failed on attempt {attempt}: {err}; retrying",
                        record.segment_index
                    );
                    continue;
                }
                return Err(err);
            }
        }
    }
}

async fn download_segment_once(
    client: &Client,
    url: &Url,
    record: &SegmentRecord,
    request_timeout: Option<Duration>,
    worker_id: usize,
    outbox: &mpsc::Sender<WorkerMessage>,
) -> Result<(), String> {
    let mut request = client.get(url.clone()).header(
        header::RANGE,
        format!("bytes={}-{}", record.start_byte, record.end_byte),
    );
    if let Some(timeout) = request_timeout {
        request = request.timeout(timeout);
    }

    let response = request.send().await.map_err(|err| err.to_string())?;
    if response.status() != StatusCode::PARTIAL_CONTENT {
        return Err(format!(
            "unexpected status {} for segment {}",
            response.status(),
            record.segment_index
        ));
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&record.scratch_path)
        .map_err(|err| err.to_string())?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| err.to_string())?;
        file.write_all(chunk.as_ref()).map_err(|err| err.to_string())?;

        if outbox
            .send(WorkerMessage::BytesDownloaded {
                worker_id,
                segment_index: record.segment_index,
                n: chunk.len() as u64,
            })
            .await
            .is_err()
        {
            return Err("scheduler channel closed".into());
        }
    }

    file.sync_all().map_err(|err| err.to_string())?;
    Ok(())
}
