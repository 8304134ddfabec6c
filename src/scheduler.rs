use std::collections::{HashMap, VecDeque};
use std::fs;
use std::time::Duration;

use log::debug;
use reqwest::{Client, Url};
use tokio::sync::mpsc;

use crate::error::DownloadError;
use crate::model::{percent, SegmentRecord, SegmentStatus, Sinks};
use crate::store::SegmentStore;
use crate::worker::{self, SegmentAssignment, WorkerMessage};

/// Everything the two scheduling modes need but that stays constant across
/// the run; bundled to keep `run_pool`/`run_fixed` signatures manageable.
pub struct SchedulerConfig<'a> {
    pub client: Client,
    pub url: Url,
    pub max_retries: usize,
    pub request_timeout: Option<Duration>,
    pub store: &'a dyn SegmentStore,
    pub sinks: &'a Sinks,
    pub total_bytes: u64,
}

/// Spawns exactly `worker_count` workers sharing a FIFO queue. Each worker is
/// redispatched one task at a time via its own inbox until the queue is
/// empty. Stops when every segment is `Completed`, or aborts on the first
/// `SegmentError`.
pub async fn run_pool(
    cfg: SchedulerConfig<'_>,
    records: Vec<SegmentRecord>,
    worker_count: usize,
) -> Result<Vec<SegmentRecord>, DownloadError> {
    run(cfg, records, worker_count, true).await
}

/// Spawns exactly `segment_count` workers, each statically bound to one
/// segment. No queue.
pub async fn run_fixed(
    cfg: SchedulerConfig<'_>,
    records: Vec<SegmentRecord>,
) -> Result<Vec<SegmentRecord>, DownloadError> {
    let worker_count = records.len();
    run(cfg, records, worker_count, false).await
}

async fn run(
    cfg: SchedulerConfig<'_>,
    records: Vec<SegmentRecord>,
    worker_count: usize,
    use_queue: bool,
) -> Result<Vec<SegmentRecord>, DownloadError> {
    let total_segments = records.len();
    let mut bytes_total: u64 = records
        .iter()
        .filter(|record| record.status == SegmentStatus::Completed)
        .map(|record| record.len())
        .sum();
    let mut completed_count = records
        .iter()
        .filter(|record| record.status == SegmentStatus::Completed)
        .count();

    let mut by_index: HashMap<usize, SegmentRecord> = records
        .into_iter()
        .map(|record| (record.segment_index, record))
        .collect();

    let mut pending_sorted: Vec<usize> = by_index
        .values()
        .filter(|record| record.status != SegmentStatus::Completed)
        .map(|record| record.segment_index)
        .collect();
    pending_sorted.sort_unstable();
    let mut pending: VecDeque<usize> = pending_sorted.into();

    if completed_count == total_segments {
        return Ok(by_index.into_values().collect());
    }

    let (outbox_tx, mut outbox_rx) = mpsc::channel::<WorkerMessage>(worker_count.max(1) * 4);
    let mut inboxes: HashMap<usize, mpsc::Sender<SegmentAssignment>> = HashMap::new();
    let mut handles = Vec::with_capacity(worker_count);

    for worker_id in 0..worker_count {
        handles.push(worker::spawn(
            worker_id,
            cfg.url.clone(),
            cfg.client.clone(),
            cfg.max_retries,
            cfg.request_timeout,
            outbox_tx.clone(),
        ));
    }
    drop(outbox_tx);

    let mut aborted: Option<DownloadError> = None;
    let mut draining = false;

    while let Some(message) = outbox_rx.recv().await {
        match message {
            WorkerMessage::Ready { worker_id, inbox } => {
                if draining {
                    continue; // bulk inbox drop already in flight; ignore late handshakes
                }
                if use_queue {
                    if let Some(segment_index) = pending.pop_front() {
                        dispatch(&mut by_index, cfg.store, segment_index, &inbox).await?;
                    }
                    inboxes.insert(worker_id, inbox);
                } else if let Some(segment_index) = pending.pop_front() {
                    dispatch(&mut by_index, cfg.store, segment_index, &inbox).await?;
                    // fixed mode: no redispatch, so the inbox can be dropped
                    // immediately; the worker exits once it finishes.
                }
            }
            WorkerMessage::BytesDownloaded { n, .. } => {
                bytes_total += n;
                if aborted.is_none() {
                    cfg.sinks.progress(percent(bytes_total, cfg.total_bytes));
                }
            }
            WorkerMessage::SegmentDone {
                worker_id,
                segment_index,
            } => {
                if let Some(record) = by_index.get(&segment_index) {
                    cfg.store
                        .update_status(&record.scratch_path, SegmentStatus::Completed)?;
                }
                if let Some(record) = by_index.get_mut(&segment_index) {
                    record.status = SegmentStatus::Completed;
                }
                completed_count += 1;
                debug!("segment {segment_index} completed ({completed_count}/{total_segments})");

                if use_queue && !draining {
                    if let Some(next_index) = pending.pop_front() {
                        if let Some(inbox) = inboxes.get(&worker_id) {
                            dispatch(&mut by_index, cfg.store, next_index, inbox).await?;
                        }
                    }
                }

                if completed_count == total_segments {
                    draining = true;
                    inboxes.clear();
                }
            }
            WorkerMessage::SegmentError {
                segment_index,
                reason,
                ..
            } => {
                if let Some(record) = by_index.get(&segment_index) {
                    let _ = cfg
                        .store
                        .update_status(&record.scratch_path, SegmentStatus::Failed);
                }
                if let Some(record) = by_index.get_mut(&segment_index) {
                    record.status = SegmentStatus::Failed;
                }
                if aborted.is_none() {
                    aborted = Some(DownloadError::SegmentFailed {
                        segment_index,
                        reason,
                    });
                }
                draining = true;
                inboxes.clear();
            }
        }
    }

    for handle in handles {
        let _ = handle.await;
    }

    if let Some(err) = aborted {
        for record in by_index.values() {
            let _ = fs::remove_file(&record.scratch_path);
        }
        return Err(err);
    }

    Ok(by_index.into_values().collect())
}

async fn dispatch(
    by_index: &mut HashMap<usize, SegmentRecord>,
    store: &dyn SegmentStore,
    segment_index: usize,
    inbox: &mpsc::Sender<SegmentAssignment>,
) -> Result<(), DownloadError> {
    let record = by_index
        .get_mut(&segment_index)
        .expect("segment_index originates from by_index's own keys");
    record.status = SegmentStatus::InProgress;
    store.update_status(&record.scratch_path, SegmentStatus::InProgress)?;
    let _ = inbox
        .send(SegmentAssignment {
            record: record.clone(),
        })
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileSegmentStore;
    use tempfile::tempdir;

    #[test]
    fn already_complete_run_short_circuits_without_spawning_workers() {
        // Completion must be status-based, not a byte-sum comparison. An
        // all-Completed record set should return immediately without
        // issuing any HTTP calls, which we confirm here by pointing at an
        // address nothing listens on: if `run` tried to dispatch work it
        // would hang or error out.
        let dir = tempdir().unwrap();
        let store = FileSegmentStore::load_or_create(dir.path().join("s")).unwrap();
        let records = vec![SegmentRecord {
            segment_index: 0,
            start_byte: 0,
            end_byte: 9,
            scratch_path: dir.path().join("f.part0"),
            status: SegmentStatus::Completed,
        }];
        store.put(&records[0]).unwrap();

        let rt = tokio::runtime::Runtime::new().unwrap();
        let sinks = Sinks::default();
        let cfg = SchedulerConfig {
            client: Client::new(),
            url: Url::parse("http://127.0.0.1:1/unreachable").unwrap(),
            max_retries: 1,
            request_timeout: None,
            store: &store,
            sinks: &sinks,
            total_bytes: 10,
        };
        let result = rt.block_on(run_pool(cfg, records, 2));
        assert!(result.is_ok());
    }
}
