//! The ingestion service: owns the queue, counters, history and shutdown
//! channel, and is shared as `Arc` by the router and the background tasks.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use metrics::gauge;
use sensor2csv_config::RuntimeConfig;
use sensor2csv_core::{validate, Endpoint, ValidationError};
use sensor2csv_writer::WriteJob;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::history::{History, HistoryEntry, Outcome};
use crate::queue::{JobReceiver, WriteQueue};
use crate::stats::{MetricsSnapshot, SnapshotContext, Stats};

/// Raw bodies kept in history for unparsable requests are cut to this size.
const MAX_RAW_SNAPSHOT_CHARS: usize = 256;

/// Why a reading was not accepted.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("write queue is full")]
    QueueFull,
}

pub struct IngestionService {
    config: RuntimeConfig,
    data_dir: PathBuf,
    queue: WriteQueue,
    stats: Stats,
    history: History,
    shutdown: watch::Sender<bool>,
    writer_running: AtomicBool,
    started_at: Instant,
}

impl IngestionService {
    /// Build the service and hand back the consuming end of its queue,
    /// which belongs to the writer task.
    pub fn new(config: RuntimeConfig) -> (Arc<Self>, JobReceiver) {
        let (queue, receiver) = WriteQueue::bounded(config.queue.maxsize);
        let (shutdown, _) = watch::channel(false);
        let service = Self {
            data_dir: PathBuf::from(&config.storage.data_dir),
            history: History::new(config.history.max),
            stats: Stats::new(),
            queue,
            shutdown,
            writer_running: AtomicBool::new(false),
            started_at: Instant::now(),
            config,
        };
        (Arc::new(service), receiver)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn queue(&self) -> &WriteQueue {
        &self.queue
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Parse, validate and enqueue one request body.
    pub fn ingest(&self, endpoint: Endpoint, body: &[u8]) -> Result<(), IngestError> {
        let payload: Value = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => {
                let err = ValidationError::single("payload", format!("invalid JSON: {}", e));
                return Err(self.reject_invalid(endpoint, raw_snapshot(body), err));
            }
        };
        self.ingest_value(endpoint, payload)
    }

    /// Validate and enqueue an already-parsed payload.
    pub fn ingest_value(&self, endpoint: Endpoint, payload: Value) -> Result<(), IngestError> {
        let record = match validate(endpoint, &payload) {
            Ok(record) => record,
            Err(err) => return Err(self.reject_invalid(endpoint, payload, err)),
        };

        let snapshot = record.snapshot();
        let job = WriteJob::new(record, &self.data_dir);
        let received_at = job.received_at;
        let outcome = self.history.push_with(endpoint, snapshot, received_at, || {
            if self.queue.enqueue(job) {
                Outcome::Enqueued
            } else {
                Outcome::RejectedQueueFull
            }
        });
        gauge!("sensor2csv.queue.length", self.queue.length() as f64);

        match outcome {
            Outcome::Enqueued => {
                self.stats.record_enqueued(endpoint);
                debug!(
                    endpoint = %endpoint,
                    queue_length = self.queue.length(),
                    "Reading enqueued"
                );
                Ok(())
            }
            _ => {
                self.stats.record_queue_rejected(endpoint);
                tracing::warn!(
                    endpoint = %endpoint,
                    capacity = self.queue.capacity(),
                    "Write queue full, rejecting reading"
                );
                Err(IngestError::QueueFull)
            }
        }
    }

    fn reject_invalid(
        &self,
        endpoint: Endpoint,
        payload: Value,
        err: ValidationError,
    ) -> IngestError {
        self.stats.record_validation_error(endpoint);
        self.history.push(HistoryEntry::new(
            endpoint,
            payload,
            Outcome::RejectedValidation,
        ));
        debug!(endpoint = %endpoint, error = %err, "Rejected invalid reading");
        IngestError::Validation(err)
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.stats.snapshot(SnapshotContext {
            queue_length: self.queue.length(),
            queue_maxsize: self.queue.capacity(),
            queue_warn_threshold: self.config.queue.warn_threshold(),
            inactivity_warn_threshold_sec: self.config.monitor.inactivity_warn_secs,
            history_size: self.history.len(),
            history_max: self.history.max(),
            uptime: self.started_at.elapsed(),
        })
    }

    /// Ask the background tasks to stop.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn writer_running(&self) -> bool {
        self.writer_running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_writer_running(&self, running: bool) {
        self.writer_running.store(running, Ordering::SeqCst);
    }
}

fn raw_snapshot(body: &[u8]) -> Value {
    let text = String::from_utf8_lossy(body);
    Value::String(text.chars().take(MAX_RAW_SNAPSHOT_CHARS).collect())
}
