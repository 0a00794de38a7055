//! Per-endpoint counters and the read-only metrics snapshot.
//!
//! Counters are atomics so handlers and the writer never contend on a lock
//! to bump them. Every update is mirrored to the `metrics` facade so an
//! installed recorder can export it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::Mutex;
use sensor2csv_core::Endpoint;
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
struct Received {
    at: Instant,
    wall: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct EndpointMetrics {
    write_success_total: AtomicU64,
    write_error_total: AtomicU64,
    validation_error_total: AtomicU64,
    queue_rejected_total: AtomicU64,
    last_received: Mutex<Option<Received>>,
}

/// Point-in-time counter values for one endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointCounts {
    pub write_success_total: u64,
    pub write_error_total: u64,
    pub validation_error_total: u64,
    pub queue_rejected_total: u64,
}

/// Counters for all four endpoints.
#[derive(Debug, Default)]
pub struct Stats {
    endpoints: [EndpointMetrics; 4],
}

fn slot(endpoint: Endpoint) -> usize {
    match endpoint {
        Endpoint::Data => 0,
        Endpoint::Data2 => 1,
        Endpoint::Data3 => 2,
        Endpoint::Data4 => 3,
    }
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, endpoint: Endpoint) -> &EndpointMetrics {
        &self.endpoints[slot(endpoint)]
    }

    /// A job for `endpoint` was accepted onto the queue.
    pub fn record_enqueued(&self, endpoint: Endpoint) {
        *self.get(endpoint).last_received.lock() = Some(Received {
            at: Instant::now(),
            wall: Utc::now(),
        });
        counter!("sensor2csv.ingest.enqueued", 1, "endpoint" => endpoint.as_str());
    }

    pub fn record_validation_error(&self, endpoint: Endpoint) {
        self.get(endpoint)
            .validation_error_total
            .fetch_add(1, Ordering::Relaxed);
        counter!(
            "sensor2csv.ingest.rejected",
            1,
            "endpoint" => endpoint.as_str(),
            "reason" => "validation"
        );
    }

    pub fn record_queue_rejected(&self, endpoint: Endpoint) {
        self.get(endpoint)
            .queue_rejected_total
            .fetch_add(1, Ordering::Relaxed);
        counter!(
            "sensor2csv.ingest.rejected",
            1,
            "endpoint" => endpoint.as_str(),
            "reason" => "queue_full"
        );
    }

    pub fn record_write_success(&self, endpoint: Endpoint) {
        self.get(endpoint)
            .write_success_total
            .fetch_add(1, Ordering::Relaxed);
        counter!("sensor2csv.write.success", 1, "endpoint" => endpoint.as_str());
    }

    pub fn record_write_error(&self, endpoint: Endpoint) {
        self.get(endpoint)
            .write_error_total
            .fetch_add(1, Ordering::Relaxed);
        counter!("sensor2csv.write.error", 1, "endpoint" => endpoint.as_str());
    }

    pub fn counts(&self, endpoint: Endpoint) -> EndpointCounts {
        let m = self.get(endpoint);
        EndpointCounts {
            write_success_total: m.write_success_total.load(Ordering::Relaxed),
            write_error_total: m.write_error_total.load(Ordering::Relaxed),
            validation_error_total: m.validation_error_total.load(Ordering::Relaxed),
            queue_rejected_total: m.queue_rejected_total.load(Ordering::Relaxed),
        }
    }

    /// Wall-clock time of the last accepted reading, if any.
    pub fn last_received(&self, endpoint: Endpoint) -> Option<DateTime<Utc>> {
        let last = *self.get(endpoint).last_received.lock();
        last.map(|r| r.wall)
    }

    /// Time since the last accepted reading as of `now`, measured on the
    /// monotonic clock. `None` before the first reading.
    pub fn inactivity_at(&self, endpoint: Endpoint, now: Instant) -> Option<Duration> {
        let last = *self.get(endpoint).last_received.lock();
        last.map(|r| now.saturating_duration_since(r.at))
    }

    pub fn inactivity(&self, endpoint: Endpoint) -> Option<Duration> {
        self.inactivity_at(endpoint, Instant::now())
    }
}

/// JSON body of `GET /metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub queue_length: usize,
    pub queue_maxsize: usize,
    pub queue_warn_threshold: usize,
    pub write_success_total: BTreeMap<&'static str, u64>,
    pub write_error_total: BTreeMap<&'static str, u64>,
    pub validation_error_total: BTreeMap<&'static str, u64>,
    pub queue_rejected_total: BTreeMap<&'static str, u64>,
    pub last_received: BTreeMap<&'static str, Option<String>>,
    pub inactivity_seconds: BTreeMap<&'static str, Option<f64>>,
    pub inactivity_warn_threshold_sec: u64,
    pub history_size: usize,
    pub history_max: usize,
    pub uptime_seconds: f64,
}

/// Values outside [`Stats`] that the snapshot reports.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotContext {
    pub queue_length: usize,
    pub queue_maxsize: usize,
    pub queue_warn_threshold: usize,
    pub inactivity_warn_threshold_sec: u64,
    pub history_size: usize,
    pub history_max: usize,
    pub uptime: Duration,
}

impl Stats {
    pub fn snapshot(&self, ctx: SnapshotContext) -> MetricsSnapshot {
        let now = Instant::now();
        let mut snapshot = MetricsSnapshot {
            queue_length: ctx.queue_length,
            queue_maxsize: ctx.queue_maxsize,
            queue_warn_threshold: ctx.queue_warn_threshold,
            write_success_total: BTreeMap::new(),
            write_error_total: BTreeMap::new(),
            validation_error_total: BTreeMap::new(),
            queue_rejected_total: BTreeMap::new(),
            last_received: BTreeMap::new(),
            inactivity_seconds: BTreeMap::new(),
            inactivity_warn_threshold_sec: ctx.inactivity_warn_threshold_sec,
            history_size: ctx.history_size,
            history_max: ctx.history_max,
            uptime_seconds: ctx.uptime.as_secs_f64(),
        };

        for endpoint in Endpoint::ALL {
            let id = endpoint.as_str();
            let counts = self.counts(endpoint);
            snapshot
                .write_success_total
                .insert(id, counts.write_success_total);
            snapshot.write_error_total.insert(id, counts.write_error_total);
            snapshot
                .validation_error_total
                .insert(id, counts.validation_error_total);
            snapshot
                .queue_rejected_total
                .insert(id, counts.queue_rejected_total);
            snapshot
                .last_received
                .insert(id, self.last_received(endpoint).map(|t| t.to_rfc3339()));
            snapshot.inactivity_seconds.insert(
                id,
                self.inactivity_at(endpoint, now).map(|d| d.as_secs_f64()),
            );
        }

        snapshot
    }
}
