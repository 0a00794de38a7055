//! Periodic, advisory check for silent sensors and queue pressure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sensor2csv_core::Endpoint;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::service::IngestionService;

/// Result of one monitor tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorReport {
    /// Endpoints silent for longer than the warning threshold.
    pub inactive: Vec<(Endpoint, Duration)>,
    pub queue_length: usize,
    pub queue_warn_threshold: usize,
}

impl MonitorReport {
    pub fn queue_pressure(&self) -> bool {
        self.queue_length >= self.queue_warn_threshold
    }
}

pub fn check(service: &IngestionService) -> MonitorReport {
    check_at(service, Instant::now())
}

/// Evaluate the service as of `now`. Endpoints that never received data are
/// not reported.
pub fn check_at(service: &IngestionService, now: Instant) -> MonitorReport {
    let threshold = Duration::from_secs(service.config().monitor.inactivity_warn_secs);
    let inactive = Endpoint::ALL
        .into_iter()
        .filter_map(|endpoint| {
            let idle = service.stats().inactivity_at(endpoint, now)?;
            (idle > threshold).then_some((endpoint, idle))
        })
        .collect();

    MonitorReport {
        inactive,
        queue_length: service.queue().length(),
        queue_warn_threshold: service.config().queue.warn_threshold(),
    }
}

fn log_report(service: &IngestionService, report: &MonitorReport) {
    let threshold_secs = service.config().monitor.inactivity_warn_secs;
    for (endpoint, idle) in &report.inactive {
        warn!(
            endpoint = %endpoint,
            inactivity_secs = idle.as_secs(),
            threshold_secs,
            "No readings received recently"
        );
    }
    if report.queue_pressure() {
        warn!(
            queue_length = report.queue_length,
            threshold = report.queue_warn_threshold,
            capacity = service.queue().capacity(),
            "Write queue is filling up"
        );
    }
}

/// Start the monitor loop; it exits when the service shuts down.
pub fn spawn(service: Arc<IngestionService>) -> JoinHandle<()> {
    tokio::spawn(run(service))
}

async fn run(service: Arc<IngestionService>) {
    let period = service.config().monitor.interval().max(Duration::from_secs(1));
    let mut shutdown = service.subscribe_shutdown();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    debug!(interval_secs = period.as_secs(), "Inactivity monitor started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {
                let report = check(&service);
                log_report(&service, &report);
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!("Inactivity monitor stopped");
}
