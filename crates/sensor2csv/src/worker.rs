//! The single consumer of the write queue.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use sensor2csv_writer::{append_with_retry, RecordSink, RetryPolicy, WriteJob};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::history::{HistoryEntry, Outcome};
use crate::queue::JobReceiver;
use crate::service::IngestionService;

/// Start the writer task. The service reports ready from this call until the
/// task exits.
pub fn spawn(
    service: Arc<IngestionService>,
    receiver: JobReceiver,
    sink: Arc<dyn RecordSink>,
    policy: RetryPolicy,
) -> JoinHandle<()> {
    service.set_writer_running(true);
    tokio::spawn(run(service, receiver, sink, policy))
}

async fn run(
    service: Arc<IngestionService>,
    mut receiver: JobReceiver,
    sink: Arc<dyn RecordSink>,
    policy: RetryPolicy,
) {
    let mut shutdown = service.subscribe_shutdown();
    debug!(
        retries = policy.retries,
        backoff_base_ms = policy.backoff_base.as_millis() as u64,
        "Writer task started"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            job = receiver.dequeue() => match job {
                Some(job) => process(&service, sink.as_ref(), &policy, job).await,
                None => {
                    debug!("All producers gone, writer task stopping");
                    break;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    drain(
        &service,
        &mut receiver,
        sink.as_ref(),
        &policy,
        service.config().writer.shutdown_grace(),
    )
    .await;

    service.set_writer_running(false);
    debug!("Writer task stopped");
}

/// Persist whatever is already queued, until the queue is empty or `grace`
/// runs out. Anything left after that is abandoned and counted.
async fn drain(
    service: &IngestionService,
    receiver: &mut JobReceiver,
    sink: &dyn RecordSink,
    policy: &RetryPolicy,
    grace: Duration,
) {
    let deadline = Instant::now() + grace;
    let mut drained = 0usize;

    while Instant::now() < deadline {
        let Some(job) = receiver.try_dequeue() else {
            break;
        };
        process(service, sink, policy, job).await;
        drained += 1;
    }

    let mut abandoned = 0usize;
    while receiver.try_dequeue().is_some() {
        abandoned += 1;
    }

    if drained > 0 {
        info!(drained, "Persisted queued readings during shutdown");
    }
    if abandoned > 0 {
        warn!(
            abandoned,
            grace_secs = grace.as_secs(),
            "Shutdown grace period expired, queued readings were not persisted"
        );
    }
}

async fn process(
    service: &IngestionService,
    sink: &dyn RecordSink,
    policy: &RetryPolicy,
    job: WriteJob,
) {
    let endpoint = job.endpoint();
    gauge!("sensor2csv.queue.length", service.queue().length() as f64);

    match append_with_retry(sink, &job, policy).await {
        Ok(persisted) => {
            service.history().push(HistoryEntry::received(
                endpoint,
                job.record.snapshot(),
                Outcome::Persisted,
                job.received_at,
            ));
            service.stats().record_write_success(endpoint);
            if persisted.attempts > 1 {
                counter!(
                    "sensor2csv.write.retries",
                    u64::from(persisted.attempts - 1),
                    "endpoint" => endpoint.as_str()
                );
            }
            debug!(
                endpoint = %endpoint,
                path = %job.path.display(),
                attempts = persisted.attempts,
                header_written = persisted.outcome.header_written,
                queued_ms = job.created_at.elapsed().as_millis() as u64,
                "Reading persisted"
            );
        }
        Err(e) => {
            service.history().push(HistoryEntry::received(
                endpoint,
                job.record.snapshot(),
                Outcome::WriteFailed,
                job.received_at,
            ));
            service.stats().record_write_error(endpoint);
            counter!(
                "sensor2csv.write.retries",
                u64::from(policy.retries),
                "endpoint" => endpoint.as_str()
            );
            error!(
                endpoint = %endpoint,
                path = %job.path.display(),
                attempts = policy.max_attempts(),
                received_at = %job.received_at.to_rfc3339(),
                error = %e,
                "Dropping reading after exhausting write retries"
            );
        }
    }
}
