//! Bounded FIFO between the request handlers and the writer task.
//!
//! Producers never wait: `enqueue` either places the job or reports that
//! the queue is full so the handler can answer 503 straight away.

use sensor2csv_writer::WriteJob;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

/// Producer half, cloned into every request through the service.
#[derive(Debug, Clone)]
pub struct WriteQueue {
    tx: mpsc::Sender<WriteJob>,
}

/// Consumer half, owned by the single writer task.
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::Receiver<WriteJob>,
}

impl WriteQueue {
    /// Create a queue holding at most `capacity` jobs (minimum 1).
    pub fn bounded(capacity: usize) -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, JobReceiver { rx })
    }

    /// Non-blocking enqueue. Returns false if the queue is full or the
    /// writer has gone away.
    pub fn enqueue(&self, job: WriteJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Closed(job)) => {
                tracing::error!(
                    endpoint = %job.endpoint(),
                    "Write queue is closed, writer task is not running"
                );
                false
            }
        }
    }

    /// Jobs currently waiting.
    pub fn length(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

impl JobReceiver {
    /// Wait for the next job. `None` once every producer is dropped.
    pub async fn dequeue(&mut self) -> Option<WriteJob> {
        self.rx.recv().await
    }

    /// Take a job only if one is already waiting.
    pub fn try_dequeue(&mut self) -> Option<WriteJob> {
        match self.rx.try_recv() {
            Ok(job) => Some(job),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}
