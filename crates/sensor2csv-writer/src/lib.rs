//! Durable CSV persistence for normalized sensor records
//!
//! This crate owns everything between a dequeued [`WriteJob`] and bytes on
//! disk: the per-file lock and header state, the single-buffer append with
//! `fsync`, and the bounded retry loop around it. The consuming task that
//! pulls jobs off the queue lives in the server crate.

mod error;
mod job;
mod retry;
mod sink;

pub use error::{ErrorCode, Result, WriterError};
pub use job::WriteJob;
pub use retry::{append_with_retry, Persisted, RetryPolicy};
pub use sink::{AppendOutcome, CsvFileState, CsvSink, RecordSink};

pub use sensor2csv_core;
