use std::time::Duration;

use crate::error::{Result, WriterError};
use crate::job::WriteJob;
use crate::sink::{AppendOutcome, RecordSink};

/// Bounded retry with exponential backoff.
///
/// `retries` counts the tries made after the first one fails, so
/// `retries = 3` allows four appends in total. Before retry `n` (1-based) the
/// writer sleeps `backoff_base * 2^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff_base: Duration) -> Result<Self> {
        if retries == 0 {
            return Err(WriterError::invalid_config("write retries must be at least 1"));
        }
        Ok(Self {
            retries,
            backoff_base,
        })
    }

    /// The first try plus every retry.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay before the given retry (1 = the first retry).
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let factor = 1u32
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_base: Duration::from_millis(200),
        }
    }
}

/// A job that made it to disk, and how many tries that took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persisted {
    pub outcome: AppendOutcome,
    pub attempts: u32,
}

/// Append `job` through `sink`, retrying per `policy`.
///
/// Each attempt goes back through [`RecordSink::append`] and so re-acquires
/// the file lock. On exhaustion the last error is returned.
pub async fn append_with_retry<S>(
    sink: &S,
    job: &WriteJob,
    policy: &RetryPolicy,
) -> Result<Persisted>
where
    S: RecordSink + ?Sized,
{
    let attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        match sink.append(job).await {
            Ok(outcome) => return Ok(Persisted { outcome, attempts: attempt }),
            Err(e) if attempt < attempts => {
                let delay = policy.delay_before_retry(attempt);
                tracing::warn!(
                    endpoint = %job.endpoint(),
                    path = %job.path.display(),
                    attempt,
                    max_attempts = attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "CSV append failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use sensor2csv_core::{validate_at, Endpoint};
    use serde_json::json;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then succeeds.
    struct FlakySink {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakySink {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl RecordSink for FlakySink {
        async fn append(&self, job: &WriteJob) -> Result<AppendOutcome> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(WriterError::write_failure(
                    job.endpoint(),
                    &job.path,
                    format!("injected failure {}", call),
                ));
            }
            Ok(AppendOutcome {
                header_written: false,
                bytes: 1,
            })
        }
    }

    fn job() -> WriteJob {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let record = validate_at(
            Endpoint::Data,
            &json!({"pressure": 1000, "temperature": 20}),
            ts,
        )
        .unwrap();
        WriteJob::new(record, Path::new("/tmp/unused"))
    }

    fn fast(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::from_millis(1)).unwrap()
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100)).unwrap();
        assert_eq!(policy.delay_before_retry(1), Duration::from_millis(100));
        assert_eq!(policy.delay_before_retry(2), Duration::from_millis(200));
        assert_eq!(policy.delay_before_retry(3), Duration::from_millis(400));
    }

    #[test]
    fn zero_retries_is_invalid() {
        let err = RetryPolicy::new(0, Duration::ZERO).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::E004InvalidConfig);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let sink = FlakySink::new(2);
        let persisted = append_with_retry(&sink, &job(), &fast(3)).await.unwrap();
        assert_eq!(persisted.attempts, 3);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failures_equal_to_retries_still_persist() {
        // One initial try plus three retries: the fourth append succeeds.
        let sink = FlakySink::new(3);
        let persisted = append_with_retry(&sink, &job(), &fast(3)).await.unwrap();
        assert_eq!(persisted.attempts, 4);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn gives_up_once_retries_are_exhausted() {
        let sink = FlakySink::new(u32::MAX);
        let err = append_with_retry(&sink, &job(), &fast(3)).await.unwrap_err();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 4);
        assert!(err.to_string().contains("injected failure 4"));
    }

    #[tokio::test]
    async fn works_through_trait_objects() {
        let sink: Box<dyn RecordSink> = Box::new(FlakySink::new(0));
        let persisted = append_with_retry(sink.as_ref(), &job(), &fast(1))
            .await
            .unwrap();
        assert_eq!(persisted.attempts, 1);
    }
}
