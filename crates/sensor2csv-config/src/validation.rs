// Configuration validation
//
// Validates that values are present and sensible

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_queue_config(&config.queue)?;
    validate_writer_config(&config.writer)?;
    validate_monitor_config(&config.monitor)?;
    validate_history_config(&config.history)?;
    validate_request_config(&config.request)?;

    if config.storage.data_dir.trim().is_empty() {
        bail!("storage.data_dir must not be empty");
    }

    if config.server.listen_addr.trim().is_empty() {
        bail!("server.listen_addr must not be empty");
    }

    Ok(())
}

fn validate_queue_config(config: &QueueConfig) -> Result<()> {
    if config.maxsize == 0 {
        bail!("queue.maxsize must be greater than 0");
    }

    if config.maxsize > 1_000_000 {
        warn!(
            maxsize = config.maxsize,
            "queue.maxsize is very large; pending jobs may use a lot of memory"
        );
    }

    Ok(())
}

fn validate_writer_config(config: &WriterConfig) -> Result<()> {
    if config.retries == 0 {
        bail!("writer.retries must be at least 1");
    }

    // Exponential backoff: the last wait is base * 2^(retries-1)
    if config.retries > 10 {
        warn!(
            retries = config.retries,
            "writer.retries is high; a failing disk will stall the writer for a long time"
        );
    }

    Ok(())
}

fn validate_monitor_config(config: &MonitorConfig) -> Result<()> {
    if config.interval_secs == 0 {
        bail!("monitor.interval_secs must be greater than 0");
    }

    if config.inactivity_warn_secs == 0 {
        bail!("monitor.inactivity_warn_secs must be greater than 0");
    }

    Ok(())
}

fn validate_history_config(config: &HistoryConfig) -> Result<()> {
    if config.max == 0 {
        bail!("history.max must be greater than 0");
    }

    if config.max > 100_000 {
        warn!(
            max = config.max,
            "history.max is very large; /history responses may be slow"
        );
    }

    Ok(())
}

fn validate_request_config(config: &RequestConfig) -> Result<()> {
    if config.max_payload_bytes == 0 {
        bail!("request.max_payload_bytes must be greater than 0");
    }

    Ok(())
}
