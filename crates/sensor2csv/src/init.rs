// Initialization utilities
//
// Logging/tracing setup and the CSV sink the writer task persists through

use std::sync::Arc;

use anyhow::{Context, Result};
use sensor2csv_config::{LogFormat, RuntimeConfig};
use sensor2csv_writer::{CsvSink, RecordSink, RetryPolicy};
use tracing::info;

/// Build the filesystem sink and retry policy from RuntimeConfig
pub(crate) fn init_writer(config: &RuntimeConfig) -> Result<(Arc<dyn RecordSink>, RetryPolicy)> {
    let policy = RetryPolicy::new(config.writer.retries, config.writer.backoff_base())
        .context("Invalid writer retry configuration")?;

    info!(
        "Initializing CSV writer at {} (retries={}, backoff_base={}ms)",
        config.storage.data_dir, policy.retries, config.writer.backoff_base_ms
    );

    Ok((Arc::new(CsvSink::new()), policy))
}

/// Initialize tracing/logging from RuntimeConfig
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Parse log level from config
    let env_filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match config.server.log_format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}
