use anyhow::{Context, Result};
use clap::Parser;
use sensor2csv_config::RuntimeConfig;
use std::path::PathBuf;

/// HTTP server appending sensor readings to durable CSV logs
#[derive(Parser)]
#[command(name = "sensor2csv")]
#[command(version)]
#[command(about = "HTTP server appending sensor readings to durable CSV logs", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides config file)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Directory the CSV logs are written to
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build tokio runtime and run async server
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Step 1: Load base configuration
    let mut config = if let Some(config_path) = &cli.config {
        // Explicit config file path provided
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        // Env-selected or default locations, fall back to defaults
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli);
    config.validate()?;

    // Step 3: Initialize tracing early so validation logs show up
    // Note: run_with_config will also call init_tracing, but that's idempotent
    sensor2csv::init_tracing(&config);

    // Step 4: Validate data directory (creates it, tests write permissions)
    validate_data_dir(&config)?;

    // Step 5: Display startup info
    display_startup_info(&config);

    // Step 6: Run server with resolved config
    sensor2csv::run_with_config(config).await
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(port) = cli.port {
        config.server.listen_addr = format!("0.0.0.0:{}", port);
    }

    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.to_string_lossy().to_string();
    }

    if let Some(level) = &cli.log_level {
        config.server.log_level = level.clone();
    }
}

fn display_startup_info(config: &RuntimeConfig) {
    use tracing::info;

    info!("╭─────────────────────────────────────────────────");
    info!("│ sensor2csv v{}", env!("CARGO_PKG_VERSION"));
    info!("├─────────────────────────────────────────────────");
    info!("│ Listen address: http://{}", config.server.listen_addr);
    info!("│ Data directory: {}", config.storage.data_dir);
    info!("│ Log level: {}", config.server.log_level);
    info!("│ Queue size: {}", config.queue.maxsize);
    info!(
        "│ Write retries: {} (backoff base {}ms)",
        config.writer.retries, config.writer.backoff_base_ms
    );
    info!(
        "│ Inactivity warning: {}s (checked every {}s)",
        config.monitor.inactivity_warn_secs, config.monitor.interval_secs
    );
    info!("╰─────────────────────────────────────────────────");
}

fn validate_data_dir(config: &RuntimeConfig) -> Result<()> {
    use std::fs;
    use tracing::info;

    let data_dir = PathBuf::from(&config.storage.data_dir);

    // Create directory if it doesn't exist
    if !data_dir.exists() {
        info!("Creating data directory: {}", config.storage.data_dir);
        fs::create_dir_all(&data_dir).with_context(|| {
            format!("Failed to create data directory: {}", config.storage.data_dir)
        })?;
    }

    // Validate writability by creating a test file
    let test_file = data_dir.join(".sensor2csv-write-test");
    fs::write(&test_file, b"test").with_context(|| {
        format!(
            "Data directory '{}' is not writable. Check permissions.",
            config.storage.data_dir
        )
    })?;
    fs::remove_file(&test_file).context("Failed to remove test file")?;
    info!("Data directory validated: {}", config.storage.data_dir);

    Ok(())
}
