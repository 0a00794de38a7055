use super::{LogFormat, RuntimeConfig};
use anyhow::{anyhow, Result};

pub const ENV_PREFIX: &str = "SENSOR2CSV_";

/// Service-specific knobs that are also honoured without the prefix. Generic
/// names such as `PORT` or `DATA_DIR` always need it.
pub const UNPREFIXED_KEYS: &[&str] = &[
    "WRITE_QUEUE_MAXSIZE",
    "WRITE_RETRIES",
    "WRITE_BACKOFF_BASE_MS",
    "WRITE_BACKOFF_BASE_SEC",
    "INACTIVITY_WARN_SEC",
    "HISTORY_MAX",
];

/// Look up `key` as `SENSOR2CSV_<key>`, falling back to the bare name for
/// [`UNPREFIXED_KEYS`]. The prefixed variable wins when both are set.
pub fn resolve_key<F>(key: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(&format!("{}{}", ENV_PREFIX, key))
        .or_else(|| UNPREFIXED_KEYS.contains(&key).then(|| lookup(key)).flatten())
}

/// Abstraction over environment-variable lookups so tests can supply
/// their own source of overrides.
pub trait EnvSource {
    /// Get a variable by its unprefixed key (e.g. `WRITE_RETRIES`).
    fn get(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Queue
    if let Some(val) = get_env_usize(env, "WRITE_QUEUE_MAXSIZE")? {
        config.queue.maxsize = val;
    }

    // Writer retries and backoff
    if let Some(val) = get_env_u32(env, "WRITE_RETRIES")? {
        config.writer.retries = val;
    }
    if let Some(val) = get_env_u64(env, "WRITE_BACKOFF_BASE_MS")? {
        config.writer.backoff_base_ms = val;
    } else if let Some(secs) = get_env_f64(env, "WRITE_BACKOFF_BASE_SEC")? {
        if secs < 0.0 {
            return Err(anyhow!(
                "{}WRITE_BACKOFF_BASE_SEC must not be negative",
                ENV_PREFIX
            ));
        }
        config.writer.backoff_base_ms = (secs * 1000.0).round() as u64;
    }
    if let Some(val) = get_env_u64(env, "SHUTDOWN_GRACE_SECS")? {
        config.writer.shutdown_grace_secs = val;
    }

    // Inactivity monitor
    if let Some(val) = get_env_u64(env, "INACTIVITY_WARN_SEC")? {
        config.monitor.inactivity_warn_secs = val;
    }
    if let Some(val) = get_env_u64(env, "MONITOR_INTERVAL_SECS")? {
        config.monitor.interval_secs = val;
    }

    // History
    if let Some(val) = get_env_usize(env, "HISTORY_MAX")? {
        config.history.max = val;
    }

    // Request configuration
    if let Some(val) = get_env_usize(env, "MAX_PAYLOAD_BYTES")? {
        config.request.max_payload_bytes = val;
    }

    // Storage
    if let Some(dir) = env.get("DATA_DIR") {
        config.storage.data_dir = dir;
    }

    // Server configuration (listen addr/port, log level/format)
    if let Some(addr) = env.get("LISTEN_ADDR") {
        config.server.listen_addr = addr;
    } else if let Some(port) = get_env_u16(env, "PORT")? {
        config.server.listen_addr = format!("0.0.0.0:{}", port);
    }
    if let Some(level) = env.get("LOG_LEVEL") {
        config.server.log_level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.server.log_format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn parse_env<E, T>(env: &E, key: &str) -> Result<Option<T>>
where
    E: EnvSource,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    parse_env(env, key)
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    parse_env(env, key)
}

fn get_env_u32<E: EnvSource>(env: &E, key: &str) -> Result<Option<u32>> {
    parse_env(env, key)
}

fn get_env_u16<E: EnvSource>(env: &E, key: &str) -> Result<Option<u16>> {
    parse_env(env, key)
}

fn get_env_f64<E: EnvSource>(env: &E, key: &str) -> Result<Option<f64>> {
    parse_env(env, key)
}
