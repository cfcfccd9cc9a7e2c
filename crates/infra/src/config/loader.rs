//! Configuration loader
//!
//! Loads [`ReboundConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. If any `REBOUND_*` variable is set, build the config from defaults plus
//!    those variables
//! 2. Otherwise search the standard locations for a config file
//! 3. With neither, run on built-in defaults
//!
//! Every path ends in [`ReboundConfig::validate`].
//!
//! ## Environment Variables
//! - `REBOUND_DLQ_MAX_RETRIES`: scheduled retries before a message is permanent
//! - `REBOUND_DLQ_BASE_DELAY_MS`: first retry delay in milliseconds
//! - `REBOUND_DLQ_MAX_DELAY_MS`: retry delay cap in milliseconds
//! - `REBOUND_DLQ_BACKOFF_FACTOR`: exponential growth factor (>= 1.0)
//! - `REBOUND_DLQ_ENABLE_JITTER`: randomise delays by ±25% (true/false)
//! - `REBOUND_DLQ_RETENTION_SECS`: how long records are kept
//! - `REBOUND_DLQ_ALERT_THRESHOLD`: permanent count that raises an alert (0 disables)
//! - `REBOUND_SCAN_INTERVAL_SECS`: time between retry scans
//! - `REBOUND_CLEANUP_INTERVAL_SECS`: time between retention sweeps
//! - `REBOUND_LOG_FORMAT`: `pretty`, `compact` or `json`
//!
//! ## File Locations
//! The loader searches, in order, `rebound.toml`, `rebound.json`, `config.toml`
//! and `config.json` in the current directory, its parent and grandparent,
//! then next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rebound_domain::{LogFormat, ReboundConfig, ReboundError, Result};

pub const ENV_DLQ_MAX_RETRIES: &str = "REBOUND_DLQ_MAX_RETRIES";
pub const ENV_DLQ_BASE_DELAY_MS: &str = "REBOUND_DLQ_BASE_DELAY_MS";
pub const ENV_DLQ_MAX_DELAY_MS: &str = "REBOUND_DLQ_MAX_DELAY_MS";
pub const ENV_DLQ_BACKOFF_FACTOR: &str = "REBOUND_DLQ_BACKOFF_FACTOR";
pub const ENV_DLQ_ENABLE_JITTER: &str = "REBOUND_DLQ_ENABLE_JITTER";
pub const ENV_DLQ_RETENTION_SECS: &str = "REBOUND_DLQ_RETENTION_SECS";
pub const ENV_DLQ_ALERT_THRESHOLD: &str = "REBOUND_DLQ_ALERT_THRESHOLD";
pub const ENV_SCAN_INTERVAL_SECS: &str = "REBOUND_SCAN_INTERVAL_SECS";
pub const ENV_CLEANUP_INTERVAL_SECS: &str = "REBOUND_CLEANUP_INTERVAL_SECS";
pub const ENV_LOG_FORMAT: &str = "REBOUND_LOG_FORMAT";

const ENV_VARS: [&str; 10] = [
    ENV_DLQ_MAX_RETRIES,
    ENV_DLQ_BASE_DELAY_MS,
    ENV_DLQ_MAX_DELAY_MS,
    ENV_DLQ_BACKOFF_FACTOR,
    ENV_DLQ_ENABLE_JITTER,
    ENV_DLQ_RETENTION_SECS,
    ENV_DLQ_ALERT_THRESHOLD,
    ENV_SCAN_INTERVAL_SECS,
    ENV_CLEANUP_INTERVAL_SECS,
    ENV_LOG_FORMAT,
];

const CONFIG_FILE_NAMES: [&str; 4] = ["rebound.toml", "rebound.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `ReboundError::Config` if a variable or file is present but
/// invalid, or the resulting configuration fails validation.
pub fn load() -> Result<ReboundConfig> {
    if let Some(config) = load_from_env()? {
        tracing::info!("Configuration loaded from environment variables");
        return Ok(config);
    }

    match search_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::info!("No configuration found, using defaults");
            Ok(ReboundConfig::default())
        }
    }
}

/// Load configuration from `REBOUND_*` environment variables
///
/// Returns `Ok(None)` when none of the variables is set. Unset variables
/// keep their defaults.
///
/// # Errors
/// Returns `ReboundError::Config` if a variable has an invalid value.
pub fn load_from_env() -> Result<Option<ReboundConfig>> {
    load_from_lookup(|key| std::env::var(key).ok())
}

/// Build configuration from an arbitrary variable source
///
/// `lookup` returns the value for a variable name, or `None` when unset.
///
/// # Errors
/// Returns `ReboundError::Config` if a value cannot be parsed or the
/// resulting configuration is invalid.
pub fn load_from_lookup<F>(lookup: F) -> Result<Option<ReboundConfig>>
where
    F: Fn(&str) -> Option<String>,
{
    if ENV_VARS.iter().all(|key| lookup(key).is_none()) {
        return Ok(None);
    }

    let mut config = ReboundConfig::default();
    let defaults = &mut config.dlq.defaults;

    if let Some(value) = parsed::<u32>(&lookup, ENV_DLQ_MAX_RETRIES)? {
        defaults.max_retries = value;
    }
    if let Some(value) = parsed::<u64>(&lookup, ENV_DLQ_BASE_DELAY_MS)? {
        defaults.base_delay = Duration::from_millis(value);
    }
    if let Some(value) = parsed::<u64>(&lookup, ENV_DLQ_MAX_DELAY_MS)? {
        defaults.max_delay = Duration::from_millis(value);
    }
    if let Some(value) = parsed::<f64>(&lookup, ENV_DLQ_BACKOFF_FACTOR)? {
        defaults.backoff_factor = value;
    }
    if let Some(value) = lookup(ENV_DLQ_ENABLE_JITTER) {
        defaults.enable_jitter = parse_bool(ENV_DLQ_ENABLE_JITTER, &value)?;
    }
    if let Some(value) = parsed::<u64>(&lookup, ENV_DLQ_RETENTION_SECS)? {
        defaults.retention_period = Duration::from_secs(value);
    }
    if let Some(value) = parsed::<u32>(&lookup, ENV_DLQ_ALERT_THRESHOLD)? {
        defaults.alert_threshold = value;
    }
    if let Some(value) = parsed::<u64>(&lookup, ENV_SCAN_INTERVAL_SECS)? {
        config.dlq.scan_interval = Duration::from_secs(value);
    }
    if let Some(value) = parsed::<u64>(&lookup, ENV_CLEANUP_INTERVAL_SECS)? {
        config.dlq.cleanup_interval = Duration::from_secs(value);
    }
    if let Some(value) = lookup(ENV_LOG_FORMAT) {
        config.logging.format = LogFormat::from_str(&value)
            .map_err(|e| ReboundError::Config(format!("{ENV_LOG_FORMAT}: {e}")))?;
    }

    config.validate()?;
    Ok(Some(config))
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations. The format is chosen
/// by extension (`.toml` or `.json`).
///
/// # Errors
/// Returns `ReboundError::Config` if the file is missing, unreadable,
/// malformed or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ReboundConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ReboundError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => search_config_paths().ok_or_else(|| {
            ReboundError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ReboundError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<ReboundConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ReboundError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ReboundError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(ReboundError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations
pub fn search_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    search_dirs(&dirs)
}

fn search_dirs(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ReboundError::Config(format!("{key}: invalid value '{raw}': {e}")))
        })
        .transpose()
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ReboundError::Config(format!("{key}: invalid boolean '{raw}'"))),
    }
}
