//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default remote endpoint polled by every agent.
pub const DEFAULT_ENDPOINT: &str = "https://banterbubbles.com/api/airdrop";

/// What a worker does when a successful poll reports the same score as the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StagnationPolicy {
    /// Treat the unchanged score as account failure and stop the worker.
    #[default]
    Stop,
    /// Keep polling.
    Ignore,
}

impl FromStr for StagnationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" => Ok(Self::Stop),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!("expected 'stop' or 'ignore', got '{other}'")),
        }
    }
}

/// Fleet configuration.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// URL fetched on every poll.
    pub endpoint: String,
    /// Delay between two successful polls of the same agent.
    pub poll_interval: Duration,
    /// Upper bound on a single remote request.
    pub request_timeout: Duration,
    /// Directory holding one `<name>.bot` definition per agent.
    pub bots_dir: PathBuf,
    /// File receiving the persistent log.
    pub log_file: PathBuf,
    /// Reaction to an unchanged score.
    pub stagnation: StagnationPolicy,
    /// Start every agent loaded at startup.
    pub autostart: bool,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            poll_interval: Duration::from_secs(20),
            request_timeout: Duration::from_secs(30),
            bots_dir: PathBuf::from("bots"),
            log_file: PathBuf::from("log.txt"),
            stagnation: StagnationPolicy::Stop,
            autostart: true,
        }
    }
}

impl FleetConfig {
    /// Build configuration from `FLEET_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let endpoint = lookup("FLEET_ENDPOINT").unwrap_or(defaults.endpoint);

        let poll_interval = parse_var::<u64, _>(&lookup, "FLEET_POLL_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);

        let request_timeout = parse_var::<u64, _>(&lookup, "FLEET_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        if request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "FLEET_REQUEST_TIMEOUT_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let bots_dir = lookup("FLEET_BOTS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.bots_dir);

        let log_file = lookup("FLEET_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_file);

        let stagnation = parse_var::<StagnationPolicy, _>(&lookup, "FLEET_STAGNATION_POLICY")?
            .unwrap_or(defaults.stagnation);

        let autostart = parse_var::<bool, _>(&lookup, "FLEET_AUTOSTART")?
            .unwrap_or(defaults.autostart);

        Ok(Self {
            endpoint,
            poll_interval,
            request_timeout,
            bots_dir,
            log_file,
            stagnation,
            autostart,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}
