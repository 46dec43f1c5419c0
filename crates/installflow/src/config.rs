//! Runtime configuration loaded from `INSTALLFLOW_*` environment variables.

use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;
use thiserror::Error;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    // a missing .env is fine
    let _ = dotenvy::dotenv();
});

/// Errors raised while reading [`FlowConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

pub const DEFAULT_CANCEL_KEY_PREFIX: &str = "cancel-job-";

/// Configuration shared by the workers and the cancellation signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowConfig {
    /// Prefix of the cancellation key; the run id is appended.
    pub cancel_key_prefix: String,
    /// Expiry applied when a cancellation is requested. `None` keeps the flag
    /// until it is cleared.
    pub cancel_ttl: Option<Duration>,
    /// Maximum time a single task may run. `None` means no limit.
    pub task_timeout: Option<Duration>,
    /// Capacity of the preflight submission queue.
    pub queue_capacity: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            cancel_key_prefix: DEFAULT_CANCEL_KEY_PREFIX.to_string(),
            cancel_ttl: Some(Duration::from_secs(3600)),
            task_timeout: None,
            queue_capacity: 64,
        }
    }
}

impl FlowConfig {
    /// Reads the configuration from the environment, loading `.env` first.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `INSTALLFLOW_CANCEL_KEY_PREFIX` | `cancel-job-` |
    /// | `INSTALLFLOW_CANCEL_TTL_SECS` | `3600` (`0` disables expiry) |
    /// | `INSTALLFLOW_TASK_TIMEOUT_SECS` | unset (`0` also disables) |
    /// | `INSTALLFLOW_QUEUE_CAPACITY` | `64` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let cancel_key_prefix = match lookup("INSTALLFLOW_CANCEL_KEY_PREFIX") {
            Some(prefix) if prefix.is_empty() => {
                return Err(ConfigError::Invalid {
                    name: "INSTALLFLOW_CANCEL_KEY_PREFIX",
                    value: prefix,
                })
            }
            Some(prefix) => prefix,
            None => defaults.cancel_key_prefix,
        };

        let cancel_ttl = match parse_u64(&lookup, "INSTALLFLOW_CANCEL_TTL_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.cancel_ttl,
        };

        let task_timeout = match parse_u64(&lookup, "INSTALLFLOW_TASK_TIMEOUT_SECS")? {
            Some(0) | None => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        };

        let queue_capacity = match parse_u64(&lookup, "INSTALLFLOW_QUEUE_CAPACITY")? {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    name: "INSTALLFLOW_QUEUE_CAPACITY",
                    value: "0".to_string(),
                })
            }
            Some(n) => n as usize,
            None => defaults.queue_capacity,
        };

        Ok(Self {
            cancel_key_prefix,
            cancel_ttl,
            task_timeout,
            queue_capacity,
        })
    }

    pub fn with_cancel_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cancel_key_prefix = prefix.into();
        self
    }

    pub fn with_cancel_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cancel_ttl = ttl;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

fn parse_u64<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(None),
    }
}
