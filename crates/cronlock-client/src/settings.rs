//! Locker configuration
//!
//! Settings can be built programmatically or loaded through the `config`
//! crate from an optional file layered with `CRONLOCK_`-prefixed environment
//! variables (e.g. `CRONLOCK_AUTO_EXTEND_MS=2000`). Durations are expressed
//! in milliseconds in external configuration.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use cronlock_api::MutexOptions;
use serde::Deserialize;

use crate::error::LockResult;

/// Environment variable prefix for locker settings
pub const ENV_PREFIX: &str = "CRONLOCK";

/// Runtime settings for a `Locker`
#[derive(Clone, Debug)]
pub struct LockerSettings {
    /// Renewal period. Zero disables auto-extend.
    pub auto_extend: Duration,
    /// Fail construction when the backing store does not answer a ping.
    pub strict: bool,
    /// Make `release` wait for the renewal task to stop before unlocking.
    pub wait_for_renewal: bool,
    /// Deadline applied to the unlock call.
    pub release_timeout: Option<Duration>,
    /// Acquisition options applied to every lock, overridable per call.
    pub options: MutexOptions,
}

impl Default for LockerSettings {
    fn default() -> Self {
        Self {
            auto_extend: Duration::ZERO,
            strict: true,
            wait_for_renewal: true,
            release_timeout: None,
            options: MutexOptions::default(),
        }
    }
}

impl LockerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_extend(mut self, period: Duration) -> Self {
        self.auto_extend = period;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_wait_for_renewal(mut self, wait: bool) -> Self {
        self.wait_for_renewal = wait;
        self
    }

    pub fn with_release_timeout(mut self, timeout: Duration) -> Self {
        self.release_timeout = Some(timeout);
        self
    }

    pub fn with_options(mut self, options: MutexOptions) -> Self {
        self.options = options;
        self
    }

    /// Load settings from an optional file plus the process environment.
    pub fn load(path: Option<&Path>) -> LockResult<Self> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        Self::load_with_env(path, env)
    }

    /// Load settings from an optional file layered with the given environment source.
    pub fn load_with_env(path: Option<&Path>, env: Environment) -> LockResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder.add_source(env).build()?;
        Self::from_config(&config)
    }

    /// Read settings from an already built configuration.
    pub fn from_config(config: &Config) -> LockResult<Self> {
        let raw: LockerConfig = config.clone().try_deserialize()?;
        Ok(raw.try_into()?)
    }
}

/// Serialized form of `LockerSettings`
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LockerConfig {
    pub auto_extend_ms: u64,
    pub strict: bool,
    pub wait_for_renewal: bool,
    pub release_timeout_ms: Option<u64>,
    pub expiry_ms: Option<u64>,
    pub tries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub drift_factor: Option<f64>,
    pub timeout_factor: Option<f64>,
    pub value: Option<String>,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            auto_extend_ms: 0,
            strict: true,
            wait_for_renewal: true,
            release_timeout_ms: None,
            expiry_ms: None,
            tries: None,
            retry_delay_ms: None,
            drift_factor: None,
            timeout_factor: None,
            value: None,
        }
    }
}

impl TryFrom<LockerConfig> for LockerSettings {
    type Error = ConfigError;

    fn try_from(raw: LockerConfig) -> Result<Self, Self::Error> {
        for (name, factor) in [
            ("drift_factor", raw.drift_factor),
            ("timeout_factor", raw.timeout_factor),
        ] {
            if let Some(f) = factor
                && !(0.0..1.0).contains(&f)
            {
                return Err(ConfigError::Message(format!(
                    "{name} must be in [0, 1), got {f}"
                )));
            }
        }
        if raw.expiry_ms == Some(0) {
            return Err(ConfigError::Message("expiry_ms must be positive".to_string()));
        }

        let options = MutexOptions {
            expiry: raw.expiry_ms.map(Duration::from_millis),
            tries: raw.tries,
            retry_delay: None,
            drift_factor: raw.drift_factor,
            timeout_factor: raw.timeout_factor,
            gen_value: None,
            value: raw.value,
        };
        let options = match raw.retry_delay_ms {
            Some(ms) => options.with_retry_delay(Duration::from_millis(ms)),
            None => options,
        };

        Ok(LockerSettings {
            auto_extend: Duration::from_millis(raw.auto_extend_ms),
            strict: raw.strict,
            wait_for_renewal: raw.wait_for_renewal,
            release_timeout: raw.release_timeout_ms.map(Duration::from_millis),
            options,
        })
    }
}
