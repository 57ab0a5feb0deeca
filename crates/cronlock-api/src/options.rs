//! Acquisition options for a distributed mutex
//!
//! `MutexOptions` is the caller-facing bag of optional settings. Unset fields
//! fall back to the service defaults when the options are resolved into a
//! `MutexConfig`, which is what store implementations consume.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::Rng;

use crate::error::MutexError;

/// Default lock time-to-live
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(8);

/// Default number of acquisition attempts
pub const DEFAULT_TRIES: u32 = 32;

/// Default clock drift factor applied to the expiry
pub const DEFAULT_DRIFT_FACTOR: f64 = 0.01;

/// Default per-operation timeout factor applied to the expiry
pub const DEFAULT_TIMEOUT_FACTOR: f64 = 0.05;

const MIN_RETRY_DELAY_MS: u64 = 50;
const MAX_RETRY_DELAY_MS: u64 = 250;

/// Produces the unique value identifying one lock holder.
pub type ValueGenerator = Arc<dyn Fn() -> anyhow::Result<String> + Send + Sync>;

/// Delay between two acquisition attempts
#[derive(Clone)]
pub enum RetryDelay {
    /// Same delay before every retry
    Fixed(Duration),
    /// Delay computed from the attempt number (starting at 1 for the first retry)
    Func(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl RetryDelay {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            RetryDelay::Fixed(d) => *d,
            RetryDelay::Func(f) => f(attempt),
        }
    }

    /// Uniformly random delay in `[50ms, 250ms)`.
    pub fn jittered() -> Self {
        RetryDelay::Func(Arc::new(|_| {
            Duration::from_millis(rand::rng().random_range(MIN_RETRY_DELAY_MS..MAX_RETRY_DELAY_MS))
        }))
    }
}

impl fmt::Debug for RetryDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryDelay::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            RetryDelay::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Generate a holder value from 16 random bytes, base64 encoded.
pub fn generate_value() -> anyhow::Result<String> {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    Ok(BASE64.encode(bytes))
}

/// Optional acquisition settings, passed through verbatim to the mutex service.
#[derive(Clone, Default)]
pub struct MutexOptions {
    pub expiry: Option<Duration>,
    pub tries: Option<u32>,
    pub retry_delay: Option<RetryDelay>,
    pub drift_factor: Option<f64>,
    pub timeout_factor: Option<f64>,
    pub gen_value: Option<ValueGenerator>,
    pub value: Option<String>,
}

impl MutexOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn with_tries(mut self, tries: u32) -> Self {
        self.tries = Some(tries);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(RetryDelay::Fixed(delay));
        self
    }

    pub fn with_retry_delay_func<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.retry_delay = Some(RetryDelay::Func(Arc::new(f)));
        self
    }

    pub fn with_drift_factor(mut self, factor: f64) -> Self {
        self.drift_factor = Some(factor);
        self
    }

    pub fn with_timeout_factor(mut self, factor: f64) -> Self {
        self.timeout_factor = Some(factor);
        self
    }

    pub fn with_gen_value_func<F>(mut self, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.gen_value = Some(Arc::new(f));
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Overlay `overrides` on top of `self`; fields set in `overrides` win.
    pub fn merge(&self, overrides: &MutexOptions) -> MutexOptions {
        MutexOptions {
            expiry: overrides.expiry.or(self.expiry),
            tries: overrides.tries.or(self.tries),
            retry_delay: overrides
                .retry_delay
                .clone()
                .or_else(|| self.retry_delay.clone()),
            drift_factor: overrides.drift_factor.or(self.drift_factor),
            timeout_factor: overrides.timeout_factor.or(self.timeout_factor),
            gen_value: overrides
                .gen_value
                .clone()
                .or_else(|| self.gen_value.clone()),
            value: overrides.value.clone().or_else(|| self.value.clone()),
        }
    }

    /// Fill unset fields with the service defaults.
    pub fn resolve(&self) -> MutexConfig {
        MutexConfig {
            expiry: self.expiry.unwrap_or(DEFAULT_EXPIRY),
            tries: self.tries.unwrap_or(DEFAULT_TRIES).max(1),
            retry_delay: self.retry_delay.clone().unwrap_or_else(RetryDelay::jittered),
            drift_factor: self.drift_factor.unwrap_or(DEFAULT_DRIFT_FACTOR),
            timeout_factor: self.timeout_factor.unwrap_or(DEFAULT_TIMEOUT_FACTOR),
            gen_value: self.gen_value.clone(),
            value: self.value.clone(),
        }
    }
}

impl fmt::Debug for MutexOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutexOptions")
            .field("expiry", &self.expiry)
            .field("tries", &self.tries)
            .field("retry_delay", &self.retry_delay)
            .field("drift_factor", &self.drift_factor)
            .field("timeout_factor", &self.timeout_factor)
            .field("gen_value", &self.gen_value.as_ref().map(|_| ".."))
            .field("value", &self.value)
            .finish()
    }
}

/// Fully resolved mutex settings consumed by store implementations
#[derive(Clone)]
pub struct MutexConfig {
    pub expiry: Duration,
    pub tries: u32,
    pub retry_delay: RetryDelay,
    pub drift_factor: f64,
    pub timeout_factor: f64,
    gen_value: Option<ValueGenerator>,
    value: Option<String>,
}

impl MutexConfig {
    /// Holder value for a new acquisition: the explicit value if set,
    /// otherwise one produced by the generator.
    pub fn next_value(&self) -> anyhow::Result<String> {
        if let Some(value) = &self.value {
            return Ok(value.clone());
        }
        match &self.gen_value {
            Some(generate) => generate(),
            None => generate_value(),
        }
    }

    /// Reject settings a store cannot honour: a zero expiry, or a drift or
    /// timeout factor outside `[0, 1)`.
    pub fn validate(&self) -> Result<(), MutexError> {
        if self.expiry.is_zero() {
            return Err(MutexError::Invalid("expiry must be positive".to_string()));
        }
        for (name, factor) in [
            ("drift_factor", self.drift_factor),
            ("timeout_factor", self.timeout_factor),
        ] {
            if !(0.0..1.0).contains(&factor) {
                return Err(MutexError::Invalid(format!(
                    "{name} must be in [0, 1), got {factor}"
                )));
            }
        }
        Ok(())
    }

    /// Clock drift allowance subtracted from the validity window.
    ///
    /// An unusable factor yields the whole expiry, leaving no validity.
    pub fn drift(&self) -> Duration {
        scaled(self.expiry, self.drift_factor).unwrap_or(self.expiry) + Duration::from_millis(2)
    }

    /// Upper bound for a single store round-trip.
    pub fn op_timeout(&self) -> Duration {
        scaled(self.expiry, self.timeout_factor).unwrap_or(self.expiry)
    }
}

fn scaled(expiry: Duration, factor: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(expiry.as_secs_f64() * factor).ok()
}

impl fmt::Debug for MutexConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutexConfig")
            .field("expiry", &self.expiry)
            .field("tries", &self.tries)
            .field("retry_delay", &self.retry_delay)
            .field("drift_factor", &self.drift_factor)
            .field("timeout_factor", &self.timeout_factor)
            .field("gen_value", &self.gen_value.as_ref().map(|_| ".."))
            .field("value", &self.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let config = MutexOptions::new().resolve();
        assert_eq!(config.expiry, DEFAULT_EXPIRY);
        assert_eq!(config.tries, DEFAULT_TRIES);
        assert_eq!(config.drift_factor, DEFAULT_DRIFT_FACTOR);
        assert_eq!(config.timeout_factor, DEFAULT_TIMEOUT_FACTOR);

        let delay = config.retry_delay.delay_for(1);
        assert!(delay >= Duration::from_millis(50));
        assert!(delay < Duration::from_millis(250));
    }

    #[test]
    fn test_zero_tries_resolves_to_one() {
        let config = MutexOptions::new().with_tries(0).resolve();
        assert_eq!(config.tries, 1);
    }

    #[test]
    fn test_merge_overrides_win() {
        let base = MutexOptions::new()
            .with_tries(1)
            .with_expiry(Duration::from_secs(10))
            .with_value("base");
        let overrides = MutexOptions::new().with_expiry(Duration::from_secs(3));

        let merged = base.merge(&overrides);
        assert_eq!(merged.tries, Some(1));
        assert_eq!(merged.expiry, Some(Duration::from_secs(3)));
        assert_eq!(merged.value.as_deref(), Some("base"));
    }

    #[test]
    fn test_retry_delay_func() {
        let config = MutexOptions::new()
            .with_retry_delay_func(|attempt| Duration::from_millis(attempt as u64 * 10))
            .resolve();
        assert_eq!(config.retry_delay.delay_for(3), Duration::from_millis(30));

        let config = MutexOptions::new()
            .with_retry_delay(Duration::from_millis(7))
            .resolve();
        assert_eq!(config.retry_delay.delay_for(9), Duration::from_millis(7));
    }

    #[test]
    fn test_next_value() {
        let config = MutexOptions::new().with_value("fixed").resolve();
        assert_eq!(config.next_value().unwrap(), "fixed");

        let config = MutexOptions::new()
            .with_gen_value_func(|| Ok("generated".to_string()))
            .resolve();
        assert_eq!(config.next_value().unwrap(), "generated");

        let config = MutexOptions::new().resolve();
        let a = config.next_value().unwrap();
        let b = config.next_value().unwrap();
        assert_eq!(a.len(), 24);
        assert_ne!(a, b);
    }

    #[test]
    fn test_drift_and_timeout() {
        let config = MutexOptions::new()
            .with_expiry(Duration::from_secs(10))
            .resolve();
        let drift = config.drift();
        assert!(drift > Duration::from_millis(101) && drift <= Duration::from_millis(102));
        assert_eq!(config.op_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_out_of_range_factors_do_not_panic() {
        for factor in [-0.5, f64::NAN, f64::INFINITY, 1e300] {
            let config = MutexOptions::new()
                .with_drift_factor(factor)
                .with_timeout_factor(factor)
                .resolve();
            assert!(matches!(config.validate(), Err(MutexError::Invalid(_))));
            assert_eq!(config.op_timeout(), DEFAULT_EXPIRY);
            assert!(config.drift() > DEFAULT_EXPIRY);
        }

        let config = MutexOptions::new().with_expiry(Duration::ZERO).resolve();
        assert!(config.validate().is_err());
        assert!(MutexOptions::new().resolve().validate().is_ok());
    }

    #[test]
    fn test_config_debug_hides_generator() {
        let config = MutexOptions::new()
            .with_gen_value_func(|| Ok("v".to_string()))
            .resolve();
        let rendered = format!("{config:?}");
        assert!(rendered.contains("MutexConfig"));
        assert!(rendered.contains("gen_value: Some(\"..\")"));
    }
}
