use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// How the interval between ticks evolves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
    /// Every tick waits the refresh interval
    Fixed,
    /// delay = min(refresh × 2^(attempt-1) × (1 ± jitter), max)
    Exponential {
        max_interval_ms: u64,
        jitter_factor: f64,
    },
}

/// Poll configuration recognised by every instantiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_backoff"))]
pub struct PollPolicy {
    #[validate(range(min = 1, message = "refresh_interval_ms must be positive"))]
    pub refresh_interval_ms: u64,
    #[validate(range(min = 1, message = "max_retries must be at least 1"))]
    pub max_retries: u32,
    pub poll_on_mount: bool,
    pub backoff: Backoff,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 10_000, // 10 seconds
            max_retries: 60,             // 10 minutes at the default interval
            poll_on_mount: false,
            backoff: Backoff::Fixed,
        }
    }
}

impl PollPolicy {
    pub fn new(refresh_interval_ms: u64, max_retries: u32) -> Self {
        Self {
            refresh_interval_ms,
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_poll_on_mount(mut self, poll_on_mount: bool) -> Self {
        self.poll_on_mount = poll_on_mount;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Interval to wait after the `attempt`-th fetch (1-based)
    pub fn next_interval(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed => self.refresh_interval(),
            Backoff::Exponential {
                max_interval_ms,
                jitter_factor,
            } => {
                let base = self.refresh_interval_ms as f64;
                let exponent = attempt.saturating_sub(1).min(30) as i32;
                let exponential = base * 2_f64.powi(exponent);

                let jitter = if *jitter_factor > 0.0 {
                    let mut rng = rand::rng();
                    1.0 + (rng.random::<f64>() * 2.0 - 1.0) * jitter_factor
                } else {
                    1.0
                };

                let capped = (exponential * jitter).min(*max_interval_ms as f64);
                Duration::from_millis(capped.max(1.0) as u64)
            }
        }
    }

    /// Whether another fetch may be issued after `attempts` fetches
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_retries
    }
}

/// The exponential cap must not undercut the refresh interval and jitter must
/// stay below 100%, otherwise delays collapse toward the 1 ms floor.
fn validate_backoff(policy: &PollPolicy) -> Result<(), ValidationError> {
    if let Backoff::Exponential {
        max_interval_ms,
        jitter_factor,
    } = &policy.backoff
    {
        if *max_interval_ms < policy.refresh_interval_ms {
            return Err(ValidationError::new("max_interval_below_refresh")
                .with_message("max_interval_ms must be at least refresh_interval_ms".into()));
        }
        if !(0.0..1.0).contains(jitter_factor) {
            return Err(ValidationError::new("jitter_out_of_range")
                .with_message("jitter_factor must be in [0.0, 1.0)".into()));
        }
    }
    Ok(())
}
