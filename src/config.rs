//! Engine tuning shared by the CLI, the web server and live sessions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schedule::CapacityPolicy;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_PRE_COUNTDOWN_SECS: u32 = 5;
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

const MAX_TICK_INTERVAL: Duration = Duration::from_secs(1);
const MIN_GRACE_PERIOD: Duration = Duration::from_secs(2);
const MAX_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cadence of the running timeline
    pub tick_interval: Duration,
    /// Display-only countdown before the start locks
    pub pre_countdown_secs: u32,
    /// How long the final state stays up after everything has resolved
    pub grace_period: Duration,
    pub capacity_policy: CapacityPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            pre_countdown_secs: DEFAULT_PRE_COUNTDOWN_SECS,
            grace_period: DEFAULT_GRACE_PERIOD,
            capacity_policy: CapacityPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` when the tick is zero or slower than 1s, or the
    /// grace period falls outside 2-5s.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() || self.tick_interval > MAX_TICK_INTERVAL {
            return Err(ConfigError::TickInterval(self.tick_interval));
        }
        if self.grace_period < MIN_GRACE_PERIOD || self.grace_period > MAX_GRACE_PERIOD {
            return Err(ConfigError::GracePeriod(self.grace_period));
        }
        Ok(())
    }
}
