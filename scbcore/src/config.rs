//! Poller configuration.
//!
//! Strongly typed knobs with serde defaults so every deployment shape
//! (embedded defaults, file overrides, tests) sees the same stable struct.
//! All durations are whole seconds; accessors convert to [`Duration`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for one source poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Base sleep between cycles, seconds
    #[serde(default = "PollerConfig::default_interval")]
    pub interval: u64,
    /// Upper bound for the adaptive backoff floor; no backoff once the base
    /// interval reaches this value
    #[serde(default = "PollerConfig::default_max_interval")]
    pub max_interval: u64,
    /// Size of the recent window kept for untimestamped sources
    #[serde(default = "PollerConfig::default_window_size")]
    pub window_size: usize,
    /// A new play within this many seconds of now counts as close to interval
    #[serde(default = "PollerConfig::default_close_threshold")]
    pub close_threshold_secs: u64,
    /// Delay applied before dispatch when close to interval
    #[serde(default = "PollerConfig::default_close_delay")]
    pub close_delay_secs: u64,
    /// Consecutive empty cycles before backoff becomes eligible
    #[serde(default = "PollerConfig::default_quiet_cycles")]
    pub quiet_cycle_threshold: u64,
    /// Multiplier applied to the base interval when backing off
    #[serde(default = "PollerConfig::default_backoff_factor")]
    pub backoff_factor: u64,
    /// Upper cap for the backed-off sleep, seconds
    #[serde(default = "PollerConfig::default_backoff_cap")]
    pub backoff_cap: u64,
    /// Quiet-time trigger: back off only after `interval × this` seconds
    /// (capped at `max_interval`) without a discovery
    #[serde(default = "PollerConfig::default_backoff_trigger")]
    pub backoff_trigger_factor: u64,
}

impl PollerConfig {
    const fn default_interval() -> u64 {
        30
    }

    const fn default_max_interval() -> u64 {
        600
    }

    const fn default_window_size() -> usize {
        20
    }

    const fn default_close_threshold() -> u64 {
        5
    }

    const fn default_close_delay() -> u64 {
        10
    }

    const fn default_quiet_cycles() -> u64 {
        5
    }

    const fn default_backoff_factor() -> u64 {
        5
    }

    const fn default_backoff_cap() -> u64 {
        300
    }

    const fn default_backoff_trigger() -> u64 {
        10
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn close_delay(&self) -> Duration {
        Duration::from_secs(self.close_delay_secs)
    }

    /// Seconds of quiet required before backoff fires.
    pub fn backoff_trigger_secs(&self) -> u64 {
        (self.interval * self.backoff_trigger_factor).min(self.max_interval)
    }

    /// Sleep applied once backoff fires.
    pub fn backed_off_sleep_secs(&self) -> u64 {
        (self.interval * self.backoff_factor).min(self.backoff_cap)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Self::default_interval(),
            max_interval: Self::default_max_interval(),
            window_size: Self::default_window_size(),
            close_threshold_secs: Self::default_close_threshold(),
            close_delay_secs: Self::default_close_delay(),
            quiet_cycle_threshold: Self::default_quiet_cycles(),
            backoff_factor: Self::default_backoff_factor(),
            backoff_cap: Self::default_backoff_cap(),
            backoff_trigger_factor: Self::default_backoff_trigger(),
        }
    }
}
