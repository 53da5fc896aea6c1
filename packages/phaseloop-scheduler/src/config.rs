use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};
use crate::task::Phase;

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;
/// Longest accepted frame interval. Anything slower than one frame per
/// second stops looking like a repaint cadence.
pub const MAX_FRAME_INTERVAL_MS: u64 = 1000;

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub immediate_capacity: usize,
    pub background_capacity: usize,
    pub frame_capacity: usize,
    pub frame_interval_ms: u64,
    /// Keep `run()` alive while delayed enqueues are still in flight.
    pub await_in_flight: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            immediate_capacity: DEFAULT_CAPACITY,
            background_capacity: DEFAULT_CAPACITY,
            frame_capacity: DEFAULT_CAPACITY,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            await_in_flight: true,
        }
    }
}

impl SchedulerConfig {
    /// Build from `PHASELOOP_*` env vars, falling back to defaults for
    /// anything missing or unparsable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            immediate_capacity: env_parse("PHASELOOP_IMMEDIATE_CAPACITY", d.immediate_capacity),
            background_capacity: env_parse("PHASELOOP_BACKGROUND_CAPACITY", d.background_capacity),
            frame_capacity: env_parse("PHASELOOP_FRAME_CAPACITY", d.frame_capacity),
            frame_interval_ms: env_parse("PHASELOOP_FRAME_INTERVAL_MS", d.frame_interval_ms),
            await_in_flight: env_parse("PHASELOOP_AWAIT_IN_FLIGHT", d.await_in_flight),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.immediate_capacity = capacity;
        self.background_capacity = capacity;
        self.frame_capacity = capacity;
        self
    }

    pub fn capacity(&self, phase: Phase) -> usize {
        match phase {
            Phase::Immediate => self.immediate_capacity,
            Phase::Background => self.background_capacity,
            Phase::Frame => self.frame_capacity,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        for phase in Phase::ALL {
            if self.capacity(phase) == 0 {
                return Err(SchedulerError::InvalidConfig(format!(
                    "{phase} capacity must be greater than zero"
                )));
            }
        }
        if self.frame_interval_ms == 0 || self.frame_interval_ms > MAX_FRAME_INTERVAL_MS {
            return Err(SchedulerError::InvalidConfig(format!(
                "frame interval must be between 1 and {MAX_FRAME_INTERVAL_MS}ms, got {}",
                self.frame_interval_ms
            )));
        }
        Ok(())
    }
}
