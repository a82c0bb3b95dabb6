//! Scheduler configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding the default capacity.
pub const CAPACITY_ENV: &str = "JOBQUEUE_CAPACITY";

pub const DEFAULT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of pending entries. Fixed for the scheduler's lifetime.
    pub capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub const fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Defaults, with `JOBQUEUE_CAPACITY` applied when it holds a positive
    /// integer. An invalid override is logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::try_from_env().unwrap_or_else(|err| {
            tracing::warn!(
                event = "scheduler.config.invalid",
                var = CAPACITY_ENV,
                error = %err,
                default = DEFAULT_CAPACITY,
                "Ignoring invalid capacity override"
            );
            Self::default()
        })
    }

    /// Like [`Self::from_env`], but an invalid override is an
    /// [`Error::Config`].
    pub fn try_from_env() -> Result<Self> {
        Self::from_override(std::env::var(CAPACITY_ENV).ok().as_deref())
    }

    /// Defaults with an optional raw capacity override applied.
    pub fn from_override(raw: Option<&str>) -> Result<Self> {
        let Some(raw) = raw else {
            return Ok(Self::default());
        };
        Self::parse_capacity(raw)
            .map(Self::with_capacity)
            .ok_or_else(|| {
                Error::config(format!(
                    "{CAPACITY_ENV} must be a positive integer, got {raw:?}"
                ))
            })
    }

    #[must_use]
    pub fn parse_capacity(value: &str) -> Option<usize> {
        value
            .trim()
            .replace('_', "")
            .parse::<usize>()
            .ok()
            .filter(|capacity| *capacity > 0)
    }
}
