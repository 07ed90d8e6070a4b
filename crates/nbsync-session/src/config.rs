//! Session configuration (`[session]` table)

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and queueing knobs for document actors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a document stays open after its last subscriber leaves
    pub close_grace_period_ms: u64,
    /// Upper bound for a single storage write
    pub write_timeout_ms: u64,
    /// Periodic save of dirty documents; absent disables autosave
    pub autosave_interval_ms: Option<u64>,
    /// Bounded command queue per document
    pub command_queue_capacity: usize,
}

impl SessionConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_close_grace_period(mut self, period: Duration) -> Self {
        self.close_grace_period_ms = duration_ms(period);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = duration_ms(timeout);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_autosave_interval(mut self, interval: Option<Duration>) -> Self {
        self.autosave_interval_ms = interval.map(duration_ms);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_command_queue_capacity(mut self, capacity: usize) -> Self {
        self.command_queue_capacity = capacity;
        self
    }

    #[inline]
    #[must_use]
    pub fn close_grace_period(&self) -> Duration {
        Duration::from_millis(self.close_grace_period_ms)
    }

    #[inline]
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Autosave period; zero counts as disabled
    #[inline]
    #[must_use]
    pub fn autosave_interval(&self) -> Option<Duration> {
        self.autosave_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            close_grace_period_ms: 5_000,
            write_timeout_ms: 10_000,
            autosave_interval_ms: None,
            command_queue_capacity: 256,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
