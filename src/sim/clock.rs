//! Simulation clock and countdown timers
//!
//! Time is counted in fixed ticks. Every timer stores the tick at which it
//! expires, so freezing the clock (pause) freezes every timer with it.

use serde::{Deserialize, Serialize};

use crate::consts::SIM_HZ;

/// Convert milliseconds to whole ticks (rounded up, so short timers last at least one tick)
#[inline]
pub fn ms_to_ticks(ms: u32) -> u64 {
    (u64::from(ms) * u64::from(SIM_HZ)).div_ceil(1000)
}

/// Convert ticks to milliseconds
#[inline]
pub fn ticks_to_ms(ticks: u64) -> u64 {
    ticks * 1000 / u64::from(SIM_HZ)
}

/// Monotonic tick counter, advanced only while the stage is being played
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimClock {
    now: u64,
}

impl SimClock {
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn advance(&mut self) {
        self.now += 1;
    }

    /// Elapsed play time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        ticks_to_ms(self.now)
    }
}

/// A countdown that expires at a fixed tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    expires_at: Option<u64>,
}

impl Countdown {
    /// Start (or restart) the countdown
    pub fn start(&mut self, now: u64, duration_ticks: u64) {
        self.expires_at = Some(now + duration_ticks);
    }

    pub fn cancel(&mut self) {
        self.expires_at = None;
    }

    /// True while the countdown has time left
    pub fn is_running(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| now < at)
    }

    /// True once the countdown was started and has run out
    pub fn has_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Ticks left (0 when idle or expired)
    pub fn remaining(&self, now: u64) -> u64 {
        self.expires_at.map_or(0, |at| at.saturating_sub(now))
    }
}
