// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Monotonic time for the AKES stack
//!
//! All protocol timing is expressed in ticks of a monotonic clock the
//! platform supplies. The stack never sleeps or blocks; contexts are
//! polled with the current tick count and report due work.

use core::ops::{Add, Sub};

/// Tick resolution assumed by the default configuration (1 kHz)
pub const TICKS_PER_SEC: u64 = 1000;

/// Monotonic tick counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(u64);

impl Ticks {
    /// Tick zero
    pub const ZERO: Self = Self(0);

    /// Create from a raw tick count
    #[must_use]
    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Create from whole seconds
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(TICKS_PER_SEC))
    }

    /// Create from milliseconds
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(TICKS_PER_SEC) / 1000)
    }

    /// Get the raw tick count
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Ticks elapsed since this instant
    #[must_use]
    pub const fn elapsed(&self, now: Self) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Check whether `duration` ticks have passed since this instant
    #[must_use]
    pub const fn has_elapsed(&self, now: Self, duration: u64) -> bool {
        self.elapsed(now) >= duration
    }
}

impl From<u64> for Ticks {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Ticks> for u64 {
    fn from(value: Ticks) -> Self {
        value.0
    }
}

impl Add<u64> for Ticks {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl Sub<Ticks> for Ticks {
    type Output = u64;

    fn sub(self, rhs: Ticks) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

/// Convert whole seconds to ticks
#[must_use]
pub const fn secs_to_ticks(secs: u64) -> u64 {
    secs.saturating_mul(TICKS_PER_SEC)
}

/// Deadline tracker used for wait periods, retransmissions and intervals
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Ticks,
    timeout: u64,
}

impl Deadline {
    /// Create a deadline `timeout_ticks` after `start`
    #[must_use]
    pub const fn new(start: Ticks, timeout_ticks: u64) -> Self {
        Self {
            start,
            timeout: timeout_ticks,
        }
    }

    /// Create a deadline a number of seconds after `start`
    #[must_use]
    pub const fn after_secs(start: Ticks, secs: u64) -> Self {
        Self::new(start, secs_to_ticks(secs))
    }

    /// Check whether the deadline has passed
    #[must_use]
    pub const fn is_expired(&self, now: Ticks) -> bool {
        self.start.elapsed(now) >= self.timeout
    }

    /// Remaining ticks until the deadline (0 if expired)
    #[must_use]
    pub const fn remaining(&self, now: Ticks) -> u64 {
        let elapsed = self.start.elapsed(now);
        if elapsed >= self.timeout {
            0
        } else {
            self.timeout - elapsed
        }
    }

    /// The instant the deadline was armed
    #[must_use]
    pub const fn start(&self) -> Ticks {
        self.start
    }
}
