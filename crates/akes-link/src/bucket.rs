// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Leaky buckets for denial-of-sleep defense
//!
//! Every resource an attacker could burn down remotely sits behind a leaky
//! bucket: outgoing HELLOs, HELLOACKs and ACKs, and the framer's inbound
//! wake-up frame gates. A bucket admits bursts up to its capacity and then
//! recovers one drop per drain period.
//!
//! Buckets never run on a timer. Draining happens lazily whenever the
//! filling level is inspected, based on the ticks elapsed since the last
//! drain.

use akes_common::config::BucketParams;
use akes_common::time::{secs_to_ticks, Ticks};

/// A leaky bucket with lazy, elapsed-time draining
#[derive(Debug, Clone)]
pub struct LeakyBucket {
    filling_level: u16,
    capacity: u16,
    drain_period: u64,
    last_drain: Ticks,
}

impl LeakyBucket {
    /// Create an empty bucket
    #[must_use]
    pub fn new(params: &BucketParams, now: Ticks) -> Self {
        Self {
            filling_level: 0,
            capacity: params.capacity,
            drain_period: secs_to_ticks(u64::from(params.drain_period_secs)),
            last_drain: now,
        }
    }

    /// Pour one drop into the bucket, saturating at capacity
    pub fn pour(&mut self, now: Ticks) {
        self.drain(now);
        if self.filling_level < self.capacity {
            self.filling_level += 1;
        }
    }

    /// Check whether the bucket is full
    pub fn is_full(&mut self, now: Ticks) -> bool {
        self.drain(now);
        self.filling_level >= self.capacity
    }

    /// Current filling level after draining
    pub fn filling_level(&mut self, now: Ticks) -> u16 {
        self.drain(now);
        self.filling_level
    }

    fn drain(&mut self, now: Ticks) {
        let elapsed = self.last_drain.elapsed(now);
        let drops = elapsed / self.drain_period;
        if drops == 0 {
            return;
        }
        self.filling_level = self
            .filling_level
            .saturating_sub(drops.min(u64::from(u16::MAX)) as u16);
        // Advance by whole periods only, so partial progress is kept
        self.last_drain = self.last_drain + drops * self.drain_period;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> LeakyBucket {
        LeakyBucket::new(&BucketParams::new(3, 10), Ticks::ZERO)
    }

    #[test]
    fn test_fills_to_capacity() {
        let mut b = bucket();
        let now = Ticks::ZERO;
        assert!(!b.is_full(now));
        b.pour(now);
        b.pour(now);
        assert!(!b.is_full(now));
        b.pour(now);
        assert!(b.is_full(now));
        // Pouring past capacity saturates
        b.pour(now);
        assert_eq!(b.filling_level(now), 3);
    }

    #[test]
    fn test_drains_one_drop_per_period() {
        let mut b = bucket();
        for _ in 0..3 {
            b.pour(Ticks::ZERO);
        }
        assert!(b.is_full(Ticks::from_secs(9)));
        assert!(!b.is_full(Ticks::from_secs(10)));
        assert_eq!(b.filling_level(Ticks::from_secs(10)), 2);
        assert_eq!(b.filling_level(Ticks::from_secs(30)), 0);
    }

    #[test]
    fn test_partial_periods_accumulate() {
        let mut b = bucket();
        b.pour(Ticks::ZERO);
        // 7 s then 3 s: one whole period has elapsed overall
        assert_eq!(b.filling_level(Ticks::from_secs(7)), 1);
        assert_eq!(b.filling_level(Ticks::from_secs(10)), 0);
    }

    #[test]
    fn test_never_underflows() {
        let mut b = bucket();
        assert_eq!(b.filling_level(Ticks::from_secs(1000)), 0);
        b.pour(Ticks::from_secs(1000));
        assert_eq!(b.filling_level(Ticks::from_secs(1001)), 1);
    }
}
