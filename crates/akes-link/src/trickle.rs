// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Trickle scheduling of HELLO broadcasts
//!
//! An RFC 6206 style timer with two deviations that suit neighbor
//! discovery: the first interval starts at `I_min` rather than at a random
//! interval, and resets are no-ops while the interval already is `I_min`.
//!
//! Within each interval `I`, a transmission point `t` is drawn from
//! `[I/2, I)`. The HELLO is suppressed when the consistency counter has
//! reached the redundancy constant `k` by then, meaning enough neighbors
//! already confirmed our HELLO this interval. At the interval's end `I`
//! doubles, capped at `I_min << max_doublings`.

use akes_common::config::TrickleParams;
use akes_common::time::{secs_to_ticks, Ticks};
use akes_common::{Error, Result};
use akes_crypto::CryptoRng;

/// Work the Trickle timer reports from [`Trickle::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrickleEvent {
    /// The transmission point passed without suppression; broadcast a HELLO
    SendHello,
}

/// The HELLO scheduler
#[derive(Debug)]
pub struct Trickle {
    i_min: u64,
    i_max: u64,
    redundancy: u8,
    /// Current interval length in ticks
    interval: u64,
    /// Start of the current interval
    interval_start: Ticks,
    /// Ticks into the interval at which the HELLO fires
    t_offset: u64,
    t_fired: bool,
    counter: u8,
    /// Handshakes completed since the last reset
    new_nbrs_count: u8,
}

impl Trickle {
    /// Start the timer; the first interval begins at `I_min`
    ///
    /// # Errors
    ///
    /// `Error::ConfigInvalid` for a zero `i_min`, `Error::RngFailure` if
    /// drawing the transmission point fails.
    pub fn new<R: CryptoRng>(params: &TrickleParams, now: Ticks, rng: &mut R) -> Result<Self> {
        if params.i_min_secs == 0 {
            return Err(Error::ConfigInvalid);
        }
        let i_min = secs_to_ticks(u64::from(params.i_min_secs));
        let mut trickle = Self {
            i_min,
            i_max: i_min << params.max_doublings,
            redundancy: params.redundancy,
            interval: i_min,
            interval_start: now,
            t_offset: 0,
            t_fired: false,
            counter: 0,
            new_nbrs_count: 0,
        };
        trickle.start_interval(now, rng)?;
        Ok(trickle)
    }

    /// Advance the timer, reporting a due HELLO at most once per interval
    ///
    /// # Errors
    ///
    /// `Error::RngFailure` if drawing the next transmission point fails.
    pub fn poll<R: CryptoRng>(&mut self, now: Ticks, rng: &mut R) -> Result<Option<TrickleEvent>> {
        let elapsed = self.interval_start.elapsed(now);

        if !self.t_fired && elapsed >= self.t_offset {
            self.t_fired = true;
            if self.redundancy == 0 || self.counter < self.redundancy {
                return Ok(Some(TrickleEvent::SendHello));
            }
        }

        if elapsed >= self.interval {
            self.interval = (self.interval * 2).min(self.i_max);
            self.start_interval(now, rng)?;
        }
        Ok(None)
    }

    /// Count a consistent transmission (an authentic HELLO from a neighbor
    /// that had not confirmed ours this interval)
    pub fn hear_consistent(&mut self) {
        self.counter = self.counter.saturating_add(1);
    }

    /// A handshake completed; reset once enough of the neighborhood is new
    ///
    /// A single new neighbor resets a small neighborhood immediately, while
    /// an established node waits until a quarter of its permanent neighbors
    /// turned over.
    ///
    /// # Errors
    ///
    /// `Error::RngFailure` if restarting the interval fails.
    pub fn on_new_nbr<R: CryptoRng>(
        &mut self,
        permanent_count: usize,
        now: Ticks,
        rng: &mut R,
    ) -> Result<()> {
        self.new_nbrs_count = self.new_nbrs_count.saturating_add(1);
        let threshold = (permanent_count / 4).max(1);
        if usize::from(self.new_nbrs_count) >= threshold {
            self.reset(now, rng)?;
        }
        Ok(())
    }

    /// Shrink back to `I_min` and restart; a no-op while already there
    ///
    /// # Errors
    ///
    /// `Error::RngFailure` if restarting the interval fails.
    pub fn reset<R: CryptoRng>(&mut self, now: Ticks, rng: &mut R) -> Result<()> {
        self.new_nbrs_count = 0;
        if self.interval == self.i_min {
            return Ok(());
        }
        self.interval = self.i_min;
        self.start_interval(now, rng)
    }

    /// Current interval length in ticks
    #[must_use]
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Consistency counter of the current interval
    #[must_use]
    pub fn counter(&self) -> u8 {
        self.counter
    }

    fn start_interval<R: CryptoRng>(&mut self, now: Ticks, rng: &mut R) -> Result<()> {
        let half = self.interval / 2;
        // t in [I/2, I)
        self.t_offset = half + rng.next_bounded(half.max(1)).map_err(Error::from)?;
        self.interval_start = now;
        self.t_fired = false;
        self.counter = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akes_crypto::CtrDrbg;

    fn params() -> TrickleParams {
        TrickleParams {
            i_min_secs: 30,
            max_doublings: 4,
            redundancy: 2,
        }
    }

    fn rng() -> CtrDrbg {
        CtrDrbg::new(&[0x21; 16], 1)
    }

    fn run_until_event(
        trickle: &mut Trickle,
        rng: &mut CtrDrbg,
        from: Ticks,
        limit_secs: u64,
    ) -> Option<(Ticks, TrickleEvent)> {
        for s in 0..limit_secs {
            let now = from + secs_to_ticks(s);
            if let Some(e) = trickle.poll(now, rng).unwrap() {
                return Some((now, e));
            }
        }
        None
    }

    #[test]
    fn test_first_hello_within_first_interval() {
        let mut r = rng();
        let mut t = Trickle::new(&params(), Ticks::ZERO, &mut r).unwrap();
        let (at, event) = run_until_event(&mut t, &mut r, Ticks::ZERO, 31).unwrap();
        assert_eq!(event, TrickleEvent::SendHello);
        // t lies in [I/2, I)
        assert!(at.as_u64() >= secs_to_ticks(15));
        assert!(at.as_u64() < secs_to_ticks(30));
    }

    #[test]
    fn test_interval_doubles_up_to_cap() {
        let mut r = rng();
        let mut t = Trickle::new(&params(), Ticks::ZERO, &mut r).unwrap();
        assert_eq!(t.interval(), secs_to_ticks(30));
        let mut now = Ticks::ZERO;
        for _ in 0..8 {
            now = now + t.interval();
            let _ = t.poll(now, &mut r).unwrap();
        }
        assert_eq!(t.interval(), secs_to_ticks(30) << 4);
    }

    #[test]
    fn test_suppression_at_redundancy() {
        let mut r = rng();
        let mut t = Trickle::new(&params(), Ticks::ZERO, &mut r).unwrap();
        t.hear_consistent();
        t.hear_consistent();
        assert!(run_until_event(&mut t, &mut r, Ticks::ZERO, 30).is_none());
    }

    #[test]
    fn test_reset_is_noop_at_i_min() {
        let mut r = rng();
        let mut t = Trickle::new(&params(), Ticks::ZERO, &mut r).unwrap();
        t.hear_consistent();
        let offset_before = t.t_offset;
        t.reset(Ticks::from_secs(5), &mut r).unwrap();
        // Still within the original interval: nothing restarted
        assert_eq!(t.t_offset, offset_before);
        assert_eq!(t.counter(), 1);
    }

    #[test]
    fn test_new_nbr_threshold() {
        let mut r = rng();
        let mut t = Trickle::new(&params(), Ticks::ZERO, &mut r).unwrap();
        // Grow the interval first so a reset is observable
        let mut now = Ticks::ZERO;
        for _ in 0..3 {
            now = now + t.interval();
            let _ = t.poll(now, &mut r).unwrap();
        }
        assert!(t.interval() > secs_to_ticks(30));

        // 8 permanent neighbors: threshold is 2
        t.on_new_nbr(8, now, &mut r).unwrap();
        assert!(t.interval() > secs_to_ticks(30));
        t.on_new_nbr(8, now, &mut r).unwrap();
        assert_eq!(t.interval(), secs_to_ticks(30));
    }
}
