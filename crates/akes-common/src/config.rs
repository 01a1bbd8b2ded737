// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Runtime configuration for the AKES stack
//!
//! Configuration is plain data with compile-time defaults. Validation runs
//! when a protocol context is constructed, never on the hot path: an invalid
//! combination is rejected with `Error::ConfigInvalid` before any state
//! exists.

use crate::constants::{
    HELLOACK_AND_ACK_DELAY_SECS, MAX_ACK_RETRANSMISSIONS, MAX_HELLOACK_RETRANSMISSIONS,
    MAX_UPDATE_RETRANSMISSIONS, MAX_WAITING_PERIOD_SECS, NBR_LIFETIME_SECS,
    POTR_MAX_HELLO_RENDEZVOUS, POTR_MAX_RENDEZVOUS, SEQNO_LIFETIME_SECS, TRICKLE_IMIN_SECS,
    TRICKLE_MAX_DOUBLINGS, TRICKLE_REDUNDANCY,
};
use crate::errors::{Error, Result};

/// Parameters of one leaky bucket
///
/// `drain_period_secs` is the time one drop takes to leak out, so a bucket
/// admits a long-term average of one event per drain period with bursts up
/// to `capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketParams {
    /// Maximum number of drops the bucket holds
    pub capacity: u16,
    /// Seconds per leaked drop
    pub drain_period_secs: u32,
}

impl BucketParams {
    /// Create bucket parameters
    #[must_use]
    pub const fn new(capacity: u16, drain_period_secs: u32) -> Self {
        Self {
            capacity,
            drain_period_secs,
        }
    }

    /// Outgoing HELLO gate: 10 HELLOs, one regained every 5 minutes
    pub const HELLO: Self = Self::new(10, 300);

    /// Outgoing HELLOACK gate: 20 HELLOACKs, one regained every 150 s
    pub const HELLOACK: Self = Self::new(20, 150);

    /// Outgoing ACK gate, same shape as the HELLOACK gate
    pub const ACK: Self = Self::new(20, 150);

    /// Inbound HELLO wake-up frames at the framer
    pub const INC_HELLO: Self = Self::new(20, 15);

    /// Inbound HELLOACK wake-up frames at the framer
    pub const INC_HELLOACK: Self = Self::new(20, 8);

    fn validate(&self) -> Result<()> {
        if self.capacity == 0 || self.drain_period_secs == 0 {
            return Err(Error::ConfigInvalid);
        }
        Ok(())
    }
}

/// Trickle timer parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrickleParams {
    /// Minimum interval in seconds
    pub i_min_secs: u32,
    /// Number of doublings between minimum and maximum interval
    pub max_doublings: u8,
    /// Redundancy constant k; 0 disables suppression
    pub redundancy: u8,
}

impl TrickleParams {
    /// Default Trickle parameters
    pub const DEFAULT: Self = Self {
        i_min_secs: TRICKLE_IMIN_SECS,
        max_doublings: TRICKLE_MAX_DOUBLINGS,
        redundancy: TRICKLE_REDUNDANCY,
    };

    fn validate(&self) -> Result<()> {
        if self.i_min_secs == 0 {
            return Err(Error::ConfigInvalid);
        }
        Ok(())
    }
}

/// Handshake timing and retransmission budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Upper bound on HELLOACK delay plus ACK delay, seconds
    pub max_waiting_period_secs: u32,
    /// Worst-case latency of one HELLOACK or ACK transmission, seconds
    pub helloack_and_ack_delay_secs: u32,
    /// HELLOACK retransmission budget
    pub max_helloack_retransmissions: u8,
    /// ACK retransmission budget
    pub max_ack_retransmissions: u8,
}

impl HandshakeConfig {
    /// Default handshake configuration
    pub const DEFAULT: Self = Self {
        max_waiting_period_secs: MAX_WAITING_PERIOD_SECS,
        helloack_and_ack_delay_secs: HELLOACK_AND_ACK_DELAY_SECS,
        max_helloack_retransmissions: MAX_HELLOACK_RETRANSMISSIONS,
        max_ack_retransmissions: MAX_ACK_RETRANSMISSIONS,
    };

    fn validate(&self) -> Result<()> {
        // A responder must be able to fit its random HELLOACK delay plus
        // both transmissions inside the initiator's waiting period.
        if self.max_waiting_period_secs < 2 * self.helloack_and_ack_delay_secs {
            return Err(Error::ConfigInvalid);
        }
        if self.helloack_and_ack_delay_secs == 0 {
            return Err(Error::ConfigInvalid);
        }
        Ok(())
    }
}

/// Neighbor lifetime and deletion-service settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifetimeConfig {
    /// Permanent neighbor lifetime without prolongation, seconds
    pub nbr_lifetime_secs: u32,
    /// Lifetime of a cached sequence number, seconds
    pub seqno_lifetime_secs: u32,
    /// UPDATE retransmission budget before deletion; retransmissions are
    /// paced by the radio, which receives the whole budget at once
    pub max_update_retransmissions: u8,
}

impl LifetimeConfig {
    /// Default lifetime configuration
    pub const DEFAULT: Self = Self {
        nbr_lifetime_secs: NBR_LIFETIME_SECS,
        seqno_lifetime_secs: SEQNO_LIFETIME_SECS,
        max_update_retransmissions: MAX_UPDATE_RETRANSMISSIONS,
    };

    fn validate(&self) -> Result<()> {
        if self.nbr_lifetime_secs == 0 || self.seqno_lifetime_secs == 0 {
            return Err(Error::ConfigInvalid);
        }
        Ok(())
    }
}

/// Complete AKES configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AkesConfig {
    /// Handshake timing
    pub handshake: HandshakeConfig,
    /// Neighbor lifetimes and the deletion service
    pub lifetimes: LifetimeConfig,
    /// Outgoing HELLO gate
    pub hello_bucket: BucketParams,
    /// Outgoing HELLOACK gate
    pub helloack_bucket: BucketParams,
    /// Outgoing ACK gate
    pub ack_bucket: BucketParams,
    /// HELLO scheduling
    pub trickle: TrickleParams,
}

impl AkesConfig {
    /// Default configuration
    pub const DEFAULT: Self = Self {
        handshake: HandshakeConfig::DEFAULT,
        lifetimes: LifetimeConfig::DEFAULT,
        hello_bucket: BucketParams::HELLO,
        helloack_bucket: BucketParams::HELLOACK,
        ack_bucket: BucketParams::ACK,
        trickle: TrickleParams::DEFAULT,
    };

    /// Validate the whole configuration
    ///
    /// Called by `Akes::new`; individual fields are checked first, then
    /// cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        self.handshake.validate()?;
        self.lifetimes.validate()?;
        self.hello_bucket.validate()?;
        self.helloack_bucket.validate()?;
        self.ack_bucket.validate()?;
        self.trickle.validate()?;
        // HELLOs slower than every i_min would starve Trickle's own pacing;
        // the interval must cover a full waiting period twice so late
        // HELLOACKs never race the next HELLO.
        if self.trickle.i_min_secs < 2 * self.handshake.max_waiting_period_secs {
            return Err(Error::ConfigInvalid);
        }
        Ok(())
    }
}

impl Default for AkesConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// POTR framer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerConfig {
    /// Inbound HELLO wake-up frame gate
    pub inc_hello_bucket: BucketParams,
    /// Inbound HELLOACK wake-up frame gate
    pub inc_helloack_bucket: BucketParams,
    /// Longest acceptable HELLO rendezvous time, in remaining wake-up
    /// frames; anything later keeps the radio awake beyond one wake-up
    /// interval and is dropped
    pub max_hello_rendezvous: u16,
    /// Longest acceptable rendezvous time for the phase-locked subtypes
    pub max_rendezvous: u8,
}

impl FramerConfig {
    /// Default framer configuration
    pub const DEFAULT: Self = Self {
        inc_hello_bucket: BucketParams::INC_HELLO,
        inc_helloack_bucket: BucketParams::INC_HELLOACK,
        max_hello_rendezvous: POTR_MAX_HELLO_RENDEZVOUS,
        max_rendezvous: POTR_MAX_RENDEZVOUS,
    };

    /// Validate the framer configuration
    pub fn validate(&self) -> Result<()> {
        self.inc_hello_bucket.validate()?;
        self.inc_helloack_bucket.validate()?;
        if self.max_hello_rendezvous == 0 || self.max_rendezvous == 0 {
            return Err(Error::ConfigInvalid);
        }
        Ok(())
    }
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AkesConfig::DEFAULT.validate().is_ok());
        assert!(FramerConfig::DEFAULT.validate().is_ok());
    }

    #[test]
    fn test_waiting_period_lower_bound() {
        let mut cfg = AkesConfig::DEFAULT;
        cfg.handshake.max_waiting_period_secs = 9;
        cfg.handshake.helloack_and_ack_delay_secs = 5;
        assert_eq!(cfg.validate(), Err(Error::ConfigInvalid));
    }

    #[test]
    fn test_zero_capacity_bucket_rejected() {
        let mut cfg = AkesConfig::DEFAULT;
        cfg.hello_bucket.capacity = 0;
        assert_eq!(cfg.validate(), Err(Error::ConfigInvalid));
    }

    #[test]
    fn test_trickle_interval_covers_waiting_period() {
        let mut cfg = AkesConfig::DEFAULT;
        cfg.trickle.i_min_secs = 20;
        assert_eq!(cfg.validate(), Err(Error::ConfigInvalid));
    }
}
