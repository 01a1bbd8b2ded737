// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Error types for the Nightjar AKES stack
//!
//! This module defines the unified error type used throughout the stack.
//! All errors are no_std compatible and carry no heap-allocated context.

use core::fmt;

/// Result type alias for AKES operations
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the AKES stack
///
/// Codes are grouped by layer: 0x01xx crypto, 0x02xx framing/buffers,
/// 0x03xx neighbor table, 0x04xx handshake/protocol, 0x05xx configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Cryptographic Errors (0x01xx)
    // =========================================================================
    /// Key material is malformed or missing
    InvalidKey,
    /// MIC or OTP verification failed
    AuthenticationFailed,
    /// Random number generator failure
    RngFailure,
    /// Nonce construction failed
    InvalidNonce,
    /// Key derivation failed
    KeyDerivationFailed,

    // =========================================================================
    // Framing Errors (0x02xx)
    // =========================================================================
    /// Output buffer is too small for the operation
    BufferTooSmall,
    /// Frame ends before its declared fields do
    FrameTooShort,
    /// Command payload does not parse
    MalformedCommand,
    /// No handler consumed the command
    UnknownCommand,
    /// Frame type or subtype is not handled by this framer
    UnsupportedFrame,

    // =========================================================================
    // Neighbor Table Errors (0x03xx)
    // =========================================================================
    /// No free slot in the neighbor arena
    NeighborTableFull,
    /// Tentative neighbor cap reached
    TentativeLimitReached,
    /// No neighbor with that address or index
    NoSuchNeighbor,
    /// Operation requires a permanent neighbor
    NotPermanent,
    /// Wire index is outside the arena
    IndexOutOfRange,

    // =========================================================================
    // Protocol Errors (0x04xx)
    // =========================================================================
    /// A leaky bucket is full
    RateLimited,
    /// Frame counter or sequence number was seen before
    ReplayDetected,
    /// Challenge echo does not match our outstanding challenge
    ChallengeMismatch,
    /// A session with this peer is already being established
    HandshakeInProgress,
    /// Unicast went unacknowledged
    NoAck,
    /// MAC transmission queue is full
    QueueFull,
    /// A wake-up frame promised a rendezvous later than allowed
    RendezvousTooLate,

    // =========================================================================
    // Configuration Errors (0x05xx)
    // =========================================================================
    /// Configuration failed validation
    ConfigInvalid,

    /// Internal error (should not occur)
    InternalError,
}

impl Error {
    /// Get the stable error code for logging/debugging
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidKey => 0x0101,
            Self::AuthenticationFailed => 0x0102,
            Self::RngFailure => 0x0103,
            Self::InvalidNonce => 0x0104,
            Self::KeyDerivationFailed => 0x0105,
            Self::BufferTooSmall => 0x0201,
            Self::FrameTooShort => 0x0202,
            Self::MalformedCommand => 0x0203,
            Self::UnknownCommand => 0x0204,
            Self::UnsupportedFrame => 0x0205,
            Self::NeighborTableFull => 0x0301,
            Self::TentativeLimitReached => 0x0302,
            Self::NoSuchNeighbor => 0x0303,
            Self::NotPermanent => 0x0304,
            Self::IndexOutOfRange => 0x0305,
            Self::RateLimited => 0x0401,
            Self::ReplayDetected => 0x0402,
            Self::ChallengeMismatch => 0x0403,
            Self::HandshakeInProgress => 0x0404,
            Self::NoAck => 0x0405,
            Self::QueueFull => 0x0406,
            Self::RendezvousTooLate => 0x0407,
            Self::ConfigInvalid => 0x0501,
            Self::InternalError => 0xFFFF,
        }
    }

    /// Get the error description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidKey => "invalid key",
            Self::AuthenticationFailed => "authentication failed",
            Self::RngFailure => "RNG failure",
            Self::InvalidNonce => "invalid nonce",
            Self::KeyDerivationFailed => "key derivation failed",
            Self::BufferTooSmall => "buffer too small",
            Self::FrameTooShort => "frame too short",
            Self::MalformedCommand => "malformed command",
            Self::UnknownCommand => "unknown command",
            Self::UnsupportedFrame => "unsupported frame",
            Self::NeighborTableFull => "neighbor table full",
            Self::TentativeLimitReached => "tentative neighbor limit reached",
            Self::NoSuchNeighbor => "no such neighbor",
            Self::NotPermanent => "neighbor is not permanent",
            Self::IndexOutOfRange => "neighbor index out of range",
            Self::RateLimited => "rate limited",
            Self::ReplayDetected => "replay detected",
            Self::ChallengeMismatch => "challenge mismatch",
            Self::HandshakeInProgress => "handshake already in progress",
            Self::NoAck => "no acknowledgement",
            Self::QueueFull => "transmission queue full",
            Self::RendezvousTooLate => "rendezvous time too late",
            Self::ConfigInvalid => "invalid configuration",
            Self::InternalError => "internal error",
        }
    }

    /// Whether this error points at a possible attack rather than a
    /// resource or programming problem
    #[must_use]
    pub const fn is_security_error(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::ReplayDetected
                | Self::ChallengeMismatch
                | Self::RateLimited
                | Self::RendezvousTooLate
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter<'_>) {
        defmt::write!(fmt, "[0x{=u16:04X}] {=str}", self.code(), self.description());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let all = [
            Error::InvalidKey,
            Error::AuthenticationFailed,
            Error::RngFailure,
            Error::InvalidNonce,
            Error::KeyDerivationFailed,
            Error::BufferTooSmall,
            Error::FrameTooShort,
            Error::MalformedCommand,
            Error::UnknownCommand,
            Error::UnsupportedFrame,
            Error::NeighborTableFull,
            Error::TentativeLimitReached,
            Error::NoSuchNeighbor,
            Error::NotPermanent,
            Error::IndexOutOfRange,
            Error::RateLimited,
            Error::ReplayDetected,
            Error::ChallengeMismatch,
            Error::HandshakeInProgress,
            Error::NoAck,
            Error::QueueFull,
            Error::RendezvousTooLate,
            Error::ConfigInvalid,
            Error::InternalError,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code(), "{a} and {b} share a code");
            }
        }
    }

    #[test]
    fn test_security_classification() {
        assert!(Error::ReplayDetected.is_security_error());
        assert!(Error::AuthenticationFailed.is_security_error());
        assert!(Error::ChallengeMismatch.is_security_error());
        assert!(!Error::BufferTooSmall.is_security_error());
        assert!(!Error::ConfigInvalid.is_security_error());
    }
}
