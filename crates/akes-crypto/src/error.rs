// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Cryptographic error types
//!
//! This module defines error types for all cryptographic operations.

use core::fmt;

/// Error type for cryptographic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid key format or size
    InvalidKey,
    /// Random number generator failure
    RngFailure,
    /// Buffer is too small for the operation
    BufferTooSmall,
    /// CCM* authentication failed
    AuthenticationFailed,
    /// Invalid nonce
    InvalidNonce,
    /// Key derivation failed
    KeyDerivationFailed,
    /// DRBG output limit reached; reseed required
    ReseedRequired,
    /// Internal error (should not occur)
    InternalError,
}

impl CryptoError {
    /// Get error code for logging/debugging
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidKey => 0x0101,
            Self::RngFailure => 0x0102,
            Self::BufferTooSmall => 0x0103,
            Self::AuthenticationFailed => 0x0104,
            Self::InvalidNonce => 0x0105,
            Self::KeyDerivationFailed => 0x0106,
            Self::ReseedRequired => 0x0107,
            Self::InternalError => 0x01FF,
        }
    }

    /// Get error description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidKey => "invalid key",
            Self::RngFailure => "RNG failure",
            Self::BufferTooSmall => "buffer too small",
            Self::AuthenticationFailed => "authentication failed",
            Self::InvalidNonce => "invalid nonce",
            Self::KeyDerivationFailed => "key derivation failed",
            Self::ReseedRequired => "DRBG reseed required",
            Self::InternalError => "internal error",
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

impl From<CryptoError> for akes_common::Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidKey => Self::InvalidKey,
            CryptoError::RngFailure | CryptoError::ReseedRequired => Self::RngFailure,
            CryptoError::BufferTooSmall => Self::BufferTooSmall,
            CryptoError::AuthenticationFailed => Self::AuthenticationFailed,
            CryptoError::InvalidNonce => Self::InvalidNonce,
            CryptoError::KeyDerivationFailed => Self::KeyDerivationFailed,
            CryptoError::InternalError => Self::InternalError,
        }
    }
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
