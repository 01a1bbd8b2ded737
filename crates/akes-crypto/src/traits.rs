// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Core cryptographic traits
//!
//! The AKES stack is symmetric-key only, so the seams are narrow: a random
//! number generator the platform supplies and constant-time comparison for
//! anything an attacker could probe with timing.
//!
//! # Design Principles
//!
//! 1. **Constant-time**: MIC and key comparisons never branch on secrets
//! 2. **Zeroization**: Secret data must be zeroized after use
//! 3. **no_std**: All traits are no_std compatible

use crate::error::CryptoError;

/// Cryptographically secure random number generator trait
///
/// Implemented by the CTR-DRBG in this crate and by platform TRNG wrappers.
pub trait CryptoRng {
    /// Fill buffer with random bytes
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngFailure` if the RNG fails.
    fn fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), CryptoError>;

    /// Generate a random u16
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngFailure` if the RNG fails.
    fn next_u16(&mut self) -> Result<u16, CryptoError> {
        let mut buf = [0u8; 2];
        self.fill_bytes(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Generate a random u32
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngFailure` if the RNG fails.
    fn next_u32(&mut self) -> Result<u32, CryptoError> {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Generate a random u64
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngFailure` if the RNG fails.
    fn next_u64(&mut self) -> Result<u64, CryptoError> {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Draw a value uniformly from `[0, bound)` by rejection sampling
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngFailure` if the RNG fails, or
    /// `CryptoError::InternalError` for a zero bound.
    fn next_bounded(&mut self, bound: u64) -> Result<u64, CryptoError> {
        if bound == 0 {
            return Err(CryptoError::InternalError);
        }
        if bound.is_power_of_two() {
            return Ok(self.next_u64()? & (bound - 1));
        }
        let zone = u64::MAX - (u64::MAX % bound);
        loop {
            let v = self.next_u64()?;
            if v < zone {
                return Ok(v % bound);
            }
        }
    }
}

/// Constant-time comparison
///
/// Compares two byte slices in constant time to prevent timing attacks.
/// Mismatched lengths return early; lengths are public here.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::CtrDrbg;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abcd", b"abcd"));
        assert!(!constant_time_eq(b"abcd", b"abce"));
        assert!(!constant_time_eq(b"abcd", b"abc"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_next_bounded_stays_in_range() {
        let mut rng = CtrDrbg::new(&[7u8; 16], 1);
        for bound in [1u64, 2, 3, 10, 1000, 1 << 33] {
            for _ in 0..64 {
                assert!(rng.next_bounded(bound).unwrap() < bound);
            }
        }
    }

    #[test]
    fn test_next_bounded_rejects_zero() {
        let mut rng = CtrDrbg::new(&[7u8; 16], 1);
        assert!(rng.next_bounded(0).is_err());
    }
}
