// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Common types for the Nightjar AKES stack
//!
//! This module defines fundamental types shared by every layer: link-layer
//! addresses, handshake challenges and zeroizing byte containers.

use core::fmt;
use zeroize::Zeroize;

use crate::constants::{CHALLENGE_LEN, LINKADDR_LEN};

/// IEEE 802.15.4 extended (EUI-64) link-layer address
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LinkAddr([u8; LINKADDR_LEN]);

impl LinkAddr {
    /// Size of a link-layer address in bytes
    pub const SIZE: usize = LINKADDR_LEN;

    /// The broadcast address (all ones)
    pub const BROADCAST: Self = Self([0xFF; LINKADDR_LEN]);

    /// The null address (all zeros)
    pub const NULL: Self = Self([0; LINKADDR_LEN]);

    /// Create a new address from bytes
    #[must_use]
    pub const fn new(bytes: [u8; LINKADDR_LEN]) -> Self {
        Self(bytes)
    }

    /// Create an address from a slice
    ///
    /// Returns `None` if the slice length is not exactly 8 bytes.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != LINKADDR_LEN {
            return None;
        }
        let mut bytes = [0u8; LINKADDR_LEN];
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }

    /// Get the address as a byte array
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; LINKADDR_LEN] {
        &self.0
    }

    /// Check whether this is the broadcast address
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.0.iter().all(|&b| b == 0xFF)
    }

    /// Check whether this is the null address
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl AsRef<[u8]> for LinkAddr {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkAddr({self})")
    }
}

impl fmt::Display for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LinkAddr {
    fn format(&self, fmt: defmt::Formatter<'_>) {
        defmt::write!(fmt, "{=[u8]:02x}", self.0);
    }
}

/// Handshake challenge (8 bytes of fresh randomness)
///
/// Two challenges concatenated form exactly one AES block, which is what
/// the pairwise key derivation encrypts.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Challenge([u8; CHALLENGE_LEN]);

impl Challenge {
    /// Size of a challenge in bytes
    pub const SIZE: usize = CHALLENGE_LEN;

    /// Create a challenge from bytes
    #[must_use]
    pub const fn new(bytes: [u8; CHALLENGE_LEN]) -> Self {
        Self(bytes)
    }

    /// Create a challenge from a slice
    ///
    /// Returns `None` if the slice length is not exactly 8 bytes.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != CHALLENGE_LEN {
            return None;
        }
        let mut bytes = [0u8; CHALLENGE_LEN];
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }

    /// Get the challenge as a byte array
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; CHALLENGE_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for Challenge {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Challenges are public values, still keep log lines short
        write!(f, "Challenge(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "...)")
    }
}

/// Fixed-size byte container that zeroizes on drop
///
/// Used for any buffer that may transiently hold key material.
#[derive(Clone)]
pub struct SecureBytes<const N: usize>([u8; N]);

impl<const N: usize> SecureBytes<N> {
    /// Create a new zeroed container
    #[must_use]
    pub const fn new() -> Self {
        Self([0u8; N])
    }

    /// Create from a byte array
    #[must_use]
    pub const fn from_bytes(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    /// Create from a slice
    ///
    /// Returns `None` if the slice length does not match.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != N {
            return None;
        }
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }

    /// Get the contents as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Get the contents as a mutable slice
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl<const N: usize> Default for SecureBytes<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> AsRef<[u8]> for SecureBytes<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> Zeroize for SecureBytes<N> {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl<const N: usize> Drop for SecureBytes<N> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl<const N: usize> fmt::Debug for SecureBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureBytes<{N}>([REDACTED])")
    }
}
