// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! CCM* authenticated encryption for 802.15.4 frames
//!
//! All frame security in this stack is AES-128 CCM* with 13-byte nonces:
//!
//! - **8-byte MICs** on command frames, unicasts and acknowledgements
//! - **4-byte tags** serving as one-time passwords in POTR wake-up frames
//! - **authentication-only mode** (empty plaintext, data as associated
//!   data) for broadcast MICs and OTPs
//!
//! # Nonce Management
//!
//! **CRITICAL**: Never reuse a nonce with the same key. Nonces here are
//! deterministic, bound to the sender address, frame counter and direction;
//! the link layer constructs them, this module only consumes them.
//!
//! # Example
//!
//! ```ignore
//! use akes_crypto::aead::{Aes128Key, CcmNonce, CcmStar};
//!
//! let key = Aes128Key::new([0u8; 16]);
//! let ccm = CcmStar::new(&key);
//! let mut payload = *b"pairwise payload";
//! let mic = ccm.encrypt_in_place(&CcmNonce::new([0u8; 13]), b"header", &mut payload)?;
//! ```

use ccm::aead::generic_array::GenericArray;
use ccm::aead::{AeadInPlace, KeyInit};
use ccm::consts::{U13, U4, U8};
use ccm::Ccm;

use aes::Aes128;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::traits::{constant_time_eq, CryptoRng};

/// CCM* with the standard 8-byte MIC (security level 6)
type CcmMic8 = Ccm<Aes128, U8, U13>;

/// CCM* with a truncated 4-byte tag, used for OTPs only
type CcmTag4 = Ccm<Aes128, U4, U13>;

/// CCM* message integrity code length in bytes
pub const MIC_LEN: usize = 8;

/// One-time password length in bytes
pub const OTP_LEN: usize = 4;

/// CCM* nonce length in bytes
pub const NONCE_LEN: usize = 13;

// =============================================================================
// Key and Nonce Types
// =============================================================================

/// AES-128 key (16 bytes)
///
/// Wraps a 128-bit key and ensures it is securely zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Aes128Key([u8; 16]);

impl Aes128Key {
    /// Create a new key from bytes
    #[must_use]
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Create from slice
    ///
    /// Returns `None` if slice length is not exactly 16 bytes.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != 16 {
            return None;
        }
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }

    /// Generate a random key
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngFailure` if the RNG fails.
    pub fn generate<R: CryptoRng>(rng: &mut R) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Constant-time equality with another key
    #[must_use]
    pub fn ct_eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.0, &other.0)
    }
}

impl AsRef<[u8]> for Aes128Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Debug for Aes128Key {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Aes128Key([REDACTED])")
    }
}

/// CCM* nonce (13 bytes)
///
/// Deterministically built by the link layer from the sender address,
/// frame counter and direction bits. Never random.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CcmNonce([u8; NONCE_LEN]);

impl CcmNonce {
    /// Create a new nonce from bytes
    #[must_use]
    pub const fn new(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from slice
    ///
    /// Returns `None` if slice length is not exactly 13 bytes.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != NONCE_LEN {
            return None;
        }
        let mut bytes = [0u8; NONCE_LEN];
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }

    /// Get the nonce as a byte array
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// An 8-byte message integrity code
#[derive(Clone, Copy, Debug, Default)]
pub struct Mic([u8; MIC_LEN]);

impl Mic {
    /// Create from bytes
    #[must_use]
    pub const fn new(bytes: [u8; MIC_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from slice
    ///
    /// Returns `None` if slice length is not exactly 8 bytes.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != MIC_LEN {
            return None;
        }
        let mut bytes = [0u8; MIC_LEN];
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }

    /// Get the MIC as a byte array
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; MIC_LEN] {
        &self.0
    }

    /// Constant-time comparison against a received MIC
    #[must_use]
    pub fn verify(&self, received: &[u8]) -> bool {
        constant_time_eq(&self.0, received)
    }
}

/// A 4-byte one-time password (truncated CCM* tag)
#[derive(Clone, Copy, Debug, Default)]
pub struct Otp([u8; OTP_LEN]);

impl Otp {
    /// Create from bytes
    #[must_use]
    pub const fn new(bytes: [u8; OTP_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from slice
    ///
    /// Returns `None` if slice length is not exactly 4 bytes.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != OTP_LEN {
            return None;
        }
        let mut bytes = [0u8; OTP_LEN];
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }

    /// Get the OTP as a byte array
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; OTP_LEN] {
        &self.0
    }

    /// Constant-time comparison against a received OTP
    #[must_use]
    pub fn verify(&self, received: &[u8]) -> bool {
        constant_time_eq(&self.0, received)
    }
}

// =============================================================================
// CCM* Cipher
// =============================================================================

/// AES-128 CCM* bound to one key
///
/// Cheap to construct; callers build one per operation from the neighbor's
/// pairwise or group key.
pub struct CcmStar {
    mic_cipher: CcmMic8,
    otp_cipher: CcmTag4,
}

impl CcmStar {
    /// Create a CCM* instance for a key
    #[must_use]
    pub fn new(key: &Aes128Key) -> Self {
        Self {
            mic_cipher: CcmMic8::new(GenericArray::from_slice(key.as_ref())),
            otp_cipher: CcmTag4::new(GenericArray::from_slice(key.as_ref())),
        }
    }

    /// Encrypt `buf` in place and return the MIC over nonce, `aad` and `buf`
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InternalError` if the cipher rejects the input
    /// (only possible for oversized messages, which 802.15.4 frames are not).
    pub fn encrypt_in_place(
        &self,
        nonce: &CcmNonce,
        aad: &[u8],
        buf: &mut [u8],
    ) -> Result<Mic, CryptoError> {
        let tag = self
            .mic_cipher
            .encrypt_in_place_detached(GenericArray::from_slice(nonce.as_bytes()), aad, buf)
            .map_err(|_| CryptoError::InternalError)?;
        let mut mic = [0u8; MIC_LEN];
        mic.copy_from_slice(&tag);
        Ok(Mic::new(mic))
    }

    /// Verify `mic` and decrypt `buf` in place
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::AuthenticationFailed` if the MIC does not
    /// verify; `buf` contents are unspecified in that case.
    pub fn decrypt_in_place(
        &self,
        nonce: &CcmNonce,
        aad: &[u8],
        buf: &mut [u8],
        mic: &[u8],
    ) -> Result<(), CryptoError> {
        if mic.len() != MIC_LEN {
            return Err(CryptoError::AuthenticationFailed);
        }
        self.mic_cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(nonce.as_bytes()),
                aad,
                buf,
                GenericArray::from_slice(mic),
            )
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    /// Compute a MIC over `data` without encrypting anything
    ///
    /// Used for broadcast authentication where the payload stays in the
    /// clear and only integrity is needed.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InternalError` on cipher failure.
    pub fn tag(&self, nonce: &CcmNonce, data: &[u8]) -> Result<Mic, CryptoError> {
        let mut empty: [u8; 0] = [];
        let tag = self
            .mic_cipher
            .encrypt_in_place_detached(GenericArray::from_slice(nonce.as_bytes()), data, &mut empty)
            .map_err(|_| CryptoError::InternalError)?;
        let mut mic = [0u8; MIC_LEN];
        mic.copy_from_slice(&tag);
        Ok(Mic::new(mic))
    }

    /// Compute a one-time password over `data`
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InternalError` on cipher failure.
    pub fn otp(&self, nonce: &CcmNonce, data: &[u8]) -> Result<Otp, CryptoError> {
        let mut empty: [u8; 0] = [];
        let tag = self
            .otp_cipher
            .encrypt_in_place_detached(GenericArray::from_slice(nonce.as_bytes()), data, &mut empty)
            .map_err(|_| CryptoError::InternalError)?;
        let mut otp = [0u8; OTP_LEN];
        otp.copy_from_slice(&tag);
        Ok(Otp::new(otp))
    }
}
