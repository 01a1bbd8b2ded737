// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Nightjar AKES Cryptographic Layer
//!
//! The symmetric-key foundation of the AKES link-layer stack:
//!
//! - **KDF**: pairwise session keys from one AES-128 block encryption over
//!   the two handshake challenges
//! - **AEAD**: AES-128 CCM* with 13-byte nonces; 8-byte MICs for frames,
//!   4-byte tags for POTR one-time passwords
//! - **RNG**: a `CryptoRng` trait plus an AES-128 CTR-DRBG
//!
//! # Security Requirements
//!
//! All cryptographic operations in this crate:
//! - Compare secrets in constant time (no secret-dependent branching)
//! - Zeroize sensitive data after use
//! - Never log or expose key material

#![no_std]
#![allow(unsafe_code)] // Required for volatile zeroization
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

// Core cryptographic modules
pub mod error;
pub mod traits;
pub mod zeroize_utils;

// Random number generation
pub mod rng;

// Key derivation
pub mod kdf;

// CCM* AEAD
pub mod aead;

// Re-export main traits and types
pub use aead::{Aes128Key, CcmNonce, CcmStar, Mic, Otp};
pub use error::CryptoError;
pub use kdf::{derive_pairwise_key, generate_challenge};
pub use rng::CtrDrbg;
pub use traits::{constant_time_eq, CryptoRng};
