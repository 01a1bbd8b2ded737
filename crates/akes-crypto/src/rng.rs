// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Random number generation
//!
//! A CTR-DRBG in the style of NIST SP 800-90A, built on AES-128 since that
//! cipher is already on every node for the KDF and CCM*. The platform seeds
//! it once from its TRNG and reseeds when `ReseedRequired` comes back.
//!
//! # Security Features
//!
//! - Automatic cutoff after a fixed output limit
//! - Key/counter state zeroized on drop
//! - No panics; all failures surface as `CryptoError`

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::traits::CryptoRng;

/// Blocks generated between mandatory reseeds (2^20, well under the
/// SP 800-90A ceiling)
pub const CTR_DRBG_RESEED_INTERVAL: u64 = 1 << 20;

/// AES-128 CTR-DRBG
pub struct CtrDrbg {
    cipher: Aes128,
    key: [u8; 16],
    counter: u128,
    blocks_generated: u64,
}

impl CtrDrbg {
    /// Instantiate from a 16-byte entropy seed and a personalization nonce
    ///
    /// The nonce separates instances sharing one entropy source (for
    /// example the handshake RNG and the CSL wake-up jitter RNG).
    #[must_use]
    pub fn new(seed: &[u8; 16], nonce: u64) -> Self {
        let mut key = *seed;
        // Fold the nonce into the key so equal seeds with different
        // personalization diverge immediately.
        for (i, byte) in nonce.to_le_bytes().iter().enumerate() {
            key[i] ^= byte;
        }
        let cipher = Aes128::new(GenericArray::from_slice(&key));
        Self {
            cipher,
            key,
            counter: u128::from(nonce) << 64,
            blocks_generated: 0,
        }
    }

    /// Reseed with fresh entropy, resetting the output budget
    pub fn reseed(&mut self, seed: &[u8; 16]) {
        for (k, s) in self.key.iter_mut().zip(seed.iter()) {
            *k ^= s;
        }
        self.cipher = Aes128::new(GenericArray::from_slice(&self.key));
        self.blocks_generated = 0;
    }

    fn next_block(&mut self) -> Result<[u8; 16], CryptoError> {
        if self.blocks_generated >= CTR_DRBG_RESEED_INTERVAL {
            return Err(CryptoError::ReseedRequired);
        }
        self.counter = self.counter.wrapping_add(1);
        let mut block = GenericArray::clone_from_slice(&self.counter.to_be_bytes());
        self.cipher.encrypt_block(&mut block);
        self.blocks_generated += 1;
        let mut out = [0u8; 16];
        out.copy_from_slice(&block);
        Ok(out)
    }
}

impl CryptoRng for CtrDrbg {
    fn fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), CryptoError> {
        for chunk in dest.chunks_mut(16) {
            let mut block = self.next_block()?;
            chunk.copy_from_slice(&block[..chunk.len()]);
            block.zeroize();
        }
        Ok(())
    }
}

impl Drop for CtrDrbg {
    fn drop(&mut self) {
        self.key.zeroize();
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_for_equal_seeds() {
        let mut a = CtrDrbg::new(&[1u8; 16], 42);
        let mut b = CtrDrbg::new(&[1u8; 16], 42);
        let mut out_a = [0u8; 48];
        let mut out_b = [0u8; 48];
        a.fill_bytes(&mut out_a).unwrap();
        b.fill_bytes(&mut out_b).unwrap();
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_nonce_separates_instances() {
        let mut a = CtrDrbg::new(&[1u8; 16], 1);
        let mut b = CtrDrbg::new(&[1u8; 16], 2);
        let mut out_a = [0u8; 32];
        let mut out_b = [0u8; 32];
        a.fill_bytes(&mut out_a).unwrap();
        b.fill_bytes(&mut out_b).unwrap();
        assert_ne!(out_a, out_b);
    }

    #[test]
    fn test_output_advances() {
        let mut rng = CtrDrbg::new(&[3u8; 16], 0);
        let mut first = [0u8; 16];
        let mut second = [0u8; 16];
        rng.fill_bytes(&mut first).unwrap();
        rng.fill_bytes(&mut second).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_reseed_resets_budget() {
        let mut rng = CtrDrbg::new(&[9u8; 16], 0);
        rng.blocks_generated = CTR_DRBG_RESEED_INTERVAL;
        let mut buf = [0u8; 4];
        assert_eq!(rng.fill_bytes(&mut buf), Err(CryptoError::ReseedRequired));
        rng.reseed(&[4u8; 16]);
        assert!(rng.fill_bytes(&mut buf).is_ok());
    }
}
