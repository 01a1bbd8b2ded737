// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Pairwise key derivation
//!
//! A session key is one AES-128 block encryption: the predistributed secret
//! keys the cipher and the block is the initiator's challenge followed by
//! the responder's challenge. Both sides hold the same secret and the same
//! two challenges, so both derive bit-identical keys without ever sending
//! key material.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use zeroize::Zeroize;

use akes_common::types::Challenge;

use crate::aead::Aes128Key;
use crate::error::CryptoError;
use crate::traits::CryptoRng;

/// Derive the pairwise session key for a handshake
///
/// The challenge order is normative: the HELLO sender's challenge fills the
/// first half of the block, the HELLOACK sender's the second. Swapping them
/// yields a different key.
#[must_use]
pub fn derive_pairwise_key(
    secret: &Aes128Key,
    hello_challenge: &Challenge,
    helloack_challenge: &Challenge,
) -> Aes128Key {
    let cipher = Aes128::new(GenericArray::from_slice(secret.as_ref()));

    let mut block = [0u8; 16];
    block[..Challenge::SIZE].copy_from_slice(hello_challenge.as_bytes());
    block[Challenge::SIZE..].copy_from_slice(helloack_challenge.as_bytes());

    let mut ga = GenericArray::clone_from_slice(&block);
    cipher.encrypt_block(&mut ga);

    let mut key = [0u8; 16];
    key.copy_from_slice(&ga);
    block.zeroize();
    ga.zeroize();
    Aes128Key::new(key)
}

/// Draw a fresh 8-byte challenge
///
/// # Errors
///
/// Returns `CryptoError::RngFailure` if the RNG fails.
pub fn generate_challenge<R: CryptoRng>(rng: &mut R) -> Result<Challenge, CryptoError> {
    let mut bytes = [0u8; Challenge::SIZE];
    rng.fill_bytes(&mut bytes)?;
    Ok(Challenge::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::CtrDrbg;

    #[test]
    fn test_both_sides_derive_identical_keys() {
        let secret = Aes128Key::new([0x11; 16]);
        let ca = Challenge::new([1, 2, 3, 4, 5, 6, 7, 8]);
        let cb = Challenge::new([9, 10, 11, 12, 13, 14, 15, 16]);

        let initiator = derive_pairwise_key(&secret, &ca, &cb);
        let responder = derive_pairwise_key(&secret, &ca, &cb);
        assert!(initiator.ct_eq(&responder));
    }

    #[test]
    fn test_challenge_order_matters() {
        let secret = Aes128Key::new([0x11; 16]);
        let ca = Challenge::new([1; 8]);
        let cb = Challenge::new([2; 8]);
        let forward = derive_pairwise_key(&secret, &ca, &cb);
        let reversed = derive_pairwise_key(&secret, &cb, &ca);
        assert!(!forward.ct_eq(&reversed));
    }

    #[test]
    fn test_secret_matters() {
        let ca = Challenge::new([1; 8]);
        let cb = Challenge::new([2; 8]);
        let k1 = derive_pairwise_key(&Aes128Key::new([0xAA; 16]), &ca, &cb);
        let k2 = derive_pairwise_key(&Aes128Key::new([0xAB; 16]), &ca, &cb);
        assert!(!k1.ct_eq(&k2));
    }

    #[test]
    fn test_generated_challenges_differ() {
        let mut rng = CtrDrbg::new(&[5u8; 16], 0);
        let a = generate_challenge(&mut rng).unwrap();
        let b = generate_challenge(&mut rng).unwrap();
        assert_ne!(a, b);
    }
}
