// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Predistributed key schemes
//!
//! How two nodes that never met obtain a shared secret is deployment
//! policy, not protocol: a network-wide master key, per-pair keys from a
//! commissioning tool, or something fancier. The handshake only needs one
//! lookup, so the seam is a single-method trait.

use akes_common::types::LinkAddr;
use akes_crypto::Aes128Key;

/// Source of predistributed secrets
pub trait Scheme {
    /// The secret shared with `addr`, or `None` if the peer is unknown
    /// to this deployment and no handshake with it may succeed
    fn predistributed_secret(&self, addr: &LinkAddr) -> Option<Aes128Key>;
}

/// The simplest scheme: one network-wide master key
///
/// Every node shares the same secret; compromise of one node compromises
/// the network's handshakes. Adequate for closed deployments where nodes
/// are physically protected, and the scheme the defaults assume.
pub struct SingleKeyScheme {
    secret: Aes128Key,
}

impl SingleKeyScheme {
    /// Create the scheme from the network master key
    #[must_use]
    pub const fn new(secret: Aes128Key) -> Self {
        Self { secret }
    }
}

impl Scheme for SingleKeyScheme {
    fn predistributed_secret(&self, _addr: &LinkAddr) -> Option<Aes128Key> {
        Some(self.secret.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_key_answers_any_addr() {
        let scheme = SingleKeyScheme::new(Aes128Key::new([0x42; 16]));
        let a = scheme
            .predistributed_secret(&LinkAddr::new([1; 8]))
            .unwrap();
        let b = scheme
            .predistributed_secret(&LinkAddr::new([2; 8]))
            .unwrap();
        assert!(a.ct_eq(&b));
    }
}
