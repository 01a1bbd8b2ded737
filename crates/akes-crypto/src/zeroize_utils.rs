// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Secure memory utilities
//!
//! Helpers for wiping key material. Neighbor slots hold pairwise and group
//! keys inline, so deletion and tentative-to-permanent promotion must be
//! able to wipe arbitrary byte regions, not only owned types.

use core::ptr;
use core::sync::atomic::{compiler_fence, Ordering};

/// Securely zero memory, preventing compiler optimization
///
/// Uses volatile writes so the zeroing survives dead-store elimination.
#[inline(never)]
pub fn secure_zero(data: &mut [u8]) {
    for byte in data.iter_mut() {
        // SAFETY: writing to valid memory we hold a mutable borrow of
        unsafe {
            ptr::write_volatile(byte, 0);
        }
    }

    compiler_fence(Ordering::SeqCst);
}

/// Check if all bytes are zero in constant time
#[must_use]
pub fn is_zero(data: &[u8]) -> bool {
    let mut acc: u8 = 0;
    for &byte in data {
        acc |= byte;
    }
    acc == 0
}
