// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Frame security strategies
//!
//! Unicasts are always protected the same way: a 4-byte frame counter and
//! an 8-byte CCM* MIC under the receiver's pairwise key. Broadcasts differ,
//! because a broadcast has no single pairwise key:
//!
//! - [`UnicastStrategy`] appends one MIC per permanent neighbor to HELLO
//!   broadcasts, positioned by the receiver's local index at the sender,
//!   and turns all other broadcasts into a series of unicasts tracked by a
//!   neighbor bitmap.
//! - [`CoresecStrategy`] announces the per-receiver MICs in a separate
//!   ANNOUNCE command ahead of each broadcast; receivers buffer their MIC
//!   and match the following broadcast against it.
//!
//! Appended security data is `counter (4, big-endian) | MIC list`, where
//! the MIC covers everything before the list. MIC lists grow with the
//! highest occupied slot index, so both strategies check the frame capacity
//! explicitly and fail with `BufferTooSmall` instead of truncating.

use heapless::Vec;

use akes_common::constants::{CMD_ANNOUNCE, MAX_FRAME_LEN, MAX_NEIGHBORS, MIC_LEN};
use akes_common::types::LinkAddr;
use akes_common::{Error, Result};
use akes_crypto::{Aes128Key, CcmStar};

use crate::frame::{make_nonce, NONCE_FLAG_BROADCAST, NONCE_FLAG_UNICAST};
use crate::nbr::{NeighborTable, PermanentNeighbor};

/// Length of the appended frame counter
pub const COUNTER_LEN: usize = 4;

/// MICs a coresec receiver buffers between ANNOUNCE and broadcast
pub const MAX_BUFFERED_MICS: usize = 5;

/// Outcome of verifying a secured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyResult {
    /// Authentic and fresh
    Success,
    /// MIC did not verify
    Inauthentic,
    /// Authentic but the frame counter went backwards
    Replayed,
}

/// A broadcast security strategy
pub trait SecurityStrategy {
    /// Append security data to an outgoing HELLO broadcast
    ///
    /// # Errors
    ///
    /// `Error::BufferTooSmall` if counter and MIC list do not fit.
    fn secure_hello(
        &self,
        own_addr: &LinkAddr,
        counter: u32,
        table: &NeighborTable,
        frame: &mut Vec<u8, MAX_FRAME_LEN>,
    ) -> Result<()>;

    /// Verify a HELLO broadcast from a permanent neighbor
    ///
    /// Updates the sender's anti-replay state on success.
    fn verify_hello(&self, sender: &mut PermanentNeighbor, payload: &[u8]) -> VerifyResult;

    /// Build the ANNOUNCE preceding a broadcast, if this strategy uses one
    ///
    /// `broadcast_payload` is the frame before security data; the default
    /// strategy announces nothing.
    ///
    /// # Errors
    ///
    /// `Error::BufferTooSmall` if the MIC list exceeds the frame; the
    /// broadcast must not be sent in that case.
    fn prepare_announce(
        &self,
        _own_addr: &LinkAddr,
        _counter: u32,
        _table: &NeighborTable,
        _broadcast_payload: &[u8],
    ) -> Result<Option<Vec<u8, MAX_FRAME_LEN>>> {
        Ok(None)
    }

    /// Consume an ANNOUNCE from a permanent neighbor
    ///
    /// `foreign_index` is our index at the sender.
    ///
    /// # Errors
    ///
    /// `Error::MalformedCommand` if our MIC position lies outside the
    /// frame.
    fn handle_announce(&mut self, _payload: &[u8], _foreign_index: u8) -> Result<()> {
        Ok(())
    }
}

/// Append counter and MIC to a unicast frame
///
/// # Errors
///
/// `Error::BufferTooSmall` if the overhead does not fit.
pub fn secure_unicast(
    own_addr: &LinkAddr,
    counter: u32,
    key: &Aes128Key,
    frame: &mut Vec<u8, MAX_FRAME_LEN>,
) -> Result<()> {
    frame
        .extend_from_slice(&counter.to_be_bytes())
        .map_err(|()| Error::BufferTooSmall)?;
    let nonce = make_nonce(own_addr, counter, NONCE_FLAG_UNICAST);
    let mic = CcmStar::new(key).tag(&nonce, frame.as_slice())?;
    frame
        .extend_from_slice(mic.as_bytes())
        .map_err(|()| Error::BufferTooSmall)
}

/// Verify a unicast frame from a permanent neighbor
///
/// On success returns the length of the payload without the appended
/// security data and records the frame counter.
pub fn verify_unicast(sender: &mut PermanentNeighbor, payload: &[u8]) -> (VerifyResult, usize) {
    let overhead = COUNTER_LEN + MIC_LEN;
    let Some(base_len) = payload.len().checked_sub(overhead) else {
        return (VerifyResult::Inauthentic, 0);
    };
    let counter = read_counter(&payload[base_len..]);
    let nonce = make_nonce(&sender.addr, counter, NONCE_FLAG_UNICAST);
    let mic = match CcmStar::new(&sender.pairwise_key)
        .tag(&nonce, &payload[..base_len + COUNTER_LEN])
    {
        Ok(mic) => mic,
        Err(_) => return (VerifyResult::Inauthentic, 0),
    };
    if !mic.verify(&payload[base_len + COUNTER_LEN..]) {
        return (VerifyResult::Inauthentic, 0);
    }
    if sender
        .last_unicast_counter
        .is_some_and(|last| counter <= last)
    {
        return (VerifyResult::Replayed, base_len);
    }
    sender.last_unicast_counter = Some(counter);
    (VerifyResult::Success, base_len)
}

fn read_counter(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn hello_mic_list(
    own_addr: &LinkAddr,
    counter: u32,
    table: &NeighborTable,
    base: &[u8],
) -> Result<([u8; MAX_NEIGHBORS * MIC_LEN], usize)> {
    let mut mics = [0u8; MAX_NEIGHBORS * MIC_LEN];
    let Some(max_index) = table.max_permanent_index() else {
        return Ok((mics, 0));
    };
    let nonce = make_nonce(own_addr, counter, NONCE_FLAG_BROADCAST);
    for (index, nbr) in table.iter_permanent() {
        let mic = CcmStar::new(&nbr.pairwise_key).tag(&nonce, base)?;
        let offset = usize::from(index) * MIC_LEN;
        mics[offset..offset + MIC_LEN].copy_from_slice(mic.as_bytes());
    }
    Ok((mics, (usize::from(max_index) + 1) * MIC_LEN))
}

fn check_hello_replay(sender: &mut PermanentNeighbor, counter: u32) -> VerifyResult {
    if sender
        .last_broadcast_counter
        .is_some_and(|last| counter <= last)
    {
        return VerifyResult::Replayed;
    }
    sender.last_broadcast_counter = Some(counter);
    VerifyResult::Success
}

// =============================================================================
// Unicast strategy
// =============================================================================

/// Per-receiver MICs on HELLOs, serial unicasts for other broadcasts
#[derive(Debug, Default)]
pub struct UnicastStrategy;

impl SecurityStrategy for UnicastStrategy {
    fn secure_hello(
        &self,
        own_addr: &LinkAddr,
        counter: u32,
        table: &NeighborTable,
        frame: &mut Vec<u8, MAX_FRAME_LEN>,
    ) -> Result<()> {
        frame
            .extend_from_slice(&counter.to_be_bytes())
            .map_err(|()| Error::BufferTooSmall)?;
        let (mics, len) = hello_mic_list(own_addr, counter, table, frame.as_slice())?;
        frame
            .extend_from_slice(&mics[..len])
            .map_err(|()| Error::BufferTooSmall)
    }

    fn verify_hello(&self, sender: &mut PermanentNeighbor, payload: &[u8]) -> VerifyResult {
        let base_len = crate::frame::HelloFrame::LEN;
        if payload.len() < base_len + COUNTER_LEN {
            return VerifyResult::Inauthentic;
        }
        let counter = read_counter(&payload[base_len..]);
        let mic_offset =
            base_len + COUNTER_LEN + usize::from(sender.foreign_index) * MIC_LEN;
        if mic_offset + MIC_LEN > payload.len() {
            return VerifyResult::Inauthentic;
        }
        let nonce = make_nonce(&sender.addr, counter, NONCE_FLAG_BROADCAST);
        let mic = match CcmStar::new(&sender.pairwise_key)
            .tag(&nonce, &payload[..base_len + COUNTER_LEN])
        {
            Ok(mic) => mic,
            Err(_) => return VerifyResult::Inauthentic,
        };
        if !mic.verify(&payload[mic_offset..mic_offset + MIC_LEN]) {
            return VerifyResult::Inauthentic;
        }
        check_hello_replay(sender, counter)
    }
}

/// Progress of one broadcast sent as serial unicasts
///
/// Each permanent neighbor gets a private, pairwise-secured copy. The
/// bitmap records which slot indexes were already served, so a `Deferred`
/// or failed transmission can resume without duplicates.
#[derive(Debug, Clone)]
pub struct OngoingBroadcast {
    served: u16,
}

impl OngoingBroadcast {
    /// Start tracking a fresh broadcast
    #[must_use]
    pub const fn new() -> Self {
        Self { served: 0 }
    }

    /// Next neighbor still owed a copy
    #[must_use]
    pub fn next_target(&self, table: &NeighborTable) -> Option<(u8, LinkAddr)> {
        table
            .iter_permanent()
            .find(|(index, _)| self.served & (1u16 << index) == 0)
            .map(|(index, nbr)| (index, nbr.addr))
    }

    /// Mark a neighbor as served
    pub fn mark_served(&mut self, index: u8) {
        self.served |= 1u16 << index;
    }

    /// Whether every permanent neighbor was served
    #[must_use]
    pub fn is_complete(&self, table: &NeighborTable) -> bool {
        self.next_target(table).is_none()
    }
}

impl Default for OngoingBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Coresec strategy
// =============================================================================

/// EBEAP: per-receiver MICs travel in an ANNOUNCE ahead of the broadcast
///
/// The sender computes the MIC each permanent neighbor would expect for the
/// upcoming broadcast and packs them into an ANNOUNCE command, positioned
/// by local index. A receiver stores the MIC at its foreign index and
/// accepts the following broadcast if its recomputed MIC matches a stored
/// one. A small ring buffer tolerates reordered and duplicated ANNOUNCEs.
pub struct CoresecStrategy {
    mics: [[u8; MIC_LEN]; MAX_BUFFERED_MICS],
    next_mic: usize,
}

impl CoresecStrategy {
    /// ANNOUNCE header: identifier plus one reserved byte
    pub const ANNOUNCE_HDR_LEN: usize = 2;

    /// Create the strategy with an empty MIC buffer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mics: [[0u8; MIC_LEN]; MAX_BUFFERED_MICS],
            next_mic: 0,
        }
    }

    fn is_mic_stored(&self, mic: &[u8]) -> bool {
        self.mics.iter().any(|stored| stored.as_slice() == mic)
    }
}

impl Default for CoresecStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityStrategy for CoresecStrategy {
    fn secure_hello(
        &self,
        _own_addr: &LinkAddr,
        counter: u32,
        _table: &NeighborTable,
        frame: &mut Vec<u8, MAX_FRAME_LEN>,
    ) -> Result<()> {
        // MICs travel in the preceding ANNOUNCE; the broadcast itself only
        // carries its counter
        frame
            .extend_from_slice(&counter.to_be_bytes())
            .map_err(|()| Error::BufferTooSmall)
    }

    fn verify_hello(&self, sender: &mut PermanentNeighbor, payload: &[u8]) -> VerifyResult {
        let Some(base_len) = payload.len().checked_sub(COUNTER_LEN) else {
            return VerifyResult::Inauthentic;
        };
        let counter = read_counter(&payload[base_len..]);
        let nonce = make_nonce(&sender.addr, counter, NONCE_FLAG_BROADCAST);
        let mic = match CcmStar::new(&sender.pairwise_key).tag(&nonce, payload) {
            Ok(mic) => mic,
            Err(_) => return VerifyResult::Inauthentic,
        };
        if !self.is_mic_stored(mic.as_bytes()) {
            return VerifyResult::Inauthentic;
        }
        check_hello_replay(sender, counter)
    }

    fn prepare_announce(
        &self,
        own_addr: &LinkAddr,
        counter: u32,
        table: &NeighborTable,
        broadcast_payload: &[u8],
    ) -> Result<Option<Vec<u8, MAX_FRAME_LEN>>> {
        let mut base: Vec<u8, MAX_FRAME_LEN> = Vec::new();
        base.extend_from_slice(broadcast_payload)
            .map_err(|()| Error::BufferTooSmall)?;
        base.extend_from_slice(&counter.to_be_bytes())
            .map_err(|()| Error::BufferTooSmall)?;
        let (mics, len) = hello_mic_list(own_addr, counter, table, base.as_slice())?;

        if Self::ANNOUNCE_HDR_LEN + len > MAX_FRAME_LEN {
            return Err(Error::BufferTooSmall);
        }
        let mut announce: Vec<u8, MAX_FRAME_LEN> = Vec::new();
        announce
            .extend_from_slice(&[CMD_ANNOUNCE, 0])
            .map_err(|()| Error::BufferTooSmall)?;
        announce
            .extend_from_slice(&mics[..len])
            .map_err(|()| Error::BufferTooSmall)?;
        Ok(Some(announce))
    }

    fn handle_announce(&mut self, payload: &[u8], foreign_index: u8) -> Result<()> {
        let offset = Self::ANNOUNCE_HDR_LEN + usize::from(foreign_index) * MIC_LEN;
        let mic = payload
            .get(offset..offset + MIC_LEN)
            .ok_or(Error::MalformedCommand)?;
        if self.is_mic_stored(mic) {
            // Duplicated ANNOUNCE
            return Ok(());
        }
        self.mics[self.next_mic].copy_from_slice(mic);
        self.next_mic = (self.next_mic + 1) % MAX_BUFFERED_MICS;
        Ok(())
    }
}
