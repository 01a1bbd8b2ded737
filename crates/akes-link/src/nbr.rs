// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Neighbor table
//!
//! A fixed arena of [`MAX_NEIGHBORS`] slots. A slot's position in the arena
//! is the neighbor's local index and goes on the wire: HELLOACK and ACK
//! frames carry it, and POTR wake-up frames address receivers by it. Slots
//! are reused after deletion, so an index by itself never authenticates
//! anything; the keys stored behind it do.
//!
//! A neighbor is **tentative** while a handshake is in flight and
//! **permanent** once the three-way exchange has completed. Promotion
//! happens in place, keeping the slot index the HELLOACK advertised. The
//! same address may briefly own one tentative and one permanent slot when a
//! rebooted permanent neighbor renegotiates.
//!
//! Key material lives inline in the slots; `Aes128Key` zeroizes on drop, so
//! deleting a neighbor wipes its keys.

use akes_common::constants::{MAX_NEIGHBORS, MAX_TENTATIVES};
use akes_common::time::{Deadline, Ticks};
use akes_common::types::{Challenge, LinkAddr};
use akes_common::{Error, Result};
use akes_crypto::Aes128Key;

/// Cached sequence number of the last accepted frame from a neighbor
#[derive(Debug, Clone, Copy)]
pub struct SeqnoCache {
    /// The sequence number itself
    pub seqno: u8,
    /// When it was received
    pub received_at: Ticks,
}

/// A neighbor amid the three-way handshake
#[derive(Debug)]
pub struct TentativeNeighbor {
    /// Link-layer address of the peer
    pub addr: LinkAddr,
    /// The challenge the peer's HELLO carried
    pub hello_challenge: Challenge,
    /// Tentative pairwise key, derived when the HELLOACK is prepared
    pub pairwise_key: Option<Aes128Key>,
    /// Hard deadline after which the slot is reclaimed
    pub expiration: Deadline,
    /// Randomized point at which our HELLOACK is due
    pub helloack_deadline: Option<Deadline>,
    /// Set once our HELLOACK has been handed to the radio
    pub was_helloack_sent: bool,
}

/// An established neighbor
#[derive(Debug)]
pub struct PermanentNeighbor {
    /// Link-layer address of the peer
    pub addr: LinkAddr,
    /// Pairwise session key
    pub pairwise_key: Aes128Key,
    /// The peer's broadcast group key
    pub group_key: Aes128Key,
    /// Our index in the peer's neighbor table
    pub foreign_index: u8,
    /// Last instant an authentic frame arrived from the peer
    pub prolongation_time: Ticks,
    /// Anti-replay: highest accepted broadcast frame counter
    pub last_broadcast_counter: Option<u32>,
    /// Anti-replay: highest accepted unicast frame counter
    pub last_unicast_counter: Option<u32>,
    /// Sequence number cache for duplicate detection
    pub seqno_cache: Option<SeqnoCache>,
    /// Whether this peer's HELLO was already counted by Trickle
    pub sent_authentic_hello: bool,
    /// An UPDATE probing this neighbor is in flight
    pub is_receiving_update: bool,
}

impl PermanentNeighbor {
    /// Record an authentic frame, postponing expiration
    pub fn prolong(&mut self, now: Ticks) {
        self.prolongation_time = now;
    }

    /// Whether the neighbor's lifetime has run out
    #[must_use]
    pub fn is_expired(&self, now: Ticks, lifetime_ticks: u64) -> bool {
        self.prolongation_time.has_elapsed(now, lifetime_ticks)
    }

    /// Whether `seqno` repeats the last accepted frame within the cache
    /// lifetime
    #[must_use]
    pub fn is_duplicate_seqno(&self, seqno: u8, now: Ticks, lifetime_ticks: u64) -> bool {
        self.seqno_cache
            .is_some_and(|c| c.seqno == seqno && !c.received_at.has_elapsed(now, lifetime_ticks))
    }

    /// Remember the sequence number of an accepted frame
    pub fn record_seqno(&mut self, seqno: u8, now: Ticks) {
        self.seqno_cache = Some(SeqnoCache {
            seqno,
            received_at: now,
        });
    }
}

/// One arena slot
#[derive(Debug)]
pub enum Neighbor {
    /// Handshake in flight
    Tentative(TentativeNeighbor),
    /// Handshake completed
    Permanent(PermanentNeighbor),
}

impl Neighbor {
    /// The peer's link-layer address
    #[must_use]
    pub fn addr(&self) -> &LinkAddr {
        match self {
            Self::Tentative(t) => &t.addr,
            Self::Permanent(p) => &p.addr,
        }
    }
}

/// The neighbor arena
pub struct NeighborTable {
    slots: [Option<Neighbor>; MAX_NEIGHBORS],
}

impl NeighborTable {
    const NONE: Option<Neighbor> = None;

    /// Create an empty table
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [Self::NONE; MAX_NEIGHBORS],
        }
    }

    /// Number of permanent neighbors
    #[must_use]
    pub fn permanent_count(&self) -> usize {
        self.iter_permanent().count()
    }

    /// Number of tentative neighbors
    #[must_use]
    pub fn tentative_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Some(Neighbor::Tentative(_))))
            .count()
    }

    /// Whether a free slot exists
    #[must_use]
    pub fn has_space(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Add a tentative neighbor, returning its slot index
    ///
    /// # Errors
    ///
    /// `Error::TentativeLimitReached` once [`MAX_TENTATIVES`] handshakes are
    /// in flight, `Error::NeighborTableFull` when no slot is free.
    pub fn add_tentative(&mut self, tentative: TentativeNeighbor) -> Result<u8> {
        if self.tentative_count() >= MAX_TENTATIVES {
            return Err(Error::TentativeLimitReached);
        }
        let index = self.free_slot().ok_or(Error::NeighborTableFull)?;
        self.slots[index] = Some(Neighbor::Tentative(tentative));
        Ok(index as u8)
    }

    /// Add a permanent neighbor, returning its slot index
    ///
    /// # Errors
    ///
    /// `Error::NeighborTableFull` when no slot is free.
    pub fn add_permanent(&mut self, permanent: PermanentNeighbor) -> Result<u8> {
        let index = self.free_slot().ok_or(Error::NeighborTableFull)?;
        self.slots[index] = Some(Neighbor::Permanent(permanent));
        Ok(index as u8)
    }

    /// Promote a tentative slot to permanent in place
    ///
    /// The slot index the HELLOACK advertised stays valid. The peer's group
    /// key and our index at the peer come from the ACK frame.
    ///
    /// # Errors
    ///
    /// `Error::NoSuchNeighbor` if the slot holds no tentative neighbor,
    /// `Error::HandshakeInProgress` if no key was derived yet (the HELLOACK
    /// never went out).
    pub fn promote(
        &mut self,
        index: u8,
        group_key: Aes128Key,
        foreign_index: u8,
        now: Ticks,
    ) -> Result<&mut PermanentNeighbor> {
        let slot = self
            .slots
            .get_mut(index as usize)
            .ok_or(Error::IndexOutOfRange)?;
        match slot.as_ref() {
            None | Some(Neighbor::Permanent(_)) => return Err(Error::NoSuchNeighbor),
            Some(Neighbor::Tentative(t)) if t.pairwise_key.is_none() => {
                return Err(Error::HandshakeInProgress)
            }
            Some(Neighbor::Tentative(_)) => {}
        }
        let Some(Neighbor::Tentative(t)) = slot.take() else {
            unreachable!()
        };
        let Some(pairwise_key) = t.pairwise_key else {
            unreachable!()
        };
        *slot = Some(Neighbor::Permanent(PermanentNeighbor {
            addr: t.addr,
            pairwise_key,
            group_key,
            foreign_index,
            prolongation_time: now,
            last_broadcast_counter: None,
            last_unicast_counter: None,
            seqno_cache: None,
            sent_authentic_hello: false,
            is_receiving_update: false,
        }));
        match slot.as_mut() {
            Some(Neighbor::Permanent(p)) => Ok(p),
            _ => unreachable!(),
        }
    }

    /// Delete the neighbor at `index`; keys are zeroized on drop
    ///
    /// # Errors
    ///
    /// `Error::NoSuchNeighbor` if the slot is already empty.
    pub fn delete(&mut self, index: u8) -> Result<()> {
        let slot = self
            .slots
            .get_mut(index as usize)
            .ok_or(Error::IndexOutOfRange)?;
        if slot.take().is_none() {
            return Err(Error::NoSuchNeighbor);
        }
        Ok(())
    }

    /// Look up a slot by index
    #[must_use]
    pub fn get(&self, index: u8) -> Option<&Neighbor> {
        self.slots.get(index as usize)?.as_ref()
    }

    /// The permanent neighbor at `index`, if any
    #[must_use]
    pub fn permanent(&self, index: u8) -> Option<&PermanentNeighbor> {
        match self.get(index) {
            Some(Neighbor::Permanent(p)) => Some(p),
            _ => None,
        }
    }

    /// Mutable access to the permanent neighbor at `index`
    pub fn permanent_mut(&mut self, index: u8) -> Option<&mut PermanentNeighbor> {
        match self.slots.get_mut(index as usize)?.as_mut() {
            Some(Neighbor::Permanent(p)) => Some(p),
            _ => None,
        }
    }

    /// Find the permanent slot of an address
    #[must_use]
    pub fn find_permanent(&self, addr: &LinkAddr) -> Option<(u8, &PermanentNeighbor)> {
        self.iter_permanent().find(|(_, p)| p.addr == *addr)
    }

    /// Find the permanent slot of an address, mutably
    pub fn find_permanent_mut(&mut self, addr: &LinkAddr) -> Option<(u8, &mut PermanentNeighbor)> {
        self.slots
            .iter_mut()
            .enumerate()
            .find_map(|(i, s)| match s.as_mut() {
                Some(Neighbor::Permanent(p)) if p.addr == *addr => Some((i as u8, p)),
                _ => None,
            })
    }

    /// Find the tentative slot of an address
    #[must_use]
    pub fn find_tentative(&self, addr: &LinkAddr) -> Option<(u8, &TentativeNeighbor)> {
        self.slots
            .iter()
            .enumerate()
            .find_map(|(i, s)| match s.as_ref() {
                Some(Neighbor::Tentative(t)) if t.addr == *addr => Some((i as u8, t)),
                _ => None,
            })
    }

    /// Find the tentative slot of an address, mutably
    pub fn find_tentative_mut(&mut self, addr: &LinkAddr) -> Option<(u8, &mut TentativeNeighbor)> {
        self.slots
            .iter_mut()
            .enumerate()
            .find_map(|(i, s)| match s.as_mut() {
                Some(Neighbor::Tentative(t)) if t.addr == *addr => Some((i as u8, t)),
                _ => None,
            })
    }

    /// Iterate over permanent neighbors with their indexes
    pub fn iter_permanent(&self) -> impl Iterator<Item = (u8, &PermanentNeighbor)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s.as_ref() {
                Some(Neighbor::Permanent(p)) => Some((i as u8, p)),
                _ => None,
            })
    }

    /// Iterate over permanent neighbors with their indexes, mutably
    pub fn iter_permanent_mut(&mut self) -> impl Iterator<Item = (u8, &mut PermanentNeighbor)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| match s.as_mut() {
                Some(Neighbor::Permanent(p)) => Some((i as u8, p)),
                _ => None,
            })
    }

    /// Iterate over tentative neighbors with their indexes, mutably
    pub fn iter_tentative_mut(&mut self) -> impl Iterator<Item = (u8, &mut TentativeNeighbor)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| match s.as_mut() {
                Some(Neighbor::Tentative(t)) => Some((i as u8, t)),
                _ => None,
            })
    }

    /// Highest occupied permanent index, if any
    #[must_use]
    pub fn max_permanent_index(&self) -> Option<u8> {
        self.iter_permanent().map(|(i, _)| i).max()
    }

    /// Drop tentative slots whose waiting period ran out
    ///
    /// Returns the number of reclaimed slots.
    pub fn delete_expired_tentatives(&mut self, now: Ticks) -> usize {
        let mut deleted = 0;
        for slot in &mut self.slots {
            if let Some(Neighbor::Tentative(t)) = slot.as_ref() {
                if t.expiration.is_expired(now) {
                    *slot = None;
                    deleted += 1;
                }
            }
        }
        deleted
    }
}

impl Default for NeighborTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> LinkAddr {
        LinkAddr::new([byte; 8])
    }

    fn tentative(byte: u8, now: Ticks) -> TentativeNeighbor {
        TentativeNeighbor {
            addr: addr(byte),
            hello_challenge: Challenge::new([byte; 8]),
            pairwise_key: None,
            expiration: Deadline::after_secs(now, 15),
            helloack_deadline: None,
            was_helloack_sent: false,
        }
    }

    fn permanent(byte: u8) -> PermanentNeighbor {
        PermanentNeighbor {
            addr: addr(byte),
            pairwise_key: Aes128Key::new([byte; 16]),
            group_key: Aes128Key::new([byte; 16]),
            foreign_index: 0,
            prolongation_time: Ticks::ZERO,
            last_broadcast_counter: None,
            last_unicast_counter: None,
            seqno_cache: None,
            sent_authentic_hello: false,
            is_receiving_update: false,
        }
    }

    #[test]
    fn test_tentative_limit() {
        let mut table = NeighborTable::new();
        for i in 0..MAX_TENTATIVES {
            table.add_tentative(tentative(i as u8, Ticks::ZERO)).unwrap();
        }
        assert_eq!(
            table.add_tentative(tentative(0xEE, Ticks::ZERO)),
            Err(Error::TentativeLimitReached)
        );
    }

    #[test]
    fn test_promotion_keeps_index() {
        let mut table = NeighborTable::new();
        let mut t = tentative(1, Ticks::ZERO);
        t.pairwise_key = Some(Aes128Key::new([7; 16]));
        let index = table.add_tentative(t).unwrap();

        let p = table
            .promote(index, Aes128Key::new([8; 16]), 3, Ticks::from_secs(1))
            .unwrap();
        assert_eq!(p.foreign_index, 3);
        assert!(table.permanent(index).is_some());
        assert_eq!(table.find_permanent(&addr(1)).unwrap().0, index);
    }

    #[test]
    fn test_promotion_without_key_fails() {
        let mut table = NeighborTable::new();
        let index = table.add_tentative(tentative(1, Ticks::ZERO)).unwrap();
        assert_eq!(
            table
                .promote(index, Aes128Key::new([8; 16]), 0, Ticks::ZERO)
                .err(),
            Some(Error::HandshakeInProgress)
        );
        // The slot survives the failed promotion
        assert!(table.find_tentative(&addr(1)).is_some());
    }

    #[test]
    fn test_expired_tentatives_are_reclaimed() {
        let mut table = NeighborTable::new();
        table.add_tentative(tentative(1, Ticks::ZERO)).unwrap();
        table
            .add_tentative(tentative(2, Ticks::from_secs(10)))
            .unwrap();
        assert_eq!(table.delete_expired_tentatives(Ticks::from_secs(16)), 1);
        assert!(table.find_tentative(&addr(1)).is_none());
        assert!(table.find_tentative(&addr(2)).is_some());
    }

    #[test]
    fn test_slot_reuse_after_delete() {
        let mut table = NeighborTable::new();
        let index = table.add_tentative(tentative(1, Ticks::ZERO)).unwrap();
        table.delete(index).unwrap();
        assert_eq!(table.delete(index), Err(Error::NoSuchNeighbor));
        let again = table.add_tentative(tentative(2, Ticks::ZERO)).unwrap();
        assert_eq!(index, again);
    }

    #[test]
    fn test_same_addr_tentative_and_permanent() {
        // A rebooted permanent neighbor renegotiates: both records coexist
        let mut table = NeighborTable::new();
        table.add_permanent(permanent(1)).unwrap();
        table.add_tentative(tentative(1, Ticks::ZERO)).unwrap();
        assert!(table.find_permanent(&addr(1)).is_some());
        assert!(table.find_tentative(&addr(1)).is_some());
    }

    #[test]
    fn test_full_arena_rejects_additions() {
        let mut table = NeighborTable::new();
        for i in 0..MAX_NEIGHBORS {
            assert_eq!(table.add_permanent(permanent(i as u8)).unwrap(), i as u8);
        }
        assert!(!table.has_space());
        assert_eq!(
            table.add_permanent(permanent(0xEE)),
            Err(Error::NeighborTableFull)
        );
        assert_eq!(
            table.add_tentative(tentative(0xEE, Ticks::ZERO)),
            Err(Error::NeighborTableFull)
        );
    }

    #[test]
    fn test_seqno_duplicate_window() {
        let lifetime = akes_common::time::secs_to_ticks(20);
        let mut nbr = permanent(1);
        assert!(!nbr.is_duplicate_seqno(42, Ticks::ZERO, lifetime));

        nbr.record_seqno(42, Ticks::ZERO);
        assert!(nbr.is_duplicate_seqno(42, Ticks::from_secs(10), lifetime));
        assert!(!nbr.is_duplicate_seqno(43, Ticks::from_secs(10), lifetime));
        // The cache entry ages out
        assert!(!nbr.is_duplicate_seqno(42, Ticks::from_secs(21), lifetime));
    }
}
