// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Deletion of disappeared neighbors
//!
//! Every authentic frame prolongs its sender. A periodic check, randomized
//! by half a second to keep probes from colliding across the network, finds
//! permanent neighbors whose lifetime ran out and probes each with a
//! unicast UPDATE before giving up on it: an authentic answer prolongs the
//! neighbor, silence through all retransmissions deletes it and frees the
//! slot. The same sweep retires stale sequence number cache entries.

use heapless::Vec;

use akes_common::config::LifetimeConfig;
use akes_common::constants::MAX_NEIGHBORS;
use akes_common::time::{secs_to_ticks, Deadline, Ticks, TICKS_PER_SEC};
use akes_common::types::LinkAddr;
use akes_common::{Error, Result};
use akes_crypto::CryptoRng;

use crate::handshake::TxStatus;
use crate::nbr::NeighborTable;

/// Interval between expiry sweeps, before randomization
const CHECK_INTERVAL_SECS: u64 = 1;

/// Work the deletion service reports from [`DeleteService::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteAction {
    /// Probe a silent neighbor with an UPDATE command
    SendUpdate {
        /// Slot index of the neighbor
        index: u8,
        /// Its link-layer address
        dest: LinkAddr,
    },
}

/// The neighbor expiry sweeper
#[derive(Debug)]
pub struct DeleteService {
    lifetimes: LifetimeConfig,
    check_deadline: Deadline,
}

impl DeleteService {
    /// Create the service and schedule the first sweep
    ///
    /// # Errors
    ///
    /// `Error::RngFailure` if randomizing the first sweep fails.
    pub fn new<R: CryptoRng>(
        lifetimes: LifetimeConfig,
        now: Ticks,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            lifetimes,
            check_deadline: Self::next_deadline(now, rng)?,
        })
    }

    /// Run a sweep if one is due
    ///
    /// # Errors
    ///
    /// `Error::RngFailure` if rescheduling fails.
    pub fn poll<R: CryptoRng>(
        &mut self,
        table: &mut NeighborTable,
        now: Ticks,
        rng: &mut R,
    ) -> Result<Vec<DeleteAction, MAX_NEIGHBORS>> {
        let mut actions = Vec::new();
        if !self.check_deadline.is_expired(now) {
            return Ok(actions);
        }
        self.check_deadline = Self::next_deadline(now, rng)?;

        let lifetime = secs_to_ticks(u64::from(self.lifetimes.nbr_lifetime_secs));
        let seqno_lifetime = secs_to_ticks(u64::from(self.lifetimes.seqno_lifetime_secs));
        for (index, nbr) in table.iter_permanent_mut() {
            if nbr
                .seqno_cache
                .is_some_and(|c| c.received_at.has_elapsed(now, seqno_lifetime))
            {
                nbr.seqno_cache = None;
            }
            if !nbr.is_receiving_update && nbr.is_expired(now, lifetime) {
                nbr.is_receiving_update = true;
                // Full vector only with a table larger than its own arena
                actions
                    .push(DeleteAction::SendUpdate {
                        index,
                        dest: nbr.addr,
                    })
                    .map_err(|_| Error::InternalError)?;
            }
        }
        Ok(actions)
    }

    /// Radio callback for a probing UPDATE
    ///
    /// Returns the address of the neighbor that was deleted, if any.
    pub fn on_update_sent(
        &self,
        table: &mut NeighborTable,
        index: u8,
        status: TxStatus,
        now: Ticks,
    ) -> Option<LinkAddr> {
        if status == TxStatus::Deferred {
            // Another callback follows once the frame actually left
            return None;
        }
        let nbr = table.permanent_mut(index)?;
        let lifetime = secs_to_ticks(u64::from(self.lifetimes.nbr_lifetime_secs));
        if nbr.is_expired(now, lifetime) && status != TxStatus::QueueFull {
            let addr = nbr.addr;
            // Delete cannot fail: permanent_mut just found the slot
            let _ = table.delete(index);
            return Some(addr);
        }
        nbr.is_receiving_update = false;
        None
    }

    fn next_deadline<R: CryptoRng>(now: Ticks, rng: &mut R) -> Result<Deadline> {
        // CHECK_INTERVAL - 0.5 s + rand(1 s), as in the half-open interval
        // [0.5 s, 1.5 s)
        let jitter = rng.next_bounded(TICKS_PER_SEC).map_err(Error::from)?;
        Ok(Deadline::new(
            now,
            secs_to_ticks(CHECK_INTERVAL_SECS) - TICKS_PER_SEC / 2 + jitter,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nbr::{PermanentNeighbor, SeqnoCache};
    use akes_crypto::{Aes128Key, CtrDrbg};

    fn service(rng: &mut CtrDrbg) -> DeleteService {
        DeleteService::new(LifetimeConfig::DEFAULT, Ticks::ZERO, rng).unwrap()
    }

    fn permanent(byte: u8) -> PermanentNeighbor {
        PermanentNeighbor {
            addr: LinkAddr::new([byte; 8]),
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
    fn test_fresh_neighbor_not_probed() {
        let mut rng = CtrDrbg::new(&[1; 16], 0);
        let mut svc = service(&mut rng);
        let mut table = NeighborTable::new();
        table.add_permanent(permanent(1)).unwrap();

        let actions = svc
            .poll(&mut table, Ticks::from_secs(2), &mut rng)
            .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_expired_neighbor_probed_once() {
        let mut rng = CtrDrbg::new(&[1; 16], 0);
        let mut svc = service(&mut rng);
        let mut table = NeighborTable::new();
        let index = table.add_permanent(permanent(1)).unwrap();

        let late = Ticks::from_secs(301);
        let actions = svc.poll(&mut table, late, &mut rng).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(
            actions[0],
            DeleteAction::SendUpdate {
                index,
                dest: LinkAddr::new([1; 8]),
            }
        );
        // The in-flight flag suppresses further probes
        let actions = svc
            .poll(&mut table, late + secs_to_ticks(2), &mut rng)
            .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_silent_neighbor_deleted_after_update() {
        let mut rng = CtrDrbg::new(&[1; 16], 0);
        let mut svc = service(&mut rng);
        let mut table = NeighborTable::new();
        let index = table.add_permanent(permanent(1)).unwrap();

        let late = Ticks::from_secs(301);
        let _ = svc.poll(&mut table, late, &mut rng).unwrap();
        let deleted = svc.on_update_sent(&mut table, index, TxStatus::NoAck, late);
        assert_eq!(deleted, Some(LinkAddr::new([1; 8])));
        assert!(table.permanent(index).is_none());
    }

    #[test]
    fn test_prolonged_neighbor_survives_update() {
        let mut rng = CtrDrbg::new(&[1; 16], 0);
        let mut svc = service(&mut rng);
        let mut table = NeighborTable::new();
        let index = table.add_permanent(permanent(1)).unwrap();

        let late = Ticks::from_secs(301);
        let _ = svc.poll(&mut table, late, &mut rng).unwrap();
        // An authentic frame arrived while the UPDATE was in flight
        table.permanent_mut(index).unwrap().prolong(late);
        let deleted = svc.on_update_sent(&mut table, index, TxStatus::Ok, late);
        assert_eq!(deleted, None);
        assert!(!table.permanent(index).unwrap().is_receiving_update);
    }

    #[test]
    fn test_queue_full_retries_instead_of_deleting() {
        let mut rng = CtrDrbg::new(&[1; 16], 0);
        let mut svc = service(&mut rng);
        let mut table = NeighborTable::new();
        let index = table.add_permanent(permanent(1)).unwrap();

        let late = Ticks::from_secs(301);
        let _ = svc.poll(&mut table, late, &mut rng).unwrap();
        assert_eq!(
            svc.on_update_sent(&mut table, index, TxStatus::QueueFull, late),
            None
        );
        // The next sweep sends another UPDATE
        let actions = svc
            .poll(&mut table, late + secs_to_ticks(2), &mut rng)
            .unwrap();
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_stale_seqno_cache_cleared() {
        let mut rng = CtrDrbg::new(&[1; 16], 0);
        let mut svc = service(&mut rng);
        let mut table = NeighborTable::new();
        let index = table.add_permanent(permanent(1)).unwrap();
        {
            let nbr = table.permanent_mut(index).unwrap();
            nbr.seqno_cache = Some(SeqnoCache {
                seqno: 42,
                received_at: Ticks::ZERO,
            });
            nbr.prolong(Ticks::from_secs(20));
        }

        let _ = svc.poll(&mut table, Ticks::from_secs(25), &mut rng).unwrap();
        assert!(table.permanent(index).unwrap().seqno_cache.is_none());
    }
}
