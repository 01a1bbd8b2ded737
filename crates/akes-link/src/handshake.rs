// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! The adaptive key establishment context
//!
//! A three-way handshake establishes pairwise session keys and exchanges
//! broadcast group keys between radio neighbors:
//!
//! ```text
//! Initiator                                 Responder
//!     |                                         |
//!     |  --- HELLO (challenge A, broadcast) --> |
//!     |                                         |  random delay
//!     |  <-- HELLOACK (challenge B, index,  --- |
//!     |        E(group key), MIC)               |
//!     |                                         |
//!     |  --- ACK (index, E(group key), MIC) --> |
//!     |                                         |
//!     |        K = AES(secret, A || B)          |
//! ```
//!
//! Both sides derive the pairwise key from the predistributed secret and
//! the two challenges; the HELLOACK proves the responder knows the secret,
//! the ACK proves the initiator does. The responder holds the peer as
//! *tentative* until the ACK verifies, then promotes it in place.
//!
//! The context is polled, never blocks, and reports outgoing frames and
//! lifecycle events as [`AkesAction`]s. Radio outcomes come back through
//! the `on_*_sent` callbacks as [`TxStatus`] values.

use heapless::Vec;

use akes_common::constants::{
    CMD_ACK, CMD_ANNOUNCE, CMD_HELLO, CMD_HELLOACK, CMD_HELLOACK_P, CMD_UPDATE, MAX_FRAME_LEN,
};
use akes_common::log::LogBuffer;
use akes_common::time::{secs_to_ticks, Deadline, Ticks};
use akes_common::types::{Challenge, LinkAddr};
use akes_common::{log_info, log_warn, AkesConfig, Error, Result};
use akes_crypto::{derive_pairwise_key, generate_challenge, Aes128Key, CcmStar, CryptoRng};

use crate::broker::{CommandHandler, HandlerResult, IncomingCommand};
use crate::bucket::LeakyBucket;
use crate::delete::{DeleteAction, DeleteService};
use crate::frame::{make_nonce, AckFrame, HelloAckFrame, HelloFrame, UpdateFrame};
use crate::nbr::{NeighborTable, PermanentNeighbor, TentativeNeighbor};
use crate::scheme::Scheme;
use crate::strategy::{secure_unicast, verify_unicast, SecurityStrategy, VerifyResult};
use crate::trickle::{Trickle, TrickleEvent};

const MODULE: &str = "akes";

/// Delay before retrying a HELLO the radio queue rejected
const HELLO_RETRY_SECS: u64 = 1;

/// Upper bound on actions one poll can produce
const MAX_ACTIONS: usize = 24;

/// Outcome the radio reports for a handed-off frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Transmitted (and acknowledged, where link ACKs apply)
    Ok,
    /// Still queued; another callback follows
    Deferred,
    /// The radio queue was full; nothing was transmitted
    QueueFull,
    /// All transmissions went unacknowledged
    NoAck,
    /// Transmission failed
    Err,
}

/// An outgoing frame payload
pub type FramePayload = Vec<u8, MAX_FRAME_LEN>;

/// Work the context reports from [`Akes::poll`]
#[derive(Debug)]
pub enum AkesAction {
    /// Broadcast a HELLO
    SendHello {
        /// Secured payload
        payload: FramePayload,
    },
    /// Broadcast an ANNOUNCE carrying the MIC list of the next broadcast
    SendAnnounce {
        /// ANNOUNCE payload, transmitted before the broadcast it covers
        payload: FramePayload,
    },
    /// Unicast a HELLOACK
    SendHelloAck {
        /// The HELLO sender
        dest: LinkAddr,
        /// Secured payload
        payload: FramePayload,
        /// Transmission budget including the first attempt
        max_transmissions: u8,
    },
    /// Unicast an ACK
    SendAck {
        /// The HELLOACK sender
        dest: LinkAddr,
        /// Secured payload
        payload: FramePayload,
        /// Transmission budget including the first attempt
        max_transmissions: u8,
    },
    /// Unicast an UPDATE probing a silent neighbor
    SendUpdate {
        /// The probed neighbor
        dest: LinkAddr,
        /// Slot index, for the [`Akes::on_update_sent`] callback
        index: u8,
        /// Secured payload
        payload: FramePayload,
        /// Transmission budget including the first attempt
        max_transmissions: u8,
    },
    /// A neighbor became permanent
    NeighborPromoted {
        /// Its address
        addr: LinkAddr,
        /// Its slot index
        index: u8,
    },
    /// A permanent neighbor was deleted
    NeighborDeleted {
        /// Its address
        addr: LinkAddr,
    },
}

/// The AKES protocol context
pub struct Akes<S: Scheme, M: SecurityStrategy, R: CryptoRng> {
    addr: LinkAddr,
    scheme: S,
    strategy: M,
    rng: R,
    config: AkesConfig,
    group_key: Aes128Key,
    table: NeighborTable,
    trickle: Trickle,
    delete: DeleteService,
    hello_bucket: LeakyBucket,
    helloack_bucket: LeakyBucket,
    ack_bucket: LeakyBucket,
    hello_challenge: Challenge,
    awaiting_helloacks: bool,
    hello_window: Option<Deadline>,
    hello_retry: Option<Deadline>,
    broadcast_counter: u32,
    unicast_counter: u32,
    pending: Vec<AkesAction, MAX_ACTIONS>,
    log: LogBuffer,
}

impl<S: Scheme, M: SecurityStrategy, R: CryptoRng> Akes<S, M, R> {
    /// Create a context; the configuration is validated here
    ///
    /// # Errors
    ///
    /// `Error::ConfigInvalid` for inconsistent timing or bucket settings,
    /// `Error::RngFailure` if initial key or challenge generation fails.
    pub fn new(
        addr: LinkAddr,
        scheme: S,
        strategy: M,
        config: AkesConfig,
        mut rng: R,
        now: Ticks,
    ) -> Result<Self> {
        config.validate()?;
        let group_key = Aes128Key::generate(&mut rng)?;
        let hello_challenge = generate_challenge(&mut rng)?;
        let trickle = Trickle::new(&config.trickle, now, &mut rng)?;
        let delete = DeleteService::new(config.lifetimes, now, &mut rng)?;
        Ok(Self {
            addr,
            scheme,
            strategy,
            config,
            group_key,
            table: NeighborTable::new(),
            trickle,
            delete,
            hello_bucket: LeakyBucket::new(&config.hello_bucket, now),
            helloack_bucket: LeakyBucket::new(&config.helloack_bucket, now),
            ack_bucket: LeakyBucket::new(&config.ack_bucket, now),
            hello_challenge,
            awaiting_helloacks: false,
            hello_window: None,
            hello_retry: None,
            broadcast_counter: 0,
            unicast_counter: 0,
            pending: Vec::new(),
            rng,
            log: LogBuffer::new(),
        })
    }

    /// Our link-layer address
    #[must_use]
    pub fn addr(&self) -> &LinkAddr {
        &self.addr
    }

    /// Our broadcast group key
    #[must_use]
    pub fn group_key(&self) -> &Aes128Key {
        &self.group_key
    }

    /// The neighbor table
    #[must_use]
    pub fn neighbors(&self) -> &NeighborTable {
        &self.table
    }

    /// The security strategy
    #[must_use]
    pub fn strategy(&self) -> &M {
        &self.strategy
    }

    /// Buffered log entries
    #[must_use]
    pub fn logs(&self) -> &LogBuffer {
        &self.log
    }

    /// Whether a HELLO would currently be answered
    ///
    /// Checked on reception and again by the CSL framer before it even
    /// reads a HELLO payload, so floods die at the radio.
    pub fn is_acceptable_hello(&mut self, now: Ticks) -> bool {
        self.table.tentative_count() < akes_common::constants::MAX_TENTATIVES
            && self.table.has_space()
            && !self.helloack_bucket.is_full(now)
    }

    /// Advance all timers and collect due work
    ///
    /// # Errors
    ///
    /// `Error::RngFailure` on RNG exhaustion; individual neighbors failing
    /// are logged and skipped, never abort the poll.
    pub fn poll(&mut self, now: Ticks) -> Result<Vec<AkesAction, MAX_ACTIONS>> {
        // HELLOACK waiting period ran out: accept no more responders and
        // use a fresh challenge for the next round
        if self.awaiting_helloacks
            && self.hello_window.is_some_and(|w| w.is_expired(now))
        {
            self.awaiting_helloacks = false;
            self.hello_window = None;
            self.hello_challenge = generate_challenge(&mut self.rng)?;
        }

        if self.hello_retry.is_some_and(|r| r.is_expired(now)) {
            self.hello_retry = None;
            self.broadcast_hello(now)?;
        }

        if let Some(TrickleEvent::SendHello) = self.trickle.poll(now, &mut self.rng)? {
            self.broadcast_hello(now)?;
        }

        self.send_due_helloacks(now)?;
        self.table.delete_expired_tentatives(now);

        for action in self.delete.poll(&mut self.table, now, &mut self.rng)? {
            let DeleteAction::SendUpdate { index, dest } = action;
            self.send_update(index, dest, now)?;
        }

        Ok(core::mem::take(&mut self.pending))
    }

    /// Trigger a HELLO broadcast outside Trickle's schedule
    ///
    /// Skipped while a waiting period is open or the HELLO bucket is full.
    ///
    /// # Errors
    ///
    /// `Error::RngFailure` or `Error::BufferTooSmall` from securing the
    /// frame.
    pub fn broadcast_hello(&mut self, now: Ticks) -> Result<()> {
        if self.awaiting_helloacks {
            return Ok(());
        }
        if self.hello_bucket.is_full(now) {
            log_warn!(self.log, now, MODULE, "HELLO bucket full");
            return Ok(());
        }
        self.hello_bucket.pour(now);

        let mut payload: FramePayload = Vec::new();
        let mut buf = [0u8; HelloFrame::LEN];
        HelloFrame {
            challenge: self.hello_challenge,
        }
        .write_to(&mut buf)?;
        payload
            .extend_from_slice(&buf)
            .map_err(|()| Error::BufferTooSmall)?;

        self.broadcast_counter = self.broadcast_counter.wrapping_add(1);
        if let Some(announce) = self.strategy.prepare_announce(
            &self.addr,
            self.broadcast_counter,
            &self.table,
            payload.as_slice(),
        )? {
            self.push(AkesAction::SendAnnounce { payload: announce });
        }
        self.strategy
            .secure_hello(&self.addr, self.broadcast_counter, &self.table, &mut payload)?;

        // Every neighbor's next authentic HELLO counts for Trickle again
        for (_, nbr) in self.table.iter_permanent_mut() {
            nbr.sent_authentic_hello = false;
        }

        self.awaiting_helloacks = true;
        self.hello_window = Some(Deadline::after_secs(
            now,
            u64::from(self.config.handshake.max_waiting_period_secs),
        ));
        self.push(AkesAction::SendHello { payload });
        Ok(())
    }

    /// Radio callback for a HELLO broadcast
    pub fn on_hello_sent(&mut self, status: TxStatus, now: Ticks) {
        match status {
            TxStatus::Deferred => {}
            TxStatus::QueueFull => {
                self.awaiting_helloacks = false;
                self.hello_window = None;
                self.hello_retry =
                    Some(Deadline::new(now, secs_to_ticks(HELLO_RETRY_SECS)));
            }
            _ => {}
        }
    }

    /// Radio callback for an ACK unicast
    ///
    /// An ACK the radio could not deliver voids the freshly installed
    /// permanent neighbor; the peer never learned our group key.
    pub fn on_ack_sent(&mut self, dest: &LinkAddr, status: TxStatus, now: Ticks) {
        match status {
            TxStatus::Ok | TxStatus::Deferred => {}
            _ => {
                if let Some((index, _)) = self.table.find_permanent(dest) {
                    let _ = self.table.delete(index);
                    log_warn!(self.log, now, MODULE, "ACK to {} failed", dest);
                    self.push(AkesAction::NeighborDeleted { addr: *dest });
                }
            }
        }
    }

    /// Radio callback for an UPDATE unicast
    pub fn on_update_sent(&mut self, index: u8, status: TxStatus, now: Ticks) {
        if let Some(addr) = self.delete.on_update_sent(&mut self.table, index, status, now) {
            log_info!(self.log, now, MODULE, "deleted silent neighbor {}", addr);
            self.push(AkesAction::NeighborDeleted { addr });
        }
    }

    /// Verify a secured non-command unicast from a permanent neighbor
    ///
    /// Prolongs the sender and returns the payload length without the
    /// appended security data. When the MAC layer passes the frame's
    /// sequence number, link-layer retransmissions of an already accepted
    /// frame are dropped as duplicates; the cache entry expires after the
    /// configured sequence number lifetime.
    ///
    /// # Errors
    ///
    /// `Error::NoSuchNeighbor`, `Error::AuthenticationFailed` or
    /// `Error::ReplayDetected`.
    pub fn verify_incoming_unicast(
        &mut self,
        src: &LinkAddr,
        payload: &[u8],
        seqno: Option<u8>,
        now: Ticks,
    ) -> Result<usize> {
        let seqno_lifetime = secs_to_ticks(u64::from(self.config.lifetimes.seqno_lifetime_secs));
        let (_, sender) = self
            .table
            .find_permanent_mut(src)
            .ok_or(Error::NoSuchNeighbor)?;
        // A repeated sequence number is a link-layer retransmission of a
        // frame we already accepted; drop it before any crypto runs
        if let Some(seqno) = seqno {
            if sender.is_duplicate_seqno(seqno, now, seqno_lifetime) {
                return Err(Error::ReplayDetected);
            }
        }
        match verify_unicast(sender, payload) {
            (VerifyResult::Success, base_len) => {
                sender.prolong(now);
                if let Some(seqno) = seqno {
                    sender.record_seqno(seqno, now);
                }
                Ok(base_len)
            }
            (VerifyResult::Replayed, _) => Err(Error::ReplayDetected),
            (VerifyResult::Inauthentic, _) => Err(Error::AuthenticationFailed),
        }
    }

    // =========================================================================
    // Command handling
    // =========================================================================

    fn handle_hello(&mut self, cmd: &IncomingCommand<'_>) -> Result<()> {
        let frame = HelloFrame::parse(cmd.payload)?;
        let now = cmd.now;

        if let Some((_, sender)) = self.table.find_permanent_mut(&cmd.src) {
            match self.strategy.verify_hello(sender, cmd.payload) {
                VerifyResult::Success => {
                    sender.prolong(now);
                    if !sender.sent_authentic_hello {
                        sender.sent_authentic_hello = true;
                        self.trickle.hear_consistent();
                    }
                    return Ok(());
                }
                VerifyResult::Replayed => return Err(Error::ReplayDetected),
                // The peer lost its state; treat its HELLO as a fresh start
                VerifyResult::Inauthentic => {}
            }
        }

        if self.table.find_tentative(&cmd.src).is_some() {
            // A handshake with this peer is already in flight
            return Ok(());
        }
        if !self.is_acceptable_hello(now) {
            return Err(Error::RateLimited);
        }
        if self.scheme.predistributed_secret(&cmd.src).is_none() {
            log_warn!(self.log, now, MODULE, "no secret for {}", cmd.src);
            return Ok(());
        }

        // Answer at a random point early enough in the initiator's waiting
        // period for the HELLOACK and the ACK to make it back
        let delay_bound = secs_to_ticks(u64::from(
            self.config.handshake.max_waiting_period_secs
                - 2 * self.config.handshake.helloack_and_ack_delay_secs,
        ));
        let delay = self
            .rng
            .next_bounded(delay_bound.max(1))
            .map_err(Error::from)?;

        self.table.add_tentative(TentativeNeighbor {
            addr: cmd.src,
            hello_challenge: frame.challenge,
            pairwise_key: None,
            expiration: Deadline::after_secs(
                now,
                u64::from(self.config.handshake.max_waiting_period_secs),
            ),
            helloack_deadline: Some(Deadline::new(now, delay)),
            was_helloack_sent: false,
        })?;
        log_info!(self.log, now, MODULE, "HELLO from {}", cmd.src);
        Ok(())
    }

    fn send_due_helloacks(&mut self, now: Ticks) -> Result<()> {
        let mut due: Vec<u8, { akes_common::constants::MAX_TENTATIVES }> = Vec::new();
        for (index, t) in self.table.iter_tentative_mut() {
            if !t.was_helloack_sent
                && t.helloack_deadline.is_some_and(|d| d.is_expired(now))
            {
                // Capacity matches the tentative limit
                let _ = due.push(index);
            }
        }
        for index in due {
            if let Err(e) = self.send_helloack(index, now) {
                log_warn!(self.log, now, MODULE, "HELLOACK failed: {}", e);
                let _ = self.table.delete(index);
            }
        }
        Ok(())
    }

    fn send_helloack(&mut self, index: u8, now: Ticks) -> Result<()> {
        if self.helloack_bucket.is_full(now) {
            return Err(Error::RateLimited);
        }

        let (addr, hello_challenge) = match self.table.get(index) {
            Some(crate::nbr::Neighbor::Tentative(t)) => (t.addr, t.hello_challenge),
            _ => return Err(Error::NoSuchNeighbor),
        };
        let secret = self
            .scheme
            .predistributed_secret(&addr)
            .ok_or(Error::InvalidKey)?;
        let challenge = generate_challenge(&mut self.rng)?;
        let pairwise_key = derive_pairwise_key(&secret, &hello_challenge, &challenge);
        let p_flag = self.table.find_permanent(&addr).is_some();

        let mut buf = [0u8; HelloAckFrame::LEN];
        let mut group_key = [0u8; 16];
        group_key.copy_from_slice(self.group_key.as_ref());
        HelloAckFrame {
            challenge,
            index,
            group_key,
            mic: [0u8; 8],
            p_flag,
        }
        .write_to(&mut buf)?;

        let cmd_byte = if p_flag { CMD_HELLOACK_P } else { CMD_HELLOACK };
        let nonce = make_nonce(&self.addr, 0, cmd_byte);
        let ccm = CcmStar::new(&pairwise_key);
        let (aad, rest) = buf.split_at_mut(HelloAckFrame::AAD_LEN);
        let mic = ccm.encrypt_in_place(&nonce, aad, &mut rest[..16])?;
        buf[HelloAckFrame::LEN - 8..].copy_from_slice(mic.as_bytes());

        self.helloack_bucket.pour(now);

        let (_, t) = self
            .table
            .find_tentative_mut(&addr)
            .ok_or(Error::NoSuchNeighbor)?;
        t.pairwise_key = Some(pairwise_key);
        t.was_helloack_sent = true;
        t.helloack_deadline = None;
        // The ACK must arrive within two transmission delays
        t.expiration = Deadline::after_secs(
            now,
            u64::from(2 * self.config.handshake.helloack_and_ack_delay_secs),
        );

        let mut payload: FramePayload = Vec::new();
        payload
            .extend_from_slice(&buf)
            .map_err(|()| Error::BufferTooSmall)?;
        self.push(AkesAction::SendHelloAck {
            dest: addr,
            payload,
            max_transmissions: 1 + self.config.handshake.max_helloack_retransmissions,
        });
        log_info!(self.log, now, MODULE, "HELLOACK to {}", addr);
        Ok(())
    }

    fn handle_helloack(&mut self, cmd: &IncomingCommand<'_>) -> Result<()> {
        let frame = HelloAckFrame::parse(cmd.payload)?;
        let now = cmd.now;

        if !self.awaiting_helloacks {
            log_warn!(self.log, now, MODULE, "unexpected HELLOACK from {}", cmd.src);
            return Ok(());
        }
        if self.ack_bucket.is_full(now) {
            return Err(Error::RateLimited);
        }
        let Some(secret) = self.scheme.predistributed_secret(&cmd.src) else {
            return Ok(());
        };
        let pairwise_key =
            derive_pairwise_key(&secret, &self.hello_challenge, &frame.challenge);

        if let Some((_, p)) = self.table.find_permanent(&cmd.src) {
            if frame.p_flag {
                // The responder still holds us; no new session needed
                return Ok(());
            }
            if pairwise_key.ct_eq(&p.pairwise_key) {
                return Err(Error::ReplayDetected);
            }
        }

        let cmd_byte = if frame.p_flag { CMD_HELLOACK_P } else { CMD_HELLOACK };
        let nonce = make_nonce(&cmd.src, 0, cmd_byte);
        let mut group_key = frame.group_key;
        CcmStar::new(&pairwise_key)
            .decrypt_in_place(
                &nonce,
                &cmd.payload[..HelloAckFrame::AAD_LEN],
                &mut group_key,
                &frame.mic,
            )
            .map_err(|_| Error::AuthenticationFailed)?;

        // We may simultaneously be answering the peer's HELLO
        if let Some((t_index, t)) = self.table.find_tentative(&cmd.src) {
            if t.was_helloack_sent {
                // Our HELLOACK is out; let that handshake finish
                return Ok(());
            }
            let _ = self.table.delete(t_index);
        }
        if let Some((p_index, _)) = self.table.find_permanent(&cmd.src) {
            let _ = self.table.delete(p_index);
        }

        let index = self.table.add_permanent(PermanentNeighbor {
            addr: cmd.src,
            pairwise_key: pairwise_key.clone(),
            group_key: Aes128Key::new(group_key),
            foreign_index: frame.index,
            prolongation_time: now,
            last_broadcast_counter: None,
            last_unicast_counter: None,
            seqno_cache: None,
            sent_authentic_hello: false,
            is_receiving_update: false,
        })?;

        self.ack_bucket.pour(now);
        self.send_ack(index, &cmd.src, &pairwise_key, now)?;
        self.push(AkesAction::NeighborPromoted {
            addr: cmd.src,
            index,
        });
        log_info!(self.log, now, MODULE, "HELLOACK from {}", cmd.src);
        Ok(())
    }

    fn send_ack(
        &mut self,
        index: u8,
        dest: &LinkAddr,
        pairwise_key: &Aes128Key,
        _now: Ticks,
    ) -> Result<()> {
        let mut buf = [0u8; AckFrame::LEN];
        let mut group_key = [0u8; 16];
        group_key.copy_from_slice(self.group_key.as_ref());
        AckFrame {
            index,
            group_key,
            mic: [0u8; 8],
        }
        .write_to(&mut buf)?;

        let nonce = make_nonce(&self.addr, 0, CMD_ACK);
        let ccm = CcmStar::new(pairwise_key);
        let (aad, rest) = buf.split_at_mut(AckFrame::AAD_LEN);
        let mic = ccm.encrypt_in_place(&nonce, aad, &mut rest[..16])?;
        buf[AckFrame::LEN - 8..].copy_from_slice(mic.as_bytes());

        let mut payload: FramePayload = Vec::new();
        payload
            .extend_from_slice(&buf)
            .map_err(|()| Error::BufferTooSmall)?;
        self.push(AkesAction::SendAck {
            dest: *dest,
            payload,
            max_transmissions: 1 + self.config.handshake.max_ack_retransmissions,
        });
        Ok(())
    }

    fn handle_ack(&mut self, cmd: &IncomingCommand<'_>) -> Result<()> {
        let frame = AckFrame::parse(cmd.payload)?;
        let now = cmd.now;

        let Some((t_index, t)) = self.table.find_tentative(&cmd.src) else {
            log_warn!(self.log, now, MODULE, "ACK from unknown {}", cmd.src);
            return Ok(());
        };
        if !t.was_helloack_sent {
            return Ok(());
        }
        if t.expiration.is_expired(now) {
            // The waiting period is over; the slot merely awaits the sweep
            log_warn!(self.log, now, MODULE, "late ACK from {}", cmd.src);
            return Ok(());
        }
        let Some(pairwise_key) = t.pairwise_key.clone() else {
            return Ok(());
        };

        let nonce = make_nonce(&cmd.src, 0, CMD_ACK);
        let mut group_key = frame.group_key;
        CcmStar::new(&pairwise_key)
            .decrypt_in_place(
                &nonce,
                &cmd.payload[..AckFrame::AAD_LEN],
                &mut group_key,
                &frame.mic,
            )
            .map_err(|_| Error::AuthenticationFailed)?;

        // An older session with this peer is superseded
        let is_new = match self.table.find_permanent(&cmd.src) {
            Some((p_index, _)) => {
                let _ = self.table.delete(p_index);
                false
            }
            None => true,
        };

        self.table
            .promote(t_index, Aes128Key::new(group_key), frame.index, now)?;
        self.push(AkesAction::NeighborPromoted {
            addr: cmd.src,
            index: t_index,
        });
        log_info!(self.log, now, MODULE, "ACK from {}", cmd.src);

        if is_new {
            let count = self.table.permanent_count();
            self.trickle.on_new_nbr(count, now, &mut self.rng)?;
        }
        Ok(())
    }

    fn handle_announce(&mut self, cmd: &IncomingCommand<'_>) -> Result<()> {
        let Some((_, sender)) = self.table.find_permanent(&cmd.src) else {
            // ANNOUNCEs from strangers carry nothing for us
            return Ok(());
        };
        let foreign_index = sender.foreign_index;
        self.strategy.handle_announce(cmd.payload, foreign_index)
    }

    fn handle_update(&mut self, cmd: &IncomingCommand<'_>) -> Result<()> {
        // Authenticity and prolongation; the frame carries nothing else
        let base_len = self.verify_incoming_unicast(&cmd.src, cmd.payload, None, cmd.now)?;
        UpdateFrame::parse(&cmd.payload[..base_len])?;
        Ok(())
    }

    fn send_update(&mut self, index: u8, dest: LinkAddr, now: Ticks) -> Result<()> {
        let Some(nbr) = self.table.permanent(index) else {
            return Ok(());
        };
        let pairwise_key = nbr.pairwise_key.clone();

        let mut payload: FramePayload = Vec::new();
        let mut buf = [0u8; UpdateFrame::LEN];
        UpdateFrame.write_to(&mut buf)?;
        payload
            .extend_from_slice(&buf)
            .map_err(|()| Error::BufferTooSmall)?;

        self.unicast_counter = self.unicast_counter.wrapping_add(1);
        secure_unicast(&self.addr, self.unicast_counter, &pairwise_key, &mut payload)?;

        self.push(AkesAction::SendUpdate {
            dest,
            index,
            payload,
            max_transmissions: 1 + self.config.lifetimes.max_update_retransmissions,
        });
        log_info!(self.log, now, MODULE, "UPDATE to {}", dest);
        Ok(())
    }

    fn push(&mut self, action: AkesAction) {
        if self.pending.push(action).is_err() {
            // Oldest work wins; the radio is clearly backed up anyway
            log_warn!(
                self.log,
                Ticks::ZERO,
                MODULE,
                "action queue overflow"
            );
        }
    }
}

impl<S: Scheme, M: SecurityStrategy, R: CryptoRng> CommandHandler for Akes<S, M, R> {
    fn handle(&mut self, cmd: &IncomingCommand<'_>) -> Result<HandlerResult> {
        match cmd.cmd_id {
            CMD_HELLO => self.handle_hello(cmd).map(|()| HandlerResult::Consumed),
            CMD_HELLOACK | CMD_HELLOACK_P => {
                self.handle_helloack(cmd).map(|()| HandlerResult::Consumed)
            }
            CMD_ACK => self.handle_ack(cmd).map(|()| HandlerResult::Consumed),
            CMD_ANNOUNCE => self.handle_announce(cmd).map(|()| HandlerResult::Consumed),
            CMD_UPDATE => self.handle_update(cmd).map(|()| HandlerResult::Consumed),
            _ => Ok(HandlerResult::Unconsumed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::SingleKeyScheme;
    use crate::strategy::UnicastStrategy;
    use akes_crypto::CtrDrbg;

    fn node(byte: u8, nonce: u64) -> Akes<SingleKeyScheme, UnicastStrategy, CtrDrbg> {
        Akes::new(
            LinkAddr::new([byte; 8]),
            SingleKeyScheme::new(Aes128Key::new([0x5A; 16])),
            UnicastStrategy,
            AkesConfig::DEFAULT,
            CtrDrbg::new(&[byte; 16], nonce),
            Ticks::ZERO,
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = AkesConfig::DEFAULT;
        config.handshake.max_waiting_period_secs = 1;
        let result = Akes::new(
            LinkAddr::new([1; 8]),
            SingleKeyScheme::new(Aes128Key::new([0x5A; 16])),
            UnicastStrategy,
            config,
            CtrDrbg::new(&[1; 16], 1),
            Ticks::ZERO,
        );
        assert!(matches!(result.err(), Some(Error::ConfigInvalid)));
    }

    #[test]
    fn test_hello_creates_tentative() {
        let mut responder = node(2, 2);
        let hello = HelloFrame {
            challenge: Challenge::new([1; 8]),
        };
        let mut buf = [0u8; HelloFrame::LEN];
        hello.write_to(&mut buf).unwrap();

        let src = LinkAddr::new([1; 8]);
        let cmd = IncomingCommand::from_payload(&buf, src, true, Ticks::ZERO).unwrap();
        assert_eq!(responder.handle(&cmd), Ok(HandlerResult::Consumed));
        assert!(responder.neighbors().find_tentative(&src).is_some());
        // A duplicate HELLO does not create a second slot
        assert_eq!(responder.handle(&cmd), Ok(HandlerResult::Consumed));
        assert_eq!(responder.neighbors().tentative_count(), 1);
    }

    #[test]
    fn test_helloack_requires_open_window() {
        let mut initiator = node(1, 1);
        let payload = [0u8; HelloAckFrame::LEN];
        let mut buf = payload;
        buf[0] = CMD_HELLOACK;
        let cmd = IncomingCommand::from_payload(
            &buf,
            LinkAddr::new([2; 8]),
            false,
            Ticks::ZERO,
        )
        .unwrap();
        // No HELLO was broadcast: silently consumed, no neighbor appears
        assert_eq!(initiator.handle(&cmd), Ok(HandlerResult::Consumed));
        assert_eq!(initiator.neighbors().permanent_count(), 0);
    }

    #[test]
    fn test_hello_flood_capped() {
        let mut responder = node(2, 2);
        let mut accepted = 0;
        for i in 0..50u8 {
            let hello = HelloFrame {
                challenge: Challenge::new([i; 8]),
            };
            let mut buf = [0u8; HelloFrame::LEN];
            hello.write_to(&mut buf).unwrap();
            let src = LinkAddr::new([i.wrapping_add(10); 8]);
            let cmd = IncomingCommand::from_payload(&buf, src, true, Ticks::ZERO).unwrap();
            match responder.handle(&cmd) {
                Ok(HandlerResult::Consumed) => accepted += 1,
                Err(Error::RateLimited) => {}
                other => panic!("unexpected: {other:?}"),
            }
        }
        assert_eq!(
            responder.neighbors().tentative_count(),
            akes_common::constants::MAX_TENTATIVES
        );
        assert!(accepted >= responder.neighbors().tentative_count());
    }

    #[test]
    fn test_unknown_command_unconsumed() {
        let mut n = node(1, 1);
        let cmd = IncomingCommand::from_payload(
            &[0x99],
            LinkAddr::new([2; 8]),
            false,
            Ticks::ZERO,
        )
        .unwrap();
        assert_eq!(n.handle(&cmd), Ok(HandlerResult::Unconsumed));
    }

    #[test]
    fn test_trickle_drives_hello() {
        let mut n = node(1, 1);
        let mut sent = false;
        for s in 0..35 {
            for action in n.poll(Ticks::from_secs(s)).unwrap() {
                if matches!(action, AkesAction::SendHello { .. }) {
                    sent = true;
                }
            }
        }
        assert!(sent, "no HELLO within the first Trickle interval");
    }

    #[test]
    fn test_duplicate_seqno_dropped() {
        let mut n = node(1, 1);
        let key = Aes128Key::new([0x77; 16]);
        let src = LinkAddr::new([2; 8]);
        n.table
            .add_permanent(PermanentNeighbor {
                addr: src,
                pairwise_key: key.clone(),
                group_key: Aes128Key::new([0xEE; 16]),
                foreign_index: 0,
                prolongation_time: Ticks::ZERO,
                last_broadcast_counter: None,
                last_unicast_counter: None,
                seqno_cache: None,
                sent_authentic_hello: false,
                is_receiving_update: false,
            })
            .unwrap();
        let secured = |counter: u32| {
            let mut frame: FramePayload = Vec::new();
            frame.push(0x55).unwrap();
            secure_unicast(&src, counter, &key, &mut frame).unwrap();
            frame
        };

        let now = Ticks::from_secs(1);
        assert!(n.verify_incoming_unicast(&src, &secured(1), Some(9), now).is_ok());
        // A fresh counter does not resurrect a repeated sequence number
        assert_eq!(
            n.verify_incoming_unicast(&src, &secured(2), Some(9), now),
            Err(Error::ReplayDetected)
        );
        assert!(n.verify_incoming_unicast(&src, &secured(3), Some(10), now).is_ok());
        // The cache forgets after the sequence number lifetime
        assert!(n
            .verify_incoming_unicast(&src, &secured(4), Some(10), Ticks::from_secs(25))
            .is_ok());
    }

    #[test]
    fn test_hello_window_regenerates_challenge() {
        let mut n = node(1, 1);
        n.broadcast_hello(Ticks::ZERO).unwrap();
        let first = n.hello_challenge;
        // Second HELLO is suppressed while the window is open
        n.broadcast_hello(Ticks::from_secs(1)).unwrap();
        assert_eq!(n.pending.len(), 1);
        let _ = n.poll(Ticks::from_secs(16)).unwrap();
        assert_ne!(n.hello_challenge, first);
    }
}
