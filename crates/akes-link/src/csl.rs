// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! CSL framer with practical on-the-fly resistance to denial-of-sleep
//!
//! Receivers sample the channel on a schedule; senders precede each payload
//! frame with a train of tiny wake-up frames. A wake-up frame names its
//! receiver by slot index and proves itself with a one-time password, a
//! 4-byte CCM* tag over the payload frame's length under the pairwise key.
//! A forged wake-up frame therefore costs the attacker more than it costs
//! the receiver, which drops it after a few bytes.
//!
//! Wake-up frame layout by subtype (after the length byte):
//!
//! ```text
//! HELLO:    | type 1 | dst PAN ID 2 |                  rendezvous 2 |
//! HELLOACK: | type 1 | dst PAN ID 2 |                  rendezvous 1 |
//! ACK:      | type 1 | index 1 | payload len 1 | OTP 4 | rendezvous 1 |
//! NORMAL:   | type 1 | index 1 | payload len 1 | OTP 4 | rendezvous 1 |
//! ```
//!
//! The type byte carries the extended frame type in bits 0..5 and the
//! subtype in bits 6..7. HELLO rendezvous times are long because a HELLO
//! wake-up train must span a full wake-up interval. The destination PAN ID
//! has its low byte XORed with the channel, so a HELLO overheard on the
//! wrong channel fails cheaply. Unsolicited HELLO and HELLOACK wake-up
//! frames are additionally gated by leaky buckets.
//!
//! Payload frames begin with the same type byte, bit 6 flagging command
//! frames and bit 7 a pending burst frame; HELLO and HELLOACK payloads
//! carry the sender address, NORMAL payloads a sequence number.

use akes_common::config::FramerConfig;
use akes_common::constants::{
    CMD_ACK, CMD_HELLO, CMD_HELLOACK, CMD_HELLOACK_P, CSL_PHASE_SHIFT, LINKADDR_LEN, MIC_LEN,
    OTP_LEN, POTR_EXTENDED_FRAME_TYPE, POTR_SUBTYPE_ACK, POTR_SUBTYPE_HELLO,
    POTR_SUBTYPE_HELLOACK, POTR_SUBTYPE_NORMAL,
};
use akes_common::time::Ticks;
use akes_common::types::LinkAddr;
use akes_common::{Error, Result};
use akes_crypto::{Aes128Key, CcmNonce, CcmStar};

use crate::bucket::LeakyBucket;
use crate::frame::{make_nonce, NONCE_FLAG_ACKNOWLEDGMENT, NONCE_FLAG_OTP};

/// Mask selecting the extended frame type bits
const FRAME_TYPE_MASK: u8 = 0x3F;

/// Payload header bit flagging a command frame
const IS_COMMAND_FLAG: u8 = 1 << 6;

/// Payload header bit flagging a pending burst frame
const FRAME_PENDING_FLAG: u8 = 1 << 7;

/// Wake-up frame subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subtype {
    /// Broadcast HELLO
    Hello,
    /// Unicast HELLOACK (receiver has no pairwise key yet)
    HelloAck,
    /// Unicast ACK (secured under the tentative key)
    Ack,
    /// Any established-pair frame
    Normal,
}

impl Subtype {
    #[must_use]
    fn bits(self) -> u8 {
        match self {
            Self::Hello => POTR_SUBTYPE_HELLO,
            Self::HelloAck => POTR_SUBTYPE_HELLOACK,
            Self::Ack => POTR_SUBTYPE_ACK,
            Self::Normal => POTR_SUBTYPE_NORMAL,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            POTR_SUBTYPE_HELLO => Self::Hello,
            POTR_SUBTYPE_HELLOACK => Self::HelloAck,
            POTR_SUBTYPE_ACK => Self::Ack,
            _ => Self::Normal,
        }
    }

    /// Whether wake-up frames of this subtype carry a destination PAN ID
    #[must_use]
    pub fn has_pan_id(self) -> bool {
        matches!(self, Self::Hello | Self::HelloAck)
    }

    /// Whether wake-up frames of this subtype carry index, length and OTP
    #[must_use]
    pub fn has_otp(self) -> bool {
        matches!(self, Self::Ack | Self::Normal)
    }

    /// Rendezvous time field width; only HELLO trains span whole intervals
    #[must_use]
    pub fn rendezvous_len(self) -> usize {
        if self == Self::Hello {
            2
        } else {
            1
        }
    }

    /// The command identifiers valid under this subtype, if constrained
    #[must_use]
    pub fn matches_command(self, cmd_id: u8) -> bool {
        match self {
            Self::Hello => cmd_id == CMD_HELLO,
            Self::HelloAck => cmd_id == CMD_HELLOACK || cmd_id == CMD_HELLOACK_P,
            Self::Ack => cmd_id == CMD_ACK,
            Self::Normal => true,
        }
    }
}

/// Everything needed to build one wake-up frame
pub struct WakeUpSpec<'a> {
    /// Frame subtype
    pub subtype: Subtype,
    /// Radio channel the train is sent on
    pub channel: u8,
    /// Remaining wake-up frames ahead of the payload frame
    pub rendezvous_time: u16,
    /// Length of the following payload frame
    pub payload_len: u8,
    /// OTP inputs; required for `Ack` and `Normal` subtypes
    pub receiver: Option<OtpInputs<'a>>,
}

/// Inputs of the one-time password
pub struct OtpInputs<'a> {
    /// Pairwise (or tentative) key shared with the receiver
    pub key: &'a Aes128Key,
    /// Sender link-layer address, bound into the nonce
    pub sender: &'a LinkAddr,
    /// Wake-up counter both sides track
    pub counter: u32,
    /// Our slot index in the receiver's neighbor table
    pub index: u8,
}

/// A parsed wake-up frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedWakeUp {
    /// Frame subtype
    pub subtype: Subtype,
    /// Receiver slot index, for `Ack` and `Normal`
    pub index: Option<u8>,
    /// Announced payload frame length
    pub payload_len: Option<u8>,
    /// The OTP to verify against [`PotrFramer::verify_otp`]
    pub otp: Option<[u8; OTP_LEN]>,
    /// Remaining wake-up frames before the payload frame
    pub rendezvous_time: u16,
}

/// A parsed payload frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Frame subtype
    pub subtype: Subtype,
    /// Bit 6: the payload is a command frame
    pub is_command: bool,
    /// Length of a pending burst frame, if bit 7 was set
    pub pending_frame_len: Option<u8>,
    /// Sender address, present for HELLO and HELLOACK
    pub source: Option<LinkAddr>,
    /// Sequence number, present for NORMAL frames
    pub seqno: Option<u8>,
    /// Header length in bytes
    pub len: usize,
}

/// The POTR framer state
pub struct PotrFramer {
    pan_id: u16,
    inc_hello_bucket: LeakyBucket,
    inc_helloack_bucket: LeakyBucket,
    max_hello_rendezvous: u16,
    max_rendezvous: u8,
}

impl PotrFramer {
    /// Create a framer
    ///
    /// # Errors
    ///
    /// `Error::ConfigInvalid` for zero-sized buckets.
    pub fn new(config: &FramerConfig, pan_id: u16, now: Ticks) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pan_id,
            inc_hello_bucket: LeakyBucket::new(&config.inc_hello_bucket, now),
            inc_helloack_bucket: LeakyBucket::new(&config.inc_helloack_bucket, now),
            max_hello_rendezvous: config.max_hello_rendezvous,
            max_rendezvous: config.max_rendezvous,
        })
    }

    /// Write a wake-up frame into `buf`, returning its length
    ///
    /// # Errors
    ///
    /// `Error::BufferTooSmall`; `Error::InvalidKey` when OTP inputs are
    /// missing for a subtype that needs them.
    pub fn create_wake_up_frame(&self, spec: &WakeUpSpec<'_>, buf: &mut [u8]) -> Result<usize> {
        let mut at = 0usize;
        let mut put = |buf: &mut [u8], byte: u8| -> Result<()> {
            *buf.get_mut(at).ok_or(Error::BufferTooSmall)? = byte;
            at += 1;
            Ok(())
        };

        put(buf, POTR_EXTENDED_FRAME_TYPE | (spec.subtype.bits() << 6))?;

        if spec.subtype.has_pan_id() {
            put(buf, (self.pan_id as u8) ^ spec.channel)?;
            put(buf, (self.pan_id >> 8) as u8)?;
        }

        if spec.subtype.has_otp() {
            let inputs = spec.receiver.as_ref().ok_or(Error::InvalidKey)?;
            put(buf, inputs.index)?;
            put(buf, spec.payload_len)?;
            let otp = Self::compute_otp(inputs, spec.payload_len)?;
            for byte in otp {
                put(buf, byte)?;
            }
        }

        match spec.subtype.rendezvous_len() {
            2 => {
                put(buf, (spec.rendezvous_time >> 8) as u8)?;
                put(buf, spec.rendezvous_time as u8)?;
            }
            _ => put(buf, spec.rendezvous_time as u8)?,
        }
        Ok(at)
    }

    /// Parse a received wake-up frame
    ///
    /// The announced rendezvous time is bounded per subtype: a HELLO train
    /// may span at most one wake-up interval, a phase-locked sender must
    /// hit the receiver within the residual clock uncertainty. A frame that
    /// promises a later rendezvous would keep the radio listening
    /// arbitrarily long and is dropped. HELLO and HELLOACK wake-up frames
    /// that pass every check pour their inbound buckets; a full bucket
    /// rejects the frame with `Error::RateLimited` before any cryptography
    /// happens.
    ///
    /// # Errors
    ///
    /// `Error::FrameTooShort`, `Error::UnsupportedFrame` for a foreign
    /// frame type or wrong PAN ID, `Error::RendezvousTooLate` past the
    /// subtype's bound, `Error::RateLimited` from the gates.
    pub fn parse_wake_up_frame(
        &mut self,
        buf: &[u8],
        channel: u8,
        now: Ticks,
    ) -> Result<ParsedWakeUp> {
        let type_byte = *buf.first().ok_or(Error::FrameTooShort)?;
        if type_byte & FRAME_TYPE_MASK != POTR_EXTENDED_FRAME_TYPE {
            return Err(Error::UnsupportedFrame);
        }
        let subtype = Subtype::from_bits(type_byte >> 6);
        let mut at = 1usize;

        if subtype.has_pan_id() {
            let low = *buf.get(at).ok_or(Error::FrameTooShort)?;
            let high = *buf.get(at + 1).ok_or(Error::FrameTooShort)?;
            at += 2;
            let pan_id = u16::from(low ^ channel) | (u16::from(high) << 8);
            if pan_id != self.pan_id {
                return Err(Error::UnsupportedFrame);
            }
        }

        let (mut index, mut payload_len, mut otp) = (None, None, None);
        if subtype.has_otp() {
            index = Some(*buf.get(at).ok_or(Error::FrameTooShort)?);
            payload_len = Some(*buf.get(at + 1).ok_or(Error::FrameTooShort)?);
            at += 2;
            let mut bytes = [0u8; OTP_LEN];
            bytes.copy_from_slice(
                buf.get(at..at + OTP_LEN).ok_or(Error::FrameTooShort)?,
            );
            otp = Some(bytes);
            at += OTP_LEN;
        }

        let rendezvous_time = match subtype.rendezvous_len() {
            2 => {
                let high = *buf.get(at).ok_or(Error::FrameTooShort)?;
                let low = *buf.get(at + 1).ok_or(Error::FrameTooShort)?;
                (u16::from(high) << 8) | u16::from(low)
            }
            _ => u16::from(*buf.get(at).ok_or(Error::FrameTooShort)?),
        };
        let limit = match subtype {
            Subtype::Hello => self.max_hello_rendezvous,
            _ => u16::from(self.max_rendezvous),
        };
        if rendezvous_time > limit {
            return Err(Error::RendezvousTooLate);
        }

        // Buckets pour last, so malformed or over-promising frames never
        // consume a drop
        if subtype.has_pan_id() {
            let bucket = match subtype {
                Subtype::Hello => &mut self.inc_hello_bucket,
                _ => &mut self.inc_helloack_bucket,
            };
            if bucket.is_full(now) {
                return Err(Error::RateLimited);
            }
            bucket.pour(now);
        }

        Ok(ParsedWakeUp {
            subtype,
            index,
            payload_len,
            otp,
            rendezvous_time,
        })
    }

    /// Verify the OTP of a parsed wake-up frame
    ///
    /// # Errors
    ///
    /// `Error::AuthenticationFailed` on mismatch, `Error::MalformedCommand`
    /// if the frame carried no OTP.
    pub fn verify_otp(parsed: &ParsedWakeUp, inputs: &OtpInputs<'_>) -> Result<()> {
        let (received, payload_len) = match (parsed.otp, parsed.payload_len) {
            (Some(otp), Some(len)) => (otp, len),
            _ => return Err(Error::MalformedCommand),
        };
        let expected = Self::compute_otp(inputs, payload_len)?;
        let otp = akes_crypto::Otp::new(expected);
        if !otp.verify(&received) {
            return Err(Error::AuthenticationFailed);
        }
        Ok(())
    }

    fn compute_otp(inputs: &OtpInputs<'_>, payload_len: u8) -> Result<[u8; OTP_LEN]> {
        let nonce = make_nonce(inputs.sender, inputs.counter, NONCE_FLAG_OTP);
        let otp = CcmStar::new(inputs.key).otp(&nonce, &[payload_len])?;
        Ok(*otp.as_bytes())
    }
}

// =============================================================================
// Payload frame headers
// =============================================================================

/// Write a payload frame header, returning its length
///
/// # Errors
///
/// `Error::BufferTooSmall`.
pub fn create_payload_header(
    subtype: Subtype,
    is_command: bool,
    pending_frame_len: Option<u8>,
    source: Option<&LinkAddr>,
    seqno: Option<u8>,
    buf: &mut [u8],
) -> Result<usize> {
    let mut at = 0usize;
    let mut type_byte = POTR_EXTENDED_FRAME_TYPE;
    if is_command {
        type_byte |= IS_COMMAND_FLAG;
    }
    if pending_frame_len.is_some() {
        type_byte |= FRAME_PENDING_FLAG;
    }
    *buf.get_mut(at).ok_or(Error::BufferTooSmall)? = type_byte;
    at += 1;

    if matches!(subtype, Subtype::Hello | Subtype::HelloAck) {
        let source = source.ok_or(Error::MalformedCommand)?;
        buf.get_mut(at..at + LINKADDR_LEN)
            .ok_or(Error::BufferTooSmall)?
            .copy_from_slice(source.as_bytes());
        at += LINKADDR_LEN;
    }
    if subtype == Subtype::Normal {
        *buf.get_mut(at).ok_or(Error::BufferTooSmall)? = seqno.unwrap_or(0);
        at += 1;
    }
    if let Some(len) = pending_frame_len {
        *buf.get_mut(at).ok_or(Error::BufferTooSmall)? = len;
        at += 1;
    }
    Ok(at)
}

/// Parse a payload frame header
///
/// # Errors
///
/// `Error::FrameTooShort`, `Error::UnsupportedFrame` for a foreign type
/// byte, `Error::MalformedCommand` for a zero pending length.
pub fn parse_payload_header(subtype: Subtype, buf: &[u8]) -> Result<PayloadHeader> {
    let type_byte = *buf.first().ok_or(Error::FrameTooShort)?;
    if type_byte & FRAME_TYPE_MASK != POTR_EXTENDED_FRAME_TYPE {
        return Err(Error::UnsupportedFrame);
    }
    let is_command = type_byte & IS_COMMAND_FLAG != 0;
    let frame_pending = type_byte & FRAME_PENDING_FLAG != 0;
    let mut at = 1usize;

    let mut source = None;
    if matches!(subtype, Subtype::Hello | Subtype::HelloAck) {
        source = Some(
            LinkAddr::from_slice(buf.get(at..at + LINKADDR_LEN).ok_or(Error::FrameTooShort)?)
                .ok_or(Error::FrameTooShort)?,
        );
        at += LINKADDR_LEN;
    }

    let mut seqno = None;
    if subtype == Subtype::Normal {
        seqno = Some(*buf.get(at).ok_or(Error::FrameTooShort)?);
        at += 1;
    }

    let mut pending_frame_len = None;
    if frame_pending {
        let len = *buf.get(at).ok_or(Error::FrameTooShort)?;
        if len == 0 {
            return Err(Error::MalformedCommand);
        }
        pending_frame_len = Some(len);
        at += 1;
    }

    Ok(PayloadHeader {
        subtype,
        is_command,
        pending_frame_len,
        source,
        seqno,
        len: at,
    })
}

// =============================================================================
// Acknowledgment frames and phases
// =============================================================================

/// Write a CSL phase: shifted right and truncated to two bytes
pub fn write_phase(phase: u32, buf: &mut [u8; 2]) {
    let shifted = phase >> CSL_PHASE_SHIFT;
    buf[0] = (shifted >> 8) as u8;
    buf[1] = shifted as u8;
}

/// Recover a CSL phase written by [`write_phase`]
#[must_use]
pub fn parse_phase(buf: &[u8; 2]) -> u32 {
    ((u32::from(buf[0]) << 8) | u32::from(buf[1])) << CSL_PHASE_SHIFT
}

/// Build an acknowledgment frame, returning its length
///
/// HELLOACK acknowledgments are bare: no key is shared yet, so they carry
/// neither phase nor MIC. All others embed the receiver's phase (unless
/// acknowledging a burst continuation) and a pairwise MIC over the whole
/// acknowledgment.
///
/// # Errors
///
/// `Error::BufferTooSmall`.
pub fn create_acknowledgment(
    phase: Option<u32>,
    key: Option<(&Aes128Key, &LinkAddr, u32)>,
    buf: &mut [u8],
) -> Result<usize> {
    let mut at = 0usize;
    *buf.get_mut(at).ok_or(Error::BufferTooSmall)? = POTR_EXTENDED_FRAME_TYPE;
    at += 1;

    if let Some(phase) = phase {
        let mut bytes = [0u8; 2];
        write_phase(phase, &mut bytes);
        buf.get_mut(at..at + 2)
            .ok_or(Error::BufferTooSmall)?
            .copy_from_slice(&bytes);
        at += 2;
    }

    if let Some((key, addr, counter)) = key {
        let nonce = acknowledgment_nonce(addr, counter);
        let mic = CcmStar::new(key).tag(&nonce, &buf[..at])?;
        buf.get_mut(at..at + MIC_LEN)
            .ok_or(Error::BufferTooSmall)?
            .copy_from_slice(mic.as_bytes());
        at += MIC_LEN;
    }
    Ok(at)
}

/// Verify a secured acknowledgment frame and return its phase, if present
///
/// # Errors
///
/// `Error::FrameTooShort` or `Error::AuthenticationFailed`.
pub fn verify_acknowledgment(
    buf: &[u8],
    key: &Aes128Key,
    sender: &LinkAddr,
    counter: u32,
) -> Result<Option<u32>> {
    if buf.len() < 1 + MIC_LEN {
        return Err(Error::FrameTooShort);
    }
    let (body, mic) = buf.split_at(buf.len() - MIC_LEN);
    let nonce = acknowledgment_nonce(sender, counter);
    let expected = CcmStar::new(key).tag(&nonce, body)?;
    if !expected.verify(mic) {
        return Err(Error::AuthenticationFailed);
    }
    match body.len() {
        3 => Ok(Some(parse_phase(&[body[1], body[2]]))),
        _ => Ok(None),
    }
}

fn acknowledgment_nonce(addr: &LinkAddr, counter: u32) -> CcmNonce {
    make_nonce(addr, counter, NONCE_FLAG_ACKNOWLEDGMENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use akes_common::config::BucketParams;

    const PAN_ID: u16 = 0xABCD;
    const CHANNEL: u8 = 15;

    fn framer() -> PotrFramer {
        PotrFramer::new(&FramerConfig::DEFAULT, PAN_ID, Ticks::ZERO).unwrap()
    }

    fn otp_key() -> Aes128Key {
        Aes128Key::new([0x31; 16])
    }

    #[test]
    fn test_hello_wake_up_roundtrip() {
        let tx = framer();
        let mut rx = framer();
        let mut buf = [0u8; 16];
        let len = tx
            .create_wake_up_frame(
                &WakeUpSpec {
                    subtype: Subtype::Hello,
                    channel: CHANNEL,
                    rendezvous_time: 700,
                    payload_len: 0,
                    receiver: None,
                },
                &mut buf,
            )
            .unwrap();
        // type + pan id + long rendezvous
        assert_eq!(len, 1 + 2 + 2);

        let parsed = rx
            .parse_wake_up_frame(&buf[..len], CHANNEL, Ticks::ZERO)
            .unwrap();
        assert_eq!(parsed.subtype, Subtype::Hello);
        assert_eq!(parsed.rendezvous_time, 700);
        assert!(parsed.otp.is_none());
    }

    #[test]
    fn test_wrong_channel_rejected() {
        let tx = framer();
        let mut rx = framer();
        let mut buf = [0u8; 16];
        let len = tx
            .create_wake_up_frame(
                &WakeUpSpec {
                    subtype: Subtype::Hello,
                    channel: CHANNEL,
                    rendezvous_time: 1,
                    payload_len: 0,
                    receiver: None,
                },
                &mut buf,
            )
            .unwrap();
        assert_eq!(
            rx.parse_wake_up_frame(&buf[..len], CHANNEL + 1, Ticks::ZERO),
            Err(Error::UnsupportedFrame)
        );
    }

    #[test]
    fn test_normal_wake_up_otp_verifies() {
        let tx = framer();
        let mut rx = framer();
        let key = otp_key();
        let sender = LinkAddr::new([4; 8]);
        let inputs = OtpInputs {
            key: &key,
            sender: &sender,
            counter: 99,
            index: 7,
        };
        let mut buf = [0u8; 16];
        let len = tx
            .create_wake_up_frame(
                &WakeUpSpec {
                    subtype: Subtype::Normal,
                    channel: CHANNEL,
                    rendezvous_time: 3,
                    payload_len: 42,
                    receiver: Some(inputs),
                },
                &mut buf,
            )
            .unwrap();
        assert_eq!(len, 1 + 1 + 1 + OTP_LEN + 1);

        let parsed = rx
            .parse_wake_up_frame(&buf[..len], CHANNEL, Ticks::ZERO)
            .unwrap();
        assert_eq!(parsed.index, Some(7));
        assert_eq!(parsed.payload_len, Some(42));
        let inputs = OtpInputs {
            key: &key,
            sender: &sender,
            counter: 99,
            index: 7,
        };
        PotrFramer::verify_otp(&parsed, &inputs).unwrap();

        // A different announced length must not verify
        let mut tampered = parsed;
        tampered.payload_len = Some(43);
        assert_eq!(
            PotrFramer::verify_otp(&tampered, &inputs),
            Err(Error::AuthenticationFailed)
        );
    }

    #[test]
    fn test_hello_bucket_gates_wake_ups() {
        let tx = framer();
        let mut rx = PotrFramer::new(
            &FramerConfig {
                inc_hello_bucket: BucketParams::new(2, 15),
                ..FramerConfig::DEFAULT
            },
            PAN_ID,
            Ticks::ZERO,
        )
        .unwrap();
        let mut buf = [0u8; 16];
        let len = tx
            .create_wake_up_frame(
                &WakeUpSpec {
                    subtype: Subtype::Hello,
                    channel: CHANNEL,
                    rendezvous_time: 1,
                    payload_len: 0,
                    receiver: None,
                },
                &mut buf,
            )
            .unwrap();

        assert!(rx.parse_wake_up_frame(&buf[..len], CHANNEL, Ticks::ZERO).is_ok());
        assert!(rx.parse_wake_up_frame(&buf[..len], CHANNEL, Ticks::ZERO).is_ok());
        assert_eq!(
            rx.parse_wake_up_frame(&buf[..len], CHANNEL, Ticks::ZERO),
            Err(Error::RateLimited)
        );
        // The bucket drains over time
        assert!(rx
            .parse_wake_up_frame(&buf[..len], CHANNEL, Ticks::from_secs(15))
            .is_ok());
    }

    #[test]
    fn test_hello_rendezvous_bounded() {
        let tx = framer();
        let mut rx = framer();
        let mut buf = [0u8; 16];
        let len = tx
            .create_wake_up_frame(
                &WakeUpSpec {
                    subtype: Subtype::Hello,
                    channel: CHANNEL,
                    rendezvous_time: u16::MAX,
                    payload_len: 0,
                    receiver: None,
                },
                &mut buf,
            )
            .unwrap();
        assert_eq!(
            rx.parse_wake_up_frame(&buf[..len], CHANNEL, Ticks::ZERO),
            Err(Error::RendezvousTooLate)
        );
        // Rejection happens before the bucket, so legitimate HELLOs
        // still get through afterwards
        let len = tx
            .create_wake_up_frame(
                &WakeUpSpec {
                    subtype: Subtype::Hello,
                    channel: CHANNEL,
                    rendezvous_time: 700,
                    payload_len: 0,
                    receiver: None,
                },
                &mut buf,
            )
            .unwrap();
        assert!(rx.parse_wake_up_frame(&buf[..len], CHANNEL, Ticks::ZERO).is_ok());
    }

    #[test]
    fn test_phase_locked_rendezvous_bounded() {
        let tx = framer();
        let mut rx = framer();
        let key = otp_key();
        let sender = LinkAddr::new([4; 8]);
        let mut buf = [0u8; 16];
        let len = tx
            .create_wake_up_frame(
                &WakeUpSpec {
                    subtype: Subtype::Normal,
                    channel: CHANNEL,
                    rendezvous_time: 9,
                    payload_len: 42,
                    receiver: Some(OtpInputs {
                        key: &key,
                        sender: &sender,
                        counter: 1,
                        index: 0,
                    }),
                },
                &mut buf,
            )
            .unwrap();
        assert_eq!(
            rx.parse_wake_up_frame(&buf[..len], CHANNEL, Ticks::ZERO),
            Err(Error::RendezvousTooLate)
        );
    }

    #[test]
    fn test_payload_header_roundtrip() {
        let source = LinkAddr::new([9; 8]);
        let mut buf = [0u8; 16];
        let len = create_payload_header(
            Subtype::Hello,
            true,
            None,
            Some(&source),
            None,
            &mut buf,
        )
        .unwrap();
        assert_eq!(len, 1 + LINKADDR_LEN);

        let header = parse_payload_header(Subtype::Hello, &buf[..len]).unwrap();
        assert!(header.is_command);
        assert_eq!(header.source, Some(source));
        assert_eq!(header.len, len);
    }

    #[test]
    fn test_normal_payload_header_has_seqno() {
        let mut buf = [0u8; 16];
        let len =
            create_payload_header(Subtype::Normal, false, Some(40), None, Some(7), &mut buf)
                .unwrap();
        let header = parse_payload_header(Subtype::Normal, &buf[..len]).unwrap();
        assert_eq!(header.seqno, Some(7));
        assert_eq!(header.pending_frame_len, Some(40));
    }

    #[test]
    fn test_zero_pending_length_rejected() {
        let mut buf = [0u8; 16];
        let len =
            create_payload_header(Subtype::Normal, false, Some(1), None, Some(0), &mut buf)
                .unwrap();
        buf[len - 1] = 0;
        assert_eq!(
            parse_payload_header(Subtype::Normal, &buf[..len]),
            Err(Error::MalformedCommand)
        );
    }

    #[test]
    fn test_subtype_command_consistency() {
        assert!(Subtype::Hello.matches_command(CMD_HELLO));
        assert!(!Subtype::Hello.matches_command(CMD_ACK));
        assert!(Subtype::HelloAck.matches_command(CMD_HELLOACK_P));
        assert!(Subtype::Normal.matches_command(0x77));
    }

    #[test]
    fn test_phase_roundtrip_quantized() {
        let phase = 0x0001_2345;
        let mut buf = [0u8; 2];
        write_phase(phase, &mut buf);
        let recovered = parse_phase(&buf);
        // The shift quantizes the low bits away
        assert_eq!(recovered, phase & !((1 << CSL_PHASE_SHIFT) - 1));
    }

    #[test]
    fn test_acknowledgment_roundtrip() {
        let key = otp_key();
        let receiver = LinkAddr::new([2; 8]);
        let mut buf = [0u8; 16];
        let len = create_acknowledgment(Some(0x40), Some((&key, &receiver, 5)), &mut buf).unwrap();
        assert_eq!(len, 1 + 2 + MIC_LEN);

        let phase = verify_acknowledgment(&buf[..len], &key, &receiver, 5).unwrap();
        assert_eq!(phase, Some(0x40));

        buf[1] ^= 1;
        assert_eq!(
            verify_acknowledgment(&buf[..len], &key, &receiver, 5),
            Err(Error::AuthenticationFailed)
        );
    }

    #[test]
    fn test_helloack_acknowledgment_is_bare() {
        let mut buf = [0u8; 16];
        let len = create_acknowledgment(None, None, &mut buf).unwrap();
        assert_eq!(len, 1);
        assert_eq!(buf[0], POTR_EXTENDED_FRAME_TYPE);
    }
}
