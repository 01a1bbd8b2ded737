// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Handshake command frames
//!
//! Wire layouts of the four command frames plus the nonce construction the
//! whole stack shares. Frames are parsed and written here; encrypting the
//! group key field and computing MICs stays with the handshake context,
//! which holds the keys.
//!
//! Layouts (lengths in bytes):
//!
//! ```text
//! HELLO:    | cmd 1 | challenge 8 |
//! HELLOACK: | cmd 1 | challenge 8 | index 1 | group key 16 (enc) | MIC 8 |
//! ACK:      | cmd 1 | index 1 | group key 16 (enc) | MIC 8 |
//! UPDATE:   | cmd 1 |                     (secured by the MAC strategy)
//! ```
//!
//! The clear prefix up to the group key field is associated data of the
//! CCM* operation, so the index cannot be spliced.

use akes_common::constants::{
    AES128_KEY_LEN, CCM_NONCE_LEN, CMD_ACK, CMD_HELLO, CMD_HELLOACK, CMD_HELLOACK_P, CMD_UPDATE,
    LINKADDR_LEN, MIC_LEN,
};
use akes_common::types::{Challenge, LinkAddr};
use akes_common::{Error, Result};
use akes_crypto::CcmNonce;

/// Directional flag byte of broadcast nonces
pub const NONCE_FLAG_BROADCAST: u8 = 0x80;

/// Directional flag byte of unicast nonces
pub const NONCE_FLAG_UNICAST: u8 = 0x00;

/// Flag byte of acknowledgement-frame nonces
pub const NONCE_FLAG_ACKNOWLEDGMENT: u8 = 0x40;

/// Flag byte of OTP nonces
pub const NONCE_FLAG_OTP: u8 = 0x20;

/// Build the 13-byte CCM* nonce: address, frame counter, flags
///
/// Handshake frames use the command identifier as the flag byte; their
/// freshness comes from the challenges, so the counter is zero there.
#[must_use]
pub fn make_nonce(addr: &LinkAddr, frame_counter: u32, flags: u8) -> CcmNonce {
    let mut bytes = [0u8; CCM_NONCE_LEN];
    bytes[..LINKADDR_LEN].copy_from_slice(addr.as_bytes());
    bytes[LINKADDR_LEN..LINKADDR_LEN + 4].copy_from_slice(&frame_counter.to_be_bytes());
    bytes[LINKADDR_LEN + 4] = flags;
    CcmNonce::new(bytes)
}

// =============================================================================
// HELLO
// =============================================================================

/// A broadcast HELLO opening a handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelloFrame {
    /// The initiator's challenge
    pub challenge: Challenge,
}

impl HelloFrame {
    /// Serialized length
    pub const LEN: usize = 1 + Challenge::SIZE;

    /// Write the frame into `buf`, returning the written length
    ///
    /// # Errors
    ///
    /// `Error::BufferTooSmall` if `buf` cannot hold the frame.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::LEN {
            return Err(Error::BufferTooSmall);
        }
        buf[0] = CMD_HELLO;
        buf[1..Self::LEN].copy_from_slice(self.challenge.as_bytes());
        Ok(Self::LEN)
    }

    /// Parse a HELLO from `payload`
    ///
    /// # Errors
    ///
    /// `Error::FrameTooShort` or `Error::MalformedCommand`.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::LEN {
            return Err(Error::FrameTooShort);
        }
        if payload[0] != CMD_HELLO {
            return Err(Error::MalformedCommand);
        }
        let challenge =
            Challenge::from_slice(&payload[1..Self::LEN]).ok_or(Error::MalformedCommand)?;
        Ok(Self { challenge })
    }
}

// =============================================================================
// HELLOACK
// =============================================================================

/// A unicast HELLOACK answering a HELLO
///
/// `group_key` is the responder's broadcast key, encrypted under the freshly
/// derived pairwise key. `p_flag` marks the variant sent when the HELLO
/// sender was already permanent, so the initiator can tell a lost-state peer
/// from a fresh one.
#[derive(Debug, Clone)]
pub struct HelloAckFrame {
    /// The responder's challenge
    pub challenge: Challenge,
    /// The responder's slot index for the initiator
    pub index: u8,
    /// Encrypted group key field
    pub group_key: [u8; AES128_KEY_LEN],
    /// CCM* MIC over header and group key
    pub mic: [u8; MIC_LEN],
    /// Set for the HELLOACK-P variant
    pub p_flag: bool,
}

impl HelloAckFrame {
    /// Serialized length
    pub const LEN: usize = 1 + Challenge::SIZE + 1 + AES128_KEY_LEN + MIC_LEN;

    /// Length of the clear prefix that is CCM* associated data
    pub const AAD_LEN: usize = 1 + Challenge::SIZE + 1;

    /// Offset of the encrypted group key field
    pub const GROUP_KEY_OFFSET: usize = Self::AAD_LEN;

    /// Write the frame into `buf`, returning the written length
    ///
    /// # Errors
    ///
    /// `Error::BufferTooSmall` if `buf` cannot hold the frame.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::LEN {
            return Err(Error::BufferTooSmall);
        }
        buf[0] = if self.p_flag { CMD_HELLOACK_P } else { CMD_HELLOACK };
        buf[1..=Challenge::SIZE].copy_from_slice(self.challenge.as_bytes());
        buf[Self::AAD_LEN - 1] = self.index;
        buf[Self::GROUP_KEY_OFFSET..Self::GROUP_KEY_OFFSET + AES128_KEY_LEN]
            .copy_from_slice(&self.group_key);
        buf[Self::LEN - MIC_LEN..Self::LEN].copy_from_slice(&self.mic);
        Ok(Self::LEN)
    }

    /// Parse a HELLOACK or HELLOACK-P from `payload`
    ///
    /// # Errors
    ///
    /// `Error::FrameTooShort` or `Error::MalformedCommand`.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::LEN {
            return Err(Error::FrameTooShort);
        }
        let p_flag = match payload[0] {
            CMD_HELLOACK => false,
            CMD_HELLOACK_P => true,
            _ => return Err(Error::MalformedCommand),
        };
        let challenge =
            Challenge::from_slice(&payload[1..=Challenge::SIZE]).ok_or(Error::MalformedCommand)?;
        let mut group_key = [0u8; AES128_KEY_LEN];
        group_key
            .copy_from_slice(&payload[Self::GROUP_KEY_OFFSET..Self::GROUP_KEY_OFFSET + AES128_KEY_LEN]);
        let mut mic = [0u8; MIC_LEN];
        mic.copy_from_slice(&payload[Self::LEN - MIC_LEN..Self::LEN]);
        Ok(Self {
            challenge,
            index: payload[Self::AAD_LEN - 1],
            group_key,
            mic,
            p_flag,
        })
    }
}

// =============================================================================
// ACK
// =============================================================================

/// A unicast ACK completing the handshake
#[derive(Debug, Clone)]
pub struct AckFrame {
    /// The initiator's slot index for the responder
    pub index: u8,
    /// Encrypted group key field
    pub group_key: [u8; AES128_KEY_LEN],
    /// CCM* MIC over header and group key
    pub mic: [u8; MIC_LEN],
}

impl AckFrame {
    /// Serialized length
    pub const LEN: usize = 1 + 1 + AES128_KEY_LEN + MIC_LEN;

    /// Length of the clear prefix that is CCM* associated data
    pub const AAD_LEN: usize = 2;

    /// Offset of the encrypted group key field
    pub const GROUP_KEY_OFFSET: usize = Self::AAD_LEN;

    /// Write the frame into `buf`, returning the written length
    ///
    /// # Errors
    ///
    /// `Error::BufferTooSmall` if `buf` cannot hold the frame.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::LEN {
            return Err(Error::BufferTooSmall);
        }
        buf[0] = CMD_ACK;
        buf[1] = self.index;
        buf[Self::GROUP_KEY_OFFSET..Self::GROUP_KEY_OFFSET + AES128_KEY_LEN]
            .copy_from_slice(&self.group_key);
        buf[Self::LEN - MIC_LEN..Self::LEN].copy_from_slice(&self.mic);
        Ok(Self::LEN)
    }

    /// Parse an ACK from `payload`
    ///
    /// # Errors
    ///
    /// `Error::FrameTooShort` or `Error::MalformedCommand`.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::LEN {
            return Err(Error::FrameTooShort);
        }
        if payload[0] != CMD_ACK {
            return Err(Error::MalformedCommand);
        }
        let mut group_key = [0u8; AES128_KEY_LEN];
        group_key
            .copy_from_slice(&payload[Self::GROUP_KEY_OFFSET..Self::GROUP_KEY_OFFSET + AES128_KEY_LEN]);
        let mut mic = [0u8; MIC_LEN];
        mic.copy_from_slice(&payload[Self::LEN - MIC_LEN..Self::LEN]);
        Ok(Self {
            index: payload[1],
            group_key,
            mic,
        })
    }
}

// =============================================================================
// UPDATE
// =============================================================================

/// A unicast UPDATE probing a silent neighbor
///
/// Carries no fields of its own; authenticity comes from the MAC strategy's
/// unicast MIC, and any authentic answer prolongs the neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateFrame;

impl UpdateFrame {
    /// Serialized length before the strategy appends its MIC
    pub const LEN: usize = 1;

    /// Write the frame into `buf`, returning the written length
    ///
    /// # Errors
    ///
    /// `Error::BufferTooSmall` if `buf` cannot hold the frame.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(Error::BufferTooSmall);
        }
        buf[0] = CMD_UPDATE;
        Ok(Self::LEN)
    }

    /// Parse an UPDATE from `payload`
    ///
    /// # Errors
    ///
    /// `Error::FrameTooShort` or `Error::MalformedCommand`.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.is_empty() {
            return Err(Error::FrameTooShort);
        }
        if payload[0] != CMD_UPDATE {
            return Err(Error::MalformedCommand);
        }
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_roundtrip() {
        let frame = HelloFrame {
            challenge: Challenge::new([1, 2, 3, 4, 5, 6, 7, 8]),
        };
        let mut buf = [0u8; HelloFrame::LEN];
        assert_eq!(frame.write_to(&mut buf).unwrap(), HelloFrame::LEN);
        assert_eq!(buf[0], CMD_HELLO);
        assert_eq!(HelloFrame::parse(&buf).unwrap(), frame);
    }

    #[test]
    fn test_helloack_p_variant() {
        let frame = HelloAckFrame {
            challenge: Challenge::new([9; 8]),
            index: 5,
            group_key: [0xAA; 16],
            mic: [0xBB; 8],
            p_flag: true,
        };
        let mut buf = [0u8; HelloAckFrame::LEN];
        frame.write_to(&mut buf).unwrap();
        assert_eq!(buf[0], CMD_HELLOACK_P);
        let parsed = HelloAckFrame::parse(&buf).unwrap();
        assert!(parsed.p_flag);
        assert_eq!(parsed.index, 5);
        assert_eq!(parsed.group_key, [0xAA; 16]);
        assert_eq!(parsed.mic, [0xBB; 8]);
    }

    #[test]
    fn test_ack_rejects_wrong_command() {
        let mut buf = [0u8; AckFrame::LEN];
        buf[0] = CMD_HELLO;
        assert!(matches!(
            AckFrame::parse(&buf),
            Err(Error::MalformedCommand)
        ));
    }

    #[test]
    fn test_short_frames_rejected() {
        assert!(matches!(
            HelloFrame::parse(&[CMD_HELLO, 1, 2]),
            Err(Error::FrameTooShort)
        ));
        assert!(matches!(
            HelloAckFrame::parse(&[CMD_HELLOACK]),
            Err(Error::FrameTooShort)
        ));
        assert!(matches!(UpdateFrame::parse(&[]), Err(Error::FrameTooShort)));
    }

    #[test]
    fn test_nonce_layout() {
        let addr = LinkAddr::new([1, 2, 3, 4, 5, 6, 7, 8]);
        let nonce = make_nonce(&addr, 0x0102_0304, NONCE_FLAG_BROADCAST);
        let bytes = nonce.as_bytes();
        assert_eq!(&bytes[..8], addr.as_bytes());
        assert_eq!(&bytes[8..12], &[1, 2, 3, 4]);
        assert_eq!(bytes[12], NONCE_FLAG_BROADCAST);
    }

    #[test]
    fn test_nonces_differ_per_direction() {
        let addr = LinkAddr::new([7; 8]);
        let a = make_nonce(&addr, 1, NONCE_FLAG_BROADCAST);
        let b = make_nonce(&addr, 1, NONCE_FLAG_UNICAST);
        assert_ne!(a.as_bytes(), b.as_bytes());
    }
}
