// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Protocol constants for the Nightjar AKES stack
//!
//! All sizes and limits are chosen for 802.15.4-class radios and
//! memory-constrained nodes.

// =============================================================================
// Cryptographic Constants
// =============================================================================

/// AES-128 key size in bytes
pub const AES128_KEY_LEN: usize = 16;

/// AES block size in bytes
pub const AES_BLOCK_LEN: usize = 16;

/// Handshake challenge size in bytes (two challenges fill one AES block)
pub const CHALLENGE_LEN: usize = 8;

/// CCM* message integrity code size in bytes
pub const MIC_LEN: usize = 8;

/// One-time password size in bytes (truncated CCM* tag)
pub const OTP_LEN: usize = 4;

/// CCM* nonce size in bytes
pub const CCM_NONCE_LEN: usize = 13;

// =============================================================================
// Link-Layer Constants
// =============================================================================

/// Link-layer (EUI-64) address size in bytes
pub const LINKADDR_LEN: usize = 8;

/// Maximum link-layer frame size in bytes
pub const MAX_FRAME_LEN: usize = 127;

// =============================================================================
// Command Frame Identifiers
// =============================================================================

/// HELLO command frame identifier
pub const CMD_HELLO: u8 = 0x0A;

/// HELLOACK command frame identifier
pub const CMD_HELLOACK: u8 = 0x0B;

/// HELLOACK variant sent when the HELLO sender is already permanent
pub const CMD_HELLOACK_P: u8 = 0x1B;

/// ACK command frame identifier
pub const CMD_ACK: u8 = 0x0C;

/// ANNOUNCE command frame identifier
pub const CMD_ANNOUNCE: u8 = 0x0D;

/// UPDATE command frame identifier
pub const CMD_UPDATE: u8 = 0x0E;

// =============================================================================
// Neighbor Table Constants
// =============================================================================

/// Size of the neighbor arena; slot indexes are the wire-format indexes
pub const MAX_NEIGHBORS: usize = 16;

/// Maximum number of simultaneous tentative neighbors
pub const MAX_TENTATIVES: usize = 5;

// =============================================================================
// Timing Defaults (seconds)
// =============================================================================

/// Upper bound on HELLOACK delay plus ACK delay
pub const MAX_WAITING_PERIOD_SECS: u32 = 15;

/// Worst-case latency of a single HELLOACK or ACK transmission
pub const HELLOACK_AND_ACK_DELAY_SECS: u32 = 5;

/// Lifetime of a permanent neighbor without prolongation
pub const NBR_LIFETIME_SECS: u32 = 300;

/// Lifetime of a cached sequence number
pub const SEQNO_LIFETIME_SECS: u32 = 20;

// =============================================================================
// Retransmission Budgets
// =============================================================================

/// Maximum HELLOACK retransmissions
pub const MAX_HELLOACK_RETRANSMISSIONS: u8 = 2;

/// Maximum ACK retransmissions
pub const MAX_ACK_RETRANSMISSIONS: u8 = 2;

/// Maximum UPDATE retransmissions before deletion
pub const MAX_UPDATE_RETRANSMISSIONS: u8 = 5;

// =============================================================================
// Trickle Defaults
// =============================================================================

/// Minimum Trickle interval in seconds (also max(30, 2 * waiting period))
pub const TRICKLE_IMIN_SECS: u32 = 30;

/// Number of interval doublings up to the maximum interval
pub const TRICKLE_MAX_DOUBLINGS: u8 = 8;

/// Trickle redundancy constant k
pub const TRICKLE_REDUNDANCY: u8 = 2;

// =============================================================================
// CSL / POTR Constants
// =============================================================================

/// Extended 802.15.4 frame type byte carrying the POTR subtype in bits 6..7
pub const POTR_EXTENDED_FRAME_TYPE: u8 = 0x07 | (0x06 << 3);

/// POTR subtype of HELLO wake-up frames
pub const POTR_SUBTYPE_HELLO: u8 = 0x00;

/// POTR subtype of HELLOACK wake-up frames
pub const POTR_SUBTYPE_HELLOACK: u8 = 0x01;

/// POTR subtype of ACK wake-up frames
pub const POTR_SUBTYPE_ACK: u8 = 0x02;

/// POTR subtype of all other frames
pub const POTR_SUBTYPE_NORMAL: u8 = 0x03;

/// Right shift applied to CSL phases before they go on the wire
pub const CSL_PHASE_SHIFT: u32 = 5;

/// Longest acceptable HELLO rendezvous time, in remaining wake-up frames;
/// a HELLO train spans at most one wake-up interval plus margin
pub const POTR_MAX_HELLO_RENDEZVOUS: u16 = 1000;

/// Longest acceptable rendezvous time toward a phase-locked receiver;
/// covers the residual clock uncertainty between synchronized neighbors
pub const POTR_MAX_RENDEZVOUS: u8 = 8;
