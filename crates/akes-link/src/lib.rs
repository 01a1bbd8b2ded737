// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Adaptive key establishment for 802.15.4 links
//!
//! The link layer of the Nightjar AKES stack:
//!
//! - **Handshake**: HELLO / HELLOACK / ACK three-way session key
//!   establishment with challenge-derived pairwise keys
//! - **Neighbors**: fixed-arena neighbor table whose slot indexes double
//!   as wire-format indexes
//! - **Broadcast security**: pluggable strategies securing broadcasts with
//!   per-receiver MICs, inline or announced ahead of time
//! - **Deletion**: UPDATE probes that retire disappeared neighbors
//! - **Trickle**: density-aware HELLO scheduling
//! - **CSL framer**: wake-up frames with one-time passwords against
//!   denial-of-sleep
//!
//! The crate is radio-agnostic: [`Akes::poll`] returns frames to transmit
//! and the MAC reports transmission outcomes back through the `on_*_sent`
//! callbacks.

#![no_std]
#![warn(missing_docs)]

pub mod broker;
pub mod bucket;
pub mod csl;
pub mod delete;
pub mod frame;
pub mod handshake;
pub mod nbr;
pub mod scheme;
pub mod strategy;
pub mod trickle;

pub use broker::{dispatch, CommandHandler, HandlerResult, IncomingCommand};
pub use bucket::LeakyBucket;
pub use csl::{ParsedWakeUp, PayloadHeader, PotrFramer, Subtype, WakeUpSpec};
pub use delete::{DeleteAction, DeleteService};
pub use frame::{AckFrame, HelloAckFrame, HelloFrame, UpdateFrame};
pub use handshake::{Akes, AkesAction, TxStatus};
pub use nbr::{Neighbor, NeighborTable, PermanentNeighbor, TentativeNeighbor};
pub use scheme::{Scheme, SingleKeyScheme};
pub use strategy::{CoresecStrategy, SecurityStrategy, UnicastStrategy, VerifyResult};
pub use trickle::{Trickle, TrickleEvent};
