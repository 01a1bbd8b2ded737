// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Command frame dispatch
//!
//! Command frames share one 802.15.4 frame type and are told apart by their
//! first payload byte. The broker walks the registered handlers in order
//! and hands the frame to each until one consumes it. Handlers never see
//! frames for identifiers they do not claim to care about beyond returning
//! [`HandlerResult::Unconsumed`].

use akes_common::time::Ticks;
use akes_common::types::LinkAddr;
use akes_common::{Error, Result};

/// A received command frame, borrowed from the radio buffer
#[derive(Debug, Clone, Copy)]
pub struct IncomingCommand<'a> {
    /// Command frame identifier (first payload byte)
    pub cmd_id: u8,
    /// Whole payload including the identifier
    pub payload: &'a [u8],
    /// Link-layer source address
    pub src: LinkAddr,
    /// Destination: broadcast or our address
    pub is_broadcast: bool,
    /// Receive timestamp
    pub now: Ticks,
}

impl<'a> IncomingCommand<'a> {
    /// Build a command from a raw payload
    ///
    /// # Errors
    ///
    /// `Error::FrameTooShort` for an empty payload.
    pub fn from_payload(
        payload: &'a [u8],
        src: LinkAddr,
        is_broadcast: bool,
        now: Ticks,
    ) -> Result<Self> {
        let cmd_id = *payload.first().ok_or(Error::FrameTooShort)?;
        Ok(Self {
            cmd_id,
            payload,
            src,
            is_broadcast,
            now,
        })
    }
}

/// A handler's verdict on a command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerResult {
    /// The frame was this handler's; stop dispatching
    Consumed,
    /// Not ours; offer the frame to the next handler
    Unconsumed,
}

/// A consumer of command frames
pub trait CommandHandler {
    /// Inspect a command frame
    ///
    /// # Errors
    ///
    /// A handler that recognizes the identifier but rejects the frame
    /// (authentication, rate limit, state) returns the error; the frame
    /// still counts as consumed.
    fn handle(&mut self, cmd: &IncomingCommand<'_>) -> Result<HandlerResult>;
}

/// Offer a command frame to each handler in turn
///
/// # Errors
///
/// `Error::UnknownCommand` if no handler consumed the frame, otherwise
/// whatever the consuming handler returned.
pub fn dispatch(
    handlers: &mut [&mut dyn CommandHandler],
    cmd: &IncomingCommand<'_>,
) -> Result<()> {
    for handler in handlers {
        match handler.handle(cmd) {
            Ok(HandlerResult::Consumed) => return Ok(()),
            Ok(HandlerResult::Unconsumed) => {}
            Err(e) => return Err(e),
        }
    }
    Err(Error::UnknownCommand)
}
