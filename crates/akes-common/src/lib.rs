// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Nightjar AKES Common Library
//!
//! This crate provides the types, error definitions, configuration
//! structures and utilities shared across the AKES link-layer stack.
//!
//! # Features
//!
//! - `std`: Enable standard library support (disabled by default for embedded)
//! - `defmt`: Enable defmt formatting support for embedded debugging
//!
//! # Security
//!
//! Key-bearing buffers implement `Zeroize` for secure memory cleanup.
//! No heap allocations are performed; all buffers use fixed-size arrays or
//! heapless collections.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod constants;
pub mod errors;
pub mod log;
pub mod time;
pub mod types;

// Re-export commonly used items
pub use config::AkesConfig;
pub use errors::{Error, Result};
pub use time::{Deadline, Ticks};
pub use types::*;
