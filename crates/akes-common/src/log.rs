// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 Nightjar Networks

//! Logging infrastructure for the AKES stack
//!
//! Lightweight, no_std compatible logging into a circular in-memory buffer.
//! Entries can be drained over a debug channel after the fact.
//!
//! # Security
//!
//! Key material, challenges-in-derivation and MICs must NEVER be logged.
//! Addresses and error codes are fine.

use core::fmt::{self, Write};
use heapless::String;

use crate::time::Ticks;

/// Maximum log message length
pub const MAX_LOG_MESSAGE_LEN: usize = 96;

/// Log buffer size (number of entries)
pub const LOG_BUFFER_SIZE: usize = 32;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    /// Errors that require immediate attention
    Error = 0,
    /// Warnings, including rejected frames and rate-limit hits
    Warn = 1,
    /// Informational messages (session lifecycle)
    Info = 2,
    /// Debug messages (development only)
    Debug = 3,
}

impl LogLevel {
    /// Get the log level name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }

    /// Get a short prefix for the log level
    #[must_use]
    pub const fn prefix(&self) -> char {
        match self {
            Self::Error => 'E',
            Self::Warn => 'W',
            Self::Info => 'I',
            Self::Debug => 'D',
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single log record
#[derive(Clone)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Tick timestamp
    pub timestamp: Ticks,
    /// Module/component tag
    pub module: &'static str,
    /// Log message
    pub message: String<MAX_LOG_MESSAGE_LEN>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:010}] {} [{}] {}",
            self.timestamp.as_u64(),
            self.level.prefix(),
            self.module,
            self.message
        )
    }
}

impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Circular log buffer
pub struct LogBuffer {
    entries: [Option<LogEntry>; LOG_BUFFER_SIZE],
    write_index: usize,
    count: usize,
    overwritten: u32,
    min_level: LogLevel,
}

impl LogBuffer {
    /// Create a new empty log buffer
    #[must_use]
    pub const fn new() -> Self {
        const NONE: Option<LogEntry> = None;
        Self {
            entries: [NONE; LOG_BUFFER_SIZE],
            write_index: 0,
            count: 0,
            overwritten: 0,
            min_level: LogLevel::Info,
        }
    }

    /// Set the minimum log level
    pub fn set_min_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Check whether a log level would be recorded
    #[must_use]
    pub const fn should_log(&self, level: LogLevel) -> bool {
        (level as u8) <= (self.min_level as u8)
    }

    /// Record a formatted message
    pub fn log(
        &mut self,
        level: LogLevel,
        timestamp: Ticks,
        module: &'static str,
        args: fmt::Arguments<'_>,
    ) {
        if !self.should_log(level) {
            return;
        }

        let mut message = String::<MAX_LOG_MESSAGE_LEN>::new();
        let _ = message.write_fmt(args);

        if self.count == LOG_BUFFER_SIZE {
            self.overwritten = self.overwritten.saturating_add(1);
        }
        self.entries[self.write_index] = Some(LogEntry {
            level,
            timestamp,
            module,
            message,
        });
        self.write_index = (self.write_index + 1) % LOG_BUFFER_SIZE;
        if self.count < LOG_BUFFER_SIZE {
            self.count += 1;
        }
    }

    /// Number of buffered entries
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Check if the buffer is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of entries lost to wrap-around since creation
    #[must_use]
    pub const fn overwritten(&self) -> u32 {
        self.overwritten
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = None;
        }
        self.write_index = 0;
        self.count = 0;
    }

    /// Iterate over entries, oldest first
    pub fn iter(&self) -> LogBufferIter<'_> {
        LogBufferIter {
            buffer: self,
            index: 0,
            remaining: self.count,
        }
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over log buffer entries
pub struct LogBufferIter<'a> {
    buffer: &'a LogBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for LogBufferIter<'a> {
    type Item = &'a LogEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let start_index = if self.buffer.count < LOG_BUFFER_SIZE {
            0
        } else {
            self.buffer.write_index
        };

        let actual_index = (start_index + self.index) % LOG_BUFFER_SIZE;
        self.index += 1;
        self.remaining -= 1;

        self.buffer.entries[actual_index].as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($buffer:expr, $ts:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Error, $ts, $module, format_args!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($buffer:expr, $ts:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Warn, $ts, $module, format_args!($($arg)*))
    };
}

/// Log an informational message
#[macro_export]
macro_rules! log_info {
    ($buffer:expr, $ts:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Info, $ts, $module, format_args!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($buffer:expr, $ts:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Debug, $ts, $module, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_filter() {
        let mut buf = LogBuffer::new();
        buf.set_min_level(LogLevel::Warn);
        log_debug!(buf, Ticks::ZERO, "test", "dropped");
        log_warn!(buf, Ticks::ZERO, "test", "kept");
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.iter().next().unwrap().message.as_str(), "kept");
    }

    #[test]
    fn test_wraparound_counts_losses() {
        let mut buf = LogBuffer::new();
        for i in 0..(LOG_BUFFER_SIZE + 3) {
            log_info!(buf, Ticks::new(i as u64), "test", "entry {}", i);
        }
        assert_eq!(buf.len(), LOG_BUFFER_SIZE);
        assert_eq!(buf.overwritten(), 3);
        // Oldest surviving entry is number 3
        assert_eq!(buf.iter().next().unwrap().timestamp, Ticks::new(3));
    }
}
