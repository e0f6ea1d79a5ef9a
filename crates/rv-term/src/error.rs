// SPDX-License-Identifier: MIT
//
// Error types for the terminal layer.
//
// Only device configuration can fail fatally. Everything that happens after
// raw mode is up (read errors, probe timeouts, malformed escape sequences)
// degrades into a normal event or a fallback value instead of an error.

use std::io;

use thiserror::Error;

/// Which termios call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOp {
    /// `tcgetattr`.
    Get,
    /// `tcsetattr`.
    Set,
}

impl AttrOp {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "read",
            Self::Set => "write",
        }
    }
}

impl std::fmt::Display for AttrOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal terminal configuration failures.
#[derive(Debug, Error)]
pub enum TermError {
    /// The input descriptor is not connected to a terminal.
    #[error("standard input is not a terminal")]
    NotATerminal,

    /// Reading or writing the line-discipline attributes failed.
    #[error("failed to {op} terminal attributes: {source}")]
    Attributes {
        /// The attribute call that failed.
        op: AttrOp,
        /// Underlying OS error.
        source: io::Error,
    },

    /// Writing to the output device failed.
    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TermError {
    /// Wrap the calling thread's last OS error as an attribute failure.
    #[must_use]
    pub fn last_attr_error(op: AttrOp) -> Self {
        let source = io::Error::last_os_error();
        if source.raw_os_error() == Some(ENOTTY) {
            return Self::NotATerminal;
        }
        Self::Attributes { op, source }
    }
}

#[cfg(unix)]
const ENOTTY: i32 = libc::ENOTTY;
#[cfg(not(unix))]
const ENOTTY: i32 = 25;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, TermError>;
