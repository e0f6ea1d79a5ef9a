// SPDX-License-Identifier: MIT
//
// rv-term — Terminal layer for rawview.
//
// Takes byte-level control of an interactive terminal: puts the device in
// raw mode and guarantees it comes back out on every exit path, decodes the
// raw keyboard byte stream into key events (arrows, navigation keys, control
// combinations), works out the terminal geometry for every frame, and drives
// a repaint / await-input loop that writes each frame in one piece.

pub mod ansi;
pub mod error;
pub mod event_loop;
pub mod geometry;
pub mod input;
pub mod output;
pub mod raw;
pub mod reader;
pub mod terminal;

#[cfg(all(test, target_os = "linux"))]
mod testing;

pub use error::{Result, TermError};
