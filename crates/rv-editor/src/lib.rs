//! # rv-editor — Viewer state for rawview
//!
//! Everything the render loop draws lives here, on the main thread:
//!
//! - **[`cursor`]** — `CursorPosition` and how navigation keys move it
//! - **[`display`]** — `DisplayBuffer`, the read-only lines being shown
//! - **[`view`]** — the row pass: text lines, `~` filler, the banner
//! - **[`viewer`]** — `Viewer`, the [`rv_term::event_loop::App`] tying them together
//!
//! There are no editing operations. Keys only move the cursor or quit.

pub mod cursor;
pub mod display;
pub mod view;
pub mod viewer;

pub use viewer::Viewer;
