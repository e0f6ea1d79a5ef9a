//! Viewer — the application the render loop drives.
//!
//! Owns the display buffer and the cursor. Ctrl-Q quits; navigation keys
//! move the cursor; every other key is ignored.

use std::io;

use rv_term::event_loop::{Action, App};
use rv_term::geometry::Geometry;
use rv_term::input::KeyEvent;
use rv_term::output::OutputBuffer;

use crate::cursor::CursorPosition;
use crate::display::DisplayBuffer;
use crate::view;

/// Printed once the terminal is back to normal.
pub const QUIT_MESSAGE: &str = "Quit (Ctrl-Q). Restoring terminal and exiting.";

/// Viewer state: what is shown and where the cursor is.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    buffer: DisplayBuffer,
    cursor: CursorPosition,
    quit_requested: bool,
}

impl Viewer {
    #[must_use]
    pub fn new(buffer: DisplayBuffer) -> Self {
        Self {
            buffer,
            cursor: CursorPosition::ORIGIN,
            quit_requested: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn buffer(&self) -> &DisplayBuffer {
        &self.buffer
    }

    #[inline]
    #[must_use]
    pub const fn cursor_position(&self) -> CursorPosition {
        self.cursor
    }
}

impl App for Viewer {
    fn on_key(&mut self, key: &KeyEvent, geometry: Geometry) -> Action {
        if key.is_ctrl('q') {
            self.quit_requested = true;
            return Action::Quit;
        }
        self.cursor.apply(key, geometry);
        Action::Continue
    }

    fn paint(&mut self, out: &mut OutputBuffer, geometry: Geometry) -> io::Result<()> {
        view::paint_rows(out, &self.buffer, geometry)
    }

    fn cursor(&self, geometry: Geometry) -> (u16, u16) {
        let mut position = self.cursor;
        position.clamp(geometry);
        (position.col, position.row)
    }

    /// The quit message, only after Ctrl-Q. End of input exits silently.
    fn farewell(&self) -> Option<&str> {
        self.quit_requested.then_some(QUIT_MESSAGE)
    }
}
