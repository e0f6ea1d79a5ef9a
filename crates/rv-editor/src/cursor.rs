//! Cursor — a screen cell moved by navigation keys.
//!
//! Unlike a text cursor, this one lives in screen coordinates: it can sit on
//! any cell of the current geometry whether or not a line of text is there.
//! Every update clamps it to `[0, cols-1] × [0, rows-1]`, so a window that
//! shrank since the last key pulls the cursor back inside.

use rv_term::geometry::Geometry;
use rv_term::input::{KeyEvent, KeyKind};

/// Cursor position in screen cells, 0-indexed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CursorPosition {
    pub col: u16,
    pub row: u16,
}

impl CursorPosition {
    /// Top-left cell.
    pub const ORIGIN: Self = Self { col: 0, row: 0 };

    #[must_use]
    pub const fn new(col: u16, row: u16) -> Self {
        Self { col, row }
    }

    /// Pull the position inside `geometry`.
    pub fn clamp(&mut self, geometry: Geometry) {
        self.col = self.col.min(geometry.last_col());
        self.row = self.row.min(geometry.last_row());
    }

    /// Move according to `key`. Keys without a movement meaning leave the
    /// position where it is (after clamping).
    ///
    /// | Key       | Effect                 |
    /// |-----------|------------------------|
    /// | arrows    | one cell, bounded      |
    /// | Home      | column 0               |
    /// | End       | last column            |
    /// | PageUp    | row 0                  |
    /// | PageDown  | last row               |
    pub fn apply(&mut self, key: &KeyEvent, geometry: Geometry) {
        self.clamp(geometry);
        match key.kind {
            KeyKind::ArrowUp => self.row = self.row.saturating_sub(1),
            KeyKind::ArrowDown => self.row = (self.row + 1).min(geometry.last_row()),
            KeyKind::ArrowLeft => self.col = self.col.saturating_sub(1),
            KeyKind::ArrowRight => self.col = (self.col + 1).min(geometry.last_col()),
            KeyKind::Home => self.col = 0,
            KeyKind::End => self.col = geometry.last_col(),
            KeyKind::PageUp => self.row = 0,
            KeyKind::PageDown => self.row = geometry.last_row(),
            KeyKind::PlainCharacter
            | KeyKind::Enter
            | KeyKind::Escape
            | KeyKind::Delete
            | KeyKind::Unknown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCREEN: Geometry = Geometry { cols: 80, rows: 24 };

    fn moved(from: CursorPosition, kind: KeyKind) -> CursorPosition {
        let mut cursor = from;
        cursor.apply(&KeyEvent::new(kind), SCREEN);
        cursor
    }

    #[test]
    fn arrows_move_one_cell() {
        let start = CursorPosition::new(10, 5);
        assert_eq!(moved(start, KeyKind::ArrowUp), CursorPosition::new(10, 4));
        assert_eq!(moved(start, KeyKind::ArrowDown), CursorPosition::new(10, 6));
        assert_eq!(moved(start, KeyKind::ArrowLeft), CursorPosition::new(9, 5));
        assert_eq!(moved(start, KeyKind::ArrowRight), CursorPosition::new(11, 5));
    }

    #[test]
    fn arrows_stop_at_edges() {
        let origin = CursorPosition::ORIGIN;
        assert_eq!(moved(origin, KeyKind::ArrowUp), origin);
        assert_eq!(moved(origin, KeyKind::ArrowLeft), origin);

        let corner = CursorPosition::new(79, 23);
        assert_eq!(moved(corner, KeyKind::ArrowRight), corner);
        assert_eq!(moved(corner, KeyKind::ArrowDown), corner);
    }

    #[test]
    fn navigation_keys_jump() {
        let start = CursorPosition::new(10, 5);
        assert_eq!(moved(start, KeyKind::Home), CursorPosition::new(0, 5));
        assert_eq!(moved(start, KeyKind::End), CursorPosition::new(79, 5));
        assert_eq!(moved(start, KeyKind::PageUp), CursorPosition::new(10, 0));
        assert_eq!(moved(start, KeyKind::PageDown), CursorPosition::new(10, 23));
    }

    #[test]
    fn other_keys_do_nothing() {
        let start = CursorPosition::new(10, 5);
        let mut cursor = start;
        for key in [
            KeyEvent::plain('j'),
            KeyEvent::ctrl('q'),
            KeyEvent::enter(),
            KeyEvent::new(KeyKind::Escape),
            KeyEvent::new(KeyKind::Delete),
            KeyEvent::new(KeyKind::Unknown),
        ] {
            cursor.apply(&key, SCREEN);
        }
        assert_eq!(cursor, start);
    }

    #[test]
    fn shrunk_window_pulls_cursor_in() {
        let mut cursor = CursorPosition::new(79, 23);
        cursor.apply(&KeyEvent::plain('x'), Geometry { cols: 40, rows: 10 });
        assert_eq!(cursor, CursorPosition::new(39, 9));
    }

    #[test]
    fn single_cell_screen() {
        let tiny = Geometry { cols: 1, rows: 1 };
        let mut cursor = CursorPosition::ORIGIN;
        for kind in [KeyKind::ArrowRight, KeyKind::ArrowDown, KeyKind::End, KeyKind::PageDown] {
            cursor.apply(&KeyEvent::new(kind), tiny);
            assert_eq!(cursor, CursorPosition::ORIGIN);
        }
    }
}
