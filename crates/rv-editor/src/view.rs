//! View — the row pass.
//!
//! Turns a [`DisplayBuffer`] into the rows of one frame:
//!
//! - each row starts with `ESC[K` (erase to end of line)
//! - rows are separated by `\r\n`, with nothing after the last row so the
//!   terminal never scrolls
//! - text lines are cut to the screen width in display columns, never in
//!   the middle of a grapheme cluster
//! - rows past the end of the text show `~`
//! - an empty buffer shows a centered banner a third of the way down
//!
//! Control characters (tabs included) are drawn as `?`: one cell each, and
//! no way for file content to smuggle escape sequences onto the screen.

use std::io::{self, Write};

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use rv_term::ansi;
use rv_term::geometry::Geometry;

use crate::display::DisplayBuffer;

/// Version shown in the banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The welcome line shown on an empty buffer.
#[must_use]
pub fn banner() -> String {
    format!("rawview -- version {VERSION}")
}

/// Write every row of the frame for `buffer` at `geometry`.
///
/// # Errors
///
/// Only errors from writing to `out`.
pub fn paint_rows(out: &mut impl Write, buffer: &DisplayBuffer, geometry: Geometry) -> io::Result<()> {
    let width = usize::from(geometry.cols);
    let banner_row = buffer.is_empty().then_some(geometry.rows / 3);

    for row in 0..geometry.rows {
        if row > 0 {
            out.write_all(b"\r\n")?;
        }
        ansi::clear_line(out)?;

        if banner_row == Some(row) {
            out.write_all(banner_line(&banner(), width).as_bytes())?;
        } else if let Some(line) = buffer.line(usize::from(row)) {
            out.write_all(truncate_to_width(&line, width).as_bytes())?;
        } else {
            out.write_all(b"~")?;
        }
    }
    Ok(())
}

/// `line` cut to at most `width` display columns, control characters
/// replaced by `?`.
///
/// A wide character that would straddle the right edge is left out
/// entirely.
#[must_use]
pub fn truncate_to_width(line: &str, width: usize) -> String {
    let mut out = String::with_capacity(line.len().min(width * 4));
    let mut used = 0;

    for grapheme in line.graphemes(true) {
        let (text, cells) = if grapheme.chars().any(char::is_control) {
            ("?", 1)
        } else {
            (grapheme, grapheme.width())
        };
        if used + cells > width {
            break;
        }
        out.push_str(text);
        used += cells;
    }
    out
}

/// The banner centered in `width` columns, with the `~` filler kept in the
/// first column when there is room for it.
fn banner_line(banner: &str, width: usize) -> String {
    let text = truncate_to_width(banner, width);
    let padding = (width - text.width()) / 2;
    if padding == 0 {
        return text;
    }
    let mut line = String::with_capacity(width);
    line.push('~');
    line.extend(std::iter::repeat_n(' ', padding - 1));
    line.push_str(&text);
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paint(buffer: &DisplayBuffer, cols: u16, rows: u16) -> String {
        let mut out = Vec::new();
        paint_rows(&mut out, buffer, Geometry { cols, rows }).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn rows(painted: &str) -> Vec<&str> {
        painted
            .split("\r\n")
            .map(|row| row.strip_prefix("\x1b[K").unwrap())
            .collect()
    }

    // -- Truncation ---------------------------------------------------------

    #[test]
    fn short_line_untouched() {
        assert_eq!(truncate_to_width("hello", 80), "hello");
    }

    #[test]
    fn long_line_cut_at_width() {
        assert_eq!(truncate_to_width("abcdefghij", 4), "abcd");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn wide_chars_count_two_columns() {
        assert_eq!(truncate_to_width("日本語", 4), "日本");
        assert_eq!(truncate_to_width("日本語", 5), "日本");
        assert_eq!(truncate_to_width("日本語", 6), "日本語");
    }

    #[test]
    fn grapheme_clusters_stay_whole() {
        // 'e' + combining acute is one cell.
        assert_eq!(truncate_to_width("e\u{301}x", 1), "e\u{301}");
    }

    #[test]
    fn control_characters_shown_as_question_marks() {
        assert_eq!(truncate_to_width("a\tb\x1b[2Jc", 80), "a?b?[2Jc");
    }

    // -- Rows ---------------------------------------------------------------

    #[test]
    fn every_row_starts_with_erase() {
        let painted = paint(&DisplayBuffer::from_text("x\n"), 10, 3);
        assert_eq!(painted, "\x1b[Kx\r\n\x1b[K~\r\n\x1b[K~");
    }

    #[test]
    fn no_separator_after_last_row() {
        let painted = paint(&DisplayBuffer::from_text("a\nb\n"), 10, 2);
        assert!(!painted.ends_with("\r\n"));
        assert_eq!(rows(&painted), vec!["a", "b"]);
    }

    #[test]
    fn text_rows_are_truncated() {
        let painted = paint(&DisplayBuffer::from_text("0123456789abc\nshort\n"), 10, 3);
        assert_eq!(rows(&painted), vec!["0123456789", "short", "~"]);
    }

    #[test]
    fn buffer_longer_than_screen_shows_first_rows() {
        let painted = paint(&DisplayBuffer::from_text("1\n2\n3\n4\n5\n"), 10, 3);
        assert_eq!(rows(&painted), vec!["1", "2", "3"]);
    }

    // -- Banner -------------------------------------------------------------

    #[test]
    fn empty_buffer_shows_banner_a_third_down() {
        let painted = paint(&DisplayBuffer::new(), 80, 24);
        let rows = rows(&painted);
        assert_eq!(rows.len(), 24);
        for (i, row) in rows.iter().enumerate() {
            if i == 8 {
                assert!(row.starts_with('~'));
                assert!(row.trim_end().ends_with(&banner()));
            } else {
                assert_eq!(*row, "~", "row {i}");
            }
        }
    }

    #[test]
    fn banner_is_centered() {
        let text = banner();
        let line = banner_line(&text, 80);
        let padding = (80 - text.len()) / 2;
        assert_eq!(line.len(), padding + text.len());
        assert_eq!(&line[padding..], text);
    }

    #[test]
    fn banner_truncated_on_narrow_screen() {
        let line = banner_line(&banner(), 7);
        assert_eq!(line, "rawview");
    }

    #[test]
    fn banner_text() {
        assert_eq!(banner(), format!("rawview -- version {VERSION}"));
    }

    #[test]
    fn non_empty_buffer_has_no_banner() {
        let painted = paint(&DisplayBuffer::from_text("x"), 80, 24);
        assert!(!painted.contains("rawview"));
    }
}
