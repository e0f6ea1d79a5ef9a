//! Display buffer — the lines the viewer shows.
//!
//! A `DisplayBuffer` wraps a [`ropey::Rope`] and only ever hands out lines.
//! Line numbers are 0-indexed and lines come back without their line ending.
//! A trailing newline does not start an extra, empty line: `"a\nb\n"` is two
//! lines, not three.
//!
//! Files that are not valid UTF-8 are still shown; invalid bytes become
//! U+FFFD.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ropey::Rope;
use thiserror::Error;

/// Failure to load content from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Read-only, line-addressed text.
#[derive(Debug, Clone, Default)]
pub struct DisplayBuffer {
    rope: Rope,
    path: Option<PathBuf>,
}

impl DisplayBuffer {
    /// An empty buffer; the viewer shows its banner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            path: None,
        }
    }

    /// Load a file.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Read`] if the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let bytes = fs::read(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let text = String::from_utf8_lossy(&bytes);
        if let Cow::Owned(_) = text {
            tracing::warn!(path = %path.display(), "file is not valid UTF-8; invalid bytes replaced");
        }

        let buffer = Self {
            rope: Rope::from_str(&text),
            path: Some(path.to_path_buf()),
        };
        tracing::info!(path = %path.display(), lines = buffer.len(), "file loaded");
        Ok(buffer)
    }

    /// Where the content came from, if it was loaded from a file.
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        let lines = self.rope.len_lines();
        if self.rope.len_chars() == 0 {
            0
        } else if self.rope.line(lines - 1).len_chars() == 0 {
            lines - 1
        } else {
            lines
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Line `index` without its line ending, or `None` past the end.
    #[must_use]
    pub fn line(&self, index: usize) -> Option<Cow<'_, str>> {
        if index >= self.len() {
            return None;
        }
        let line = self.rope.line(index);
        let content = line.slice(..content_len(line));
        Some(content.into())
    }
}

/// Chars in `line` before its line ending.
fn content_len(line: ropey::RopeSlice<'_>) -> usize {
    let total = line.len_chars();
    if total == 0 {
        return 0;
    }
    match line.char(total - 1) {
        '\n' if total >= 2 && line.char(total - 2) == '\r' => total - 2,
        '\n' | '\r' | '\u{0B}' | '\u{0C}' | '\u{85}' | '\u{2028}' | '\u{2029}' => total - 1,
        _ => total,
    }
}
