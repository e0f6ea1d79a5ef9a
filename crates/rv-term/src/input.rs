// SPDX-License-Identifier: MIT
//
// Key decoder.
//
// Turns the raw byte stream of a terminal in raw mode into key events:
//
// - Control bytes 1..=26 (Ctrl-A .. Ctrl-Z, with CR promoted to Enter)
// - Printable 7-bit ASCII
// - CSI sequences for arrows, Home/End, and the `~`-terminated editing keys
// - SS3 sequences for Home/End (some emulators send `ESC O H` / `ESC O F`)
// - A lone ESC when the stream ends right after it
//
// # Design
//
// The decoder pulls one byte at a time from any `Read` and never reads
// past the end of the event it is building, so the byte source can be the
// terminal device itself with no buffering layer in between. It blocks for
// as long as the source blocks.
//
// Lookahead is never pushed back. When an escape sequence turns out to be
// unrecognized, every byte read while trying to match it is gone and the
// whole thing is reported as a single `Escape`. Recovering those bytes
// would need a pushback buffer; the decoder stays a straight-line state
// machine instead.
//
// Digit sequences (`ESC [ 3 ~`) collect every byte up to the terminating
// `~`, whatever those bytes are. The collected parameter is then looked up;
// anything unmapped (`ESC [ 3 ; 5 ~`, `ESC [ 1 x ~`) is one `Escape`. If the
// stream ends before a `~` arrives, the sequence is an `Escape` too.

use std::fmt;
use std::io::{self, Read};

// ─── Event Types ────────────────────────────────────────────────────────────

/// What a decoded key event stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// A printable character, or a Ctrl+letter combination.
    PlainCharacter,
    Enter,
    /// A lone ESC, or an escape sequence nobody recognized.
    Escape,
    // ── Navigation ──────────────────────────────────────────────
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
    Delete,
    /// NUL, DEL, bytes 28..=31 and anything with the high bit set.
    Unknown,
}

/// A decoded key event.
///
/// `ch` is only meaningful for [`KeyKind::PlainCharacter`] (the character,
/// or the lowercase letter for Ctrl combinations) and [`KeyKind::Enter`]
/// (`'\r'`). It is `'\0'` for every other kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub kind: KeyKind,
    pub ch: char,
    /// The byte was in the control range 1..=26 and `ch` is the letter it
    /// stands for.
    pub ctrl: bool,
}

impl KeyEvent {
    /// A key event with no character payload.
    #[must_use]
    pub const fn new(kind: KeyKind) -> Self {
        Self {
            kind,
            ch: '\0',
            ctrl: false,
        }
    }

    /// A printable character.
    #[must_use]
    pub const fn plain(ch: char) -> Self {
        Self {
            kind: KeyKind::PlainCharacter,
            ch,
            ctrl: false,
        }
    }

    /// Ctrl plus a lowercase letter.
    #[must_use]
    pub const fn ctrl(letter: char) -> Self {
        Self {
            kind: KeyKind::PlainCharacter,
            ch: letter,
            ctrl: true,
        }
    }

    /// Carriage return.
    #[must_use]
    pub const fn enter() -> Self {
        Self {
            kind: KeyKind::Enter,
            ch: '\r',
            ctrl: false,
        }
    }

    /// Whether this is Ctrl + `letter`.
    #[inline]
    #[must_use]
    pub const fn is_ctrl(&self, letter: char) -> bool {
        self.ctrl && matches!(self.kind, KeyKind::PlainCharacter) && self.ch == letter
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            KeyKind::PlainCharacter if self.ctrl => write!(f, "Ctrl + {}", self.ch),
            KeyKind::PlainCharacter => write!(f, "Rune {:?}", self.ch),
            kind => write!(f, "{kind:?}"),
        }
    }
}

// ─── Decoder ────────────────────────────────────────────────────────────────

const ESC: u8 = 0x1B;
const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Pull-based key decoder over a byte source.
///
/// # Example
///
/// ```
/// use rv_term::input::{KeyDecoder, KeyKind};
///
/// let mut decoder = KeyDecoder::new(&b"\x1b[A"[..]);
/// let key = decoder.next_key()?.unwrap();
/// assert_eq!(key.kind, KeyKind::ArrowUp);
/// assert!(decoder.next_key()?.is_none());
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct KeyDecoder<R> {
    source: R,
}

impl<R: Read> KeyDecoder<R> {
    /// Wrap a byte source.
    pub const fn new(source: R) -> Self {
        Self { source }
    }

    /// The wrapped byte source.
    pub const fn get_ref(&self) -> &R {
        &self.source
    }

    /// Decode the next key.
    ///
    /// Returns `Ok(None)` when the source is exhausted before an event
    /// starts. Once the first byte of an event has been read, running out
    /// of bytes (or failing to read more) resolves the event as
    /// [`KeyKind::Escape`] instead of surfacing an error.
    ///
    /// # Errors
    ///
    /// Returns the source's error if reading the leading byte fails.
    pub fn next_key(&mut self) -> io::Result<Option<KeyEvent>> {
        let Some(lead) = self.read_byte()? else {
            return Ok(None);
        };

        let event = match lead {
            // Control range. CR takes precedence over Ctrl-M.
            CR => KeyEvent::enter(),
            b @ 1..=26 => KeyEvent::ctrl(char::from(b'a' + b - 1)),
            // Printable ASCII.
            b @ 32..=126 => match b {
                CR | LF => KeyEvent::enter(),
                _ => KeyEvent::plain(char::from(b)),
            },
            ESC => self.escape(),
            _ => KeyEvent::new(KeyKind::Unknown),
        };

        Ok(Some(event))
    }

    /// Decode what follows an ESC byte.
    fn escape(&mut self) -> KeyEvent {
        let escape = KeyEvent::new(KeyKind::Escape);
        match self.lookahead() {
            Some(b'[') => self.csi(),
            Some(b'O') => match self.lookahead() {
                Some(b'H') => KeyEvent::new(KeyKind::Home),
                Some(b'F') => KeyEvent::new(KeyKind::End),
                _ => escape,
            },
            // Stream ended, or ESC + something we don't decode (no Alt
            // synthesis); the second byte is consumed either way.
            _ => escape,
        }
    }

    /// Decode what follows `ESC [`.
    fn csi(&mut self) -> KeyEvent {
        let kind = match self.lookahead() {
            Some(b'A') => KeyKind::ArrowUp,
            Some(b'B') => KeyKind::ArrowDown,
            Some(b'C') => KeyKind::ArrowRight,
            Some(b'D') => KeyKind::ArrowLeft,
            Some(b'H') => KeyKind::Home,
            Some(b'F') => KeyKind::End,
            Some(first @ b'0'..=b'9') => self.tilde_sequence(first),
            _ => KeyKind::Escape,
        };
        KeyEvent::new(kind)
    }

    /// Collect everything after the first digit up to `~` and interpret it.
    fn tilde_sequence(&mut self, first: u8) -> KeyKind {
        let mut params = vec![first];
        loop {
            match self.lookahead() {
                Some(b'~') => return tilde_key(&params),
                Some(b) => params.push(b),
                // Stream ended mid-sequence.
                None => return KeyKind::Escape,
            }
        }
    }

    /// Read a continuation byte; end of stream and read errors both mean
    /// "nothing more".
    fn lookahead(&mut self) -> Option<u8> {
        match self.read_byte() {
            Ok(byte) => byte,
            Err(err) => {
                tracing::debug!(%err, "read failed inside an escape sequence");
                None
            }
        }
    }

    /// Read exactly one byte, retrying on `Interrupted`.
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.source.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
    }
}

impl<R: Read> Iterator for KeyDecoder<R> {
    type Item = io::Result<KeyEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_key().transpose()
    }
}

/// Map the parameter of a `CSI <n> ~` sequence to a key.
fn tilde_key(params: &[u8]) -> KeyKind {
    match params {
        b"1" | b"7" => KeyKind::Home,
        b"4" | b"8" => KeyKind::End,
        b"3" => KeyKind::Delete,
        b"5" => KeyKind::PageUp,
        b"6" => KeyKind::PageDown,
        _ => KeyKind::Escape,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
