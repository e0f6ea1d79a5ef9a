// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Terminal geometry — how many columns and rows are visible right now.
//
// Two ways to find out, tried in order:
//
//   1. Ask the driver: `ioctl(TIOCGWINSZ)`. Instant, and right almost
//      everywhere. Serial consoles and some emulators report 0×0.
//
//   2. Ask the terminal: save the cursor, shove it to row 999 / column 999
//      (the terminal clamps that to its bottom-right cell), request a
//      cursor-position report, and read the `ESC [ rows ; cols R` reply.
//      The read is bounded at 100 ms so a terminal that ignores the
//      request cannot hang the frame.
//
// If both come up empty the resolver hands out 80×25 and says so. The
// resolver never fails and never caches: geometry is looked up fresh for
// every frame because the user can resize the window at any moment.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use crate::ansi;

// ─── Geometry ───────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells. Both fields are > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

impl Geometry {
    /// Geometry used when nothing else works.
    pub const DEFAULT: Self = Self { cols: 80, rows: 25 };

    /// Build a geometry, rejecting zero dimensions.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Option<Self> {
        if cols > 0 && rows > 0 {
            Some(Self { cols, rows })
        } else {
            None
        }
    }

    /// Index of the last column.
    #[inline]
    #[must_use]
    pub const fn last_col(self) -> u16 {
        self.cols.saturating_sub(1)
    }

    /// Index of the last row.
    #[inline]
    #[must_use]
    pub const fn last_row(self) -> u16 {
        self.rows.saturating_sub(1)
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Where a resolved geometry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometrySource {
    /// The driver answered the size query.
    Device,
    /// The terminal answered the cursor-position probe.
    Probe,
    /// Nothing answered; this is the fallback value.
    Default,
}

/// A geometry plus how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub geometry: Geometry,
    pub source: GeometrySource,
}

impl Resolved {
    /// Whether the fallback geometry was used.
    #[inline]
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.source == GeometrySource::Default
    }
}

// ─── Strategies ─────────────────────────────────────────────────────────────

/// One way of finding out the terminal size.
pub trait GeometryStrategy {
    /// What a successful answer from this strategy is reported as.
    fn source(&self) -> GeometrySource;

    /// Try once. `None` means "no usable answer", never "stop trying".
    fn query(&mut self) -> Option<Geometry>;
}

/// Any closure works as a strategy; it reports as [`GeometrySource::Device`].
impl<F> GeometryStrategy for F
where
    F: FnMut() -> Option<Geometry>,
{
    fn source(&self) -> GeometrySource {
        GeometrySource::Device
    }

    fn query(&mut self) -> Option<Geometry> {
        self()
    }
}

/// Ask the driver for the window size of a descriptor.
#[derive(Debug, Clone, Copy)]
pub struct DeviceQuery {
    fd: crate::raw::Fd,
}

impl DeviceQuery {
    #[must_use]
    pub const fn new(fd: crate::raw::Fd) -> Self {
        Self { fd }
    }
}

impl GeometryStrategy for DeviceQuery {
    fn source(&self) -> GeometrySource {
        GeometrySource::Device
    }

    fn query(&mut self) -> Option<Geometry> {
        query_device(self.fd)
    }
}

/// Query the window size of `fd` via `ioctl(TIOCGWINSZ)`.
///
/// Returns `None` if `fd` is not a terminal, the call fails, or either
/// dimension is zero.
#[cfg(unix)]
#[must_use]
pub fn query_device(fd: crate::raw::Fd) -> Option<Geometry> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) };
    if result != 0 {
        return None;
    }
    Geometry::new(ws.ws_col, ws.ws_row)
}

#[cfg(not(unix))]
#[must_use]
pub fn query_device(_fd: crate::raw::Fd) -> Option<Geometry> {
    None
}

/// Ask the terminal itself by way of a cursor-position report.
///
/// Owns the input device for the duration of the probe: the decoder
/// thread's reads are paused through the [`InputGate`](crate::reader::InputGate)
/// so the reply is not mistaken for keystrokes.
pub struct CursorProbe {
    input_fd: crate::raw::Fd,
    gate: crate::reader::InputGate,
    timeout: Duration,
}

impl CursorProbe {
    #[must_use]
    pub const fn new(
        input_fd: crate::raw::Fd,
        gate: crate::reader::InputGate,
        timeout: Duration,
    ) -> Self {
        Self {
            input_fd,
            gate,
            timeout,
        }
    }
}

impl GeometryStrategy for CursorProbe {
    fn source(&self) -> GeometrySource {
        GeometrySource::Probe
    }

    #[cfg(unix)]
    fn query(&mut self) -> Option<Geometry> {
        let _paused = self.gate.pause();
        let timed = match crate::raw::TimedReads::engage(self.input_fd, deciseconds(self.timeout)) {
            Ok(timed) => timed,
            Err(err) => {
                tracing::debug!(%err, "cannot switch input to timed reads; skipping probe");
                return None;
            }
        };
        let mut input = crate::reader::FdReader::new(self.input_fd);
        let mut out = io::stdout().lock();
        let geometry = probe_cursor(&mut out, &mut input, self.timeout);
        drop(timed);
        geometry
    }

    #[cfg(not(unix))]
    fn query(&mut self) -> Option<Geometry> {
        let _paused = self.gate.pause();
        let mut out = io::stdout().lock();
        probe_cursor(&mut out, &mut io::empty(), self.timeout)
    }
}

/// Round a timeout up to the tenths of a second termios works in.
fn deciseconds(timeout: Duration) -> u8 {
    let tenths = timeout.as_millis().div_ceil(100);
    u8::try_from(tenths).unwrap_or(u8::MAX).max(1)
}

// ─── Probe ──────────────────────────────────────────────────────────────────

/// Longest reply we are willing to collect before giving up.
const MAX_REPLY: usize = 32;

/// Run the cursor-position probe over an arbitrary output and input.
///
/// `input` must not block forever: a read returning `Ok(0)` is taken as
/// "no reply". The cursor is restored even when the probe fails.
pub fn probe_cursor(out: &mut impl Write, input: &mut impl Read, timeout: Duration) -> Option<Geometry> {
    if let Err(err) = send_probe(out) {
        tracing::debug!(%err, "failed to send cursor-position request");
        let _ = restore_cursor(out);
        return None;
    }

    let reply = read_reply(input, timeout);

    if let Err(err) = restore_cursor(out) {
        tracing::debug!(%err, "failed to restore cursor after probe");
    }

    let geometry = parse_cursor_report(&reply);
    if geometry.is_none() {
        tracing::debug!(reply = ?String::from_utf8_lossy(&reply), "no usable cursor-position reply");
    }
    geometry
}

fn send_probe(out: &mut impl Write) -> io::Result<()> {
    ansi::cursor_save(out)?;
    ansi::cursor_far_corner(out)?;
    ansi::request_cursor_position(out)?;
    out.flush()
}

fn restore_cursor(out: &mut impl Write) -> io::Result<()> {
    ansi::cursor_restore(out)?;
    out.flush()
}

/// Collect bytes until an `R`, the size cap, an empty read, or the deadline.
fn read_reply(input: &mut impl Read, timeout: Duration) -> Vec<u8> {
    let deadline = Instant::now() + timeout;
    let mut reply = Vec::with_capacity(MAX_REPLY);
    let mut byte = [0u8; 1];

    while reply.len() < MAX_REPLY && Instant::now() < deadline {
        match input.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                reply.push(byte[0]);
                if byte[0] == b'R' {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                tracing::debug!(%err, "read failed while waiting for cursor-position reply");
                break;
            }
        }
    }
    reply
}

/// Parse a cursor-position report `ESC [ rows ; cols R`.
///
/// The report lists the row first; the returned geometry has the usual
/// `cols`/`rows` fields. Leading noise before the final `ESC [` is ignored.
#[must_use]
pub fn parse_cursor_report(reply: &[u8]) -> Option<Geometry> {
    let start = reply.windows(2).rposition(|w| w == b"\x1b[")?;
    let body = reply[start + 2..].strip_suffix(b"R")?;
    let sep = body.iter().position(|&b| b == b';')?;
    let rows = parse_u16(&body[..sep])?;
    let cols = parse_u16(&body[sep + 1..])?;
    Geometry::new(cols, rows)
}

/// Parse a non-empty run of ASCII digits.
fn parse_u16(digits: &[u8]) -> Option<u16> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

// ─── Resolver ───────────────────────────────────────────────────────────────

/// Ordered geometry strategies with a fixed fallback.
///
/// # Example
///
/// ```
/// use rv_term::geometry::{Geometry, GeometrySource, Resolver};
///
/// let mut resolver = Resolver::new(Geometry::DEFAULT)
///     .with(|| None::<Geometry>)
///     .with(|| Geometry::new(132, 43));
/// let resolved = resolver.resolve();
/// assert_eq!(resolved.geometry, Geometry { cols: 132, rows: 43 });
/// assert_eq!(resolved.source, GeometrySource::Device);
/// ```
pub struct Resolver {
    strategies: Vec<Box<dyn GeometryStrategy>>,
    fallback: Geometry,
}

impl Resolver {
    /// A resolver with no strategies; it always returns `fallback`.
    #[must_use]
    pub fn new(fallback: Geometry) -> Self {
        Self {
            strategies: Vec::new(),
            fallback,
        }
    }

    /// Append a strategy; earlier strategies are tried first.
    #[must_use]
    pub fn with(mut self, strategy: impl GeometryStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// The standard chain for a live terminal: driver query on the output,
    /// then the cursor probe on the input.
    #[must_use]
    pub fn for_terminal(
        input_fd: crate::raw::Fd,
        output_fd: crate::raw::Fd,
        gate: crate::reader::InputGate,
        probe_timeout: Duration,
        fallback: Geometry,
    ) -> Self {
        Self::new(fallback)
            .with(DeviceQuery::new(output_fd))
            .with(CursorProbe::new(input_fd, gate, probe_timeout))
    }

    /// Resolve the current geometry. Never fails.
    pub fn resolve(&mut self) -> Resolved {
        for strategy in &mut self.strategies {
            if let Some(geometry) = strategy.query() {
                return Resolved {
                    geometry,
                    source: strategy.source(),
                };
            }
        }
        tracing::warn!(
            cols = self.fallback.cols,
            rows = self.fallback.rows,
            "terminal size unavailable; using default geometry"
        );
        Resolved {
            geometry: self.fallback,
            source: GeometrySource::Default,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
