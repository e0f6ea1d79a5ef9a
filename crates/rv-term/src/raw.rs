// SPDX-License-Identifier: MIT
//
// Raw-mode controller — line-discipline attributes in, line-discipline
// attributes out.
//
// Safety: termios access (tcgetattr, tcsetattr) has no safe wrapper in std.
// Every unsafe block below is a single libc call on a caller-supplied fd
// with a properly sized, initialized termios value.
#![allow(unsafe_code)]
//
// Entering raw mode is two steps. First the cfmakeraw equivalent: no
// canonical input, no echo, no signals, no flow control, no literal-next,
// no CR→NL translation, no output post-processing, 8-bit frames. Then the
// platform's `LineDiscipline::disable_signal_keys`, which on unix
// re-asserts the signal / flow-control / quoting / CR-translation bits as
// an explicit, separately testable step. Platforms without termios get a
// no-op implementation of the whole trait.
//
// The snapshot taken before any change is the only thing ever used to
// restore. There is no "sane default" termios in this crate.

use crate::error::Result;
#[cfg(unix)]
use crate::error::{AttrOp, TermError};

/// A file descriptor as the platform spells it.
#[cfg(unix)]
pub type Fd = std::os::fd::RawFd;
/// A file descriptor as the platform spells it.
#[cfg(not(unix))]
pub type Fd = i32;

/// Descriptor of the process's standard input.
pub const STDIN: Fd = 0;
/// Descriptor of the process's standard output.
pub const STDOUT: Fd = 1;

// ─── Snapshot ───────────────────────────────────────────────────────────────

/// Opaque copy of a terminal's attributes taken before raw mode.
///
/// Hand it back to [`restore`] exactly once on the way out.
#[derive(Clone, Copy)]
pub struct RawModeSnapshot {
    #[cfg(unix)]
    termios: libc::termios,
}

impl RawModeSnapshot {
    #[cfg(unix)]
    pub(crate) const fn termios(&self) -> &libc::termios {
        &self.termios
    }
}

impl std::fmt::Debug for RawModeSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("RawModeSnapshot");
        #[cfg(unix)]
        {
            s.field("iflag", &format_args!("{:#x}", self.termios.c_iflag))
                .field("oflag", &format_args!("{:#x}", self.termios.c_oflag))
                .field("cflag", &format_args!("{:#x}", self.termios.c_cflag))
                .field("lflag", &format_args!("{:#x}", self.termios.c_lflag));
        }
        s.finish()
    }
}

// ─── Platform interface ─────────────────────────────────────────────────────

/// Platform access to terminal line-discipline attributes.
///
/// One implementation per platform family, picked at build time through
/// [`Platform`]. Call sites never branch on the platform themselves.
pub trait LineDiscipline {
    /// Capture the current attributes of `fd`.
    ///
    /// # Errors
    ///
    /// Fails if the attributes cannot be read (including when `fd` is not
    /// a terminal).
    fn capture(&self, fd: Fd) -> Result<RawModeSnapshot>;

    /// Apply the raw-mode transformation of `from` to `fd`.
    ///
    /// # Errors
    ///
    /// Fails if the attributes cannot be written.
    fn apply_raw(&self, fd: Fd, from: &RawModeSnapshot) -> Result<()>;

    /// Make sure Ctrl-C / Ctrl-Z / Ctrl-\, Ctrl-S / Ctrl-Q, Ctrl-V and CR
    /// arrive as plain bytes.
    ///
    /// Where the raw primitive already guarantees this the implementation
    /// is a no-op. It must never leave the device in a worse state than it
    /// found it.
    ///
    /// # Errors
    ///
    /// Fails if the attributes cannot be read or written.
    fn disable_signal_keys(&self, fd: Fd) -> Result<()>;

    /// Write `snapshot` back to `fd`.
    ///
    /// # Errors
    ///
    /// Fails if the attributes cannot be written.
    fn restore(&self, fd: Fd, snapshot: &RawModeSnapshot) -> Result<()>;
}

/// The line discipline of the build target.
#[cfg(unix)]
pub type Platform = Termios;
/// The line discipline of the build target.
#[cfg(not(unix))]
pub type Platform = Unsupported;

// ─── Entry points ───────────────────────────────────────────────────────────

/// Put `fd` into raw mode and return what it looked like before.
///
/// Nothing is changed if the attributes cannot be read. If the second step
/// fails the device is put back before the error is returned.
///
/// # Errors
///
/// Returns [`TermError::NotATerminal`](crate::TermError::NotATerminal) or
/// [`TermError::Attributes`](crate::TermError::Attributes). Both are fatal:
/// do not start reading keys after an error here.
pub fn enter_raw_mode(fd: Fd) -> Result<RawModeSnapshot> {
    let platform = Platform::default();
    let snapshot = platform.capture(fd)?;
    platform.apply_raw(fd, &snapshot)?;
    if let Err(err) = platform.disable_signal_keys(fd) {
        let _ = platform.restore(fd, &snapshot);
        return Err(err);
    }
    tracing::debug!(fd, ?snapshot, "raw mode entered");
    Ok(snapshot)
}

/// Restore the attributes captured by [`enter_raw_mode`].
///
/// # Errors
///
/// Returns [`TermError::Attributes`](crate::TermError::Attributes) if the
/// attributes cannot be written.
pub fn restore(fd: Fd, snapshot: &RawModeSnapshot) -> Result<()> {
    Platform::default().restore(fd, snapshot)?;
    tracing::debug!(fd, "terminal attributes restored");
    Ok(())
}

// ─── Unix (termios) ─────────────────────────────────────────────────────────

/// termios-backed line discipline.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Termios;

#[cfg(unix)]
impl LineDiscipline for Termios {
    fn capture(&self, fd: Fd) -> Result<RawModeSnapshot> {
        Ok(RawModeSnapshot {
            termios: get_attributes(fd)?,
        })
    }

    fn apply_raw(&self, fd: Fd, from: &RawModeSnapshot) -> Result<()> {
        let mut raw = from.termios;
        make_raw(&mut raw);
        set_attributes(fd, &raw, libc::TCSAFLUSH)
    }

    fn disable_signal_keys(&self, fd: Fd) -> Result<()> {
        let mut termios = get_attributes(fd)?;
        clear_signal_keys(&mut termios);
        set_attributes(fd, &termios, libc::TCSANOW)
    }

    fn restore(&self, fd: Fd, snapshot: &RawModeSnapshot) -> Result<()> {
        set_attributes(fd, &snapshot.termios, libc::TCSAFLUSH)
    }
}

/// Read the attributes of `fd`.
#[cfg(unix)]
pub(crate) fn get_attributes(fd: Fd) -> Result<libc::termios> {
    let mut termios: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &raw mut termios) } != 0 {
        return Err(TermError::last_attr_error(AttrOp::Get));
    }
    Ok(termios)
}

/// Write the attributes of `fd`.
#[cfg(unix)]
pub(crate) fn set_attributes(fd: Fd, termios: &libc::termios, when: libc::c_int) -> Result<()> {
    if unsafe { libc::tcsetattr(fd, when, termios) } != 0 {
        return Err(TermError::last_attr_error(AttrOp::Set));
    }
    Ok(())
}

/// cfmakeraw equivalent, applied in place.
#[cfg(unix)]
pub fn make_raw(termios: &mut libc::termios) {
    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::INPCK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON);
    termios.c_oflag &= !libc::OPOST;
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    // VMIN=1, VTIME=0: read() blocks until at least 1 byte is available.
    termios.c_cc[libc::VMIN] = 1;
    termios.c_cc[libc::VTIME] = 0;
}

/// Clear ISIG (Ctrl-C/Z/\), IXON (Ctrl-S/Q), IEXTEN (Ctrl-V) and ICRNL.
#[cfg(unix)]
pub fn clear_signal_keys(termios: &mut libc::termios) {
    termios.c_lflag &= !(libc::ISIG | libc::IEXTEN);
    termios.c_iflag &= !(libc::IXON | libc::ICRNL);
}

/// Temporarily switch `fd` to timed reads; restores the previous attributes
/// on drop.
///
/// With `VMIN=0, VTIME=n` a `read()` returns after at most `n` tenths of a
/// second, with zero bytes if nothing arrived.
#[cfg(unix)]
pub struct TimedReads {
    fd: Fd,
    previous: libc::termios,
}

#[cfg(unix)]
impl TimedReads {
    /// Switch `fd` to reads that give up after `deciseconds`.
    ///
    /// # Errors
    ///
    /// Fails if the attributes cannot be read or written.
    pub fn engage(fd: Fd, deciseconds: u8) -> Result<Self> {
        let previous = get_attributes(fd)?;
        let mut timed = previous;
        timed.c_cc[libc::VMIN] = 0;
        timed.c_cc[libc::VTIME] = deciseconds.max(1);
        set_attributes(fd, &timed, libc::TCSANOW)?;
        Ok(Self { fd, previous })
    }
}

#[cfg(unix)]
impl Drop for TimedReads {
    fn drop(&mut self) {
        if let Err(err) = set_attributes(self.fd, &self.previous, libc::TCSANOW) {
            tracing::warn!(%err, "failed to leave timed-read mode");
        }
    }
}

// ─── Other platforms ────────────────────────────────────────────────────────

/// Line discipline for targets without termios. Every operation succeeds
/// without touching anything.
#[cfg(not(unix))]
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

#[cfg(not(unix))]
impl LineDiscipline for Unsupported {
    fn capture(&self, _fd: Fd) -> Result<RawModeSnapshot> {
        Ok(RawModeSnapshot {})
    }

    fn apply_raw(&self, _fd: Fd, _from: &RawModeSnapshot) -> Result<()> {
        Ok(())
    }

    fn disable_signal_keys(&self, _fd: Fd) -> Result<()> {
        Ok(())
    }

    fn restore(&self, _fd: Fd, _snapshot: &RawModeSnapshot) -> Result<()> {
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn zeroed() -> libc::termios {
        unsafe { std::mem::zeroed() }
    }

    /// A cooked-mode termios like a fresh login shell would have.
    fn cooked() -> libc::termios {
        let mut t = zeroed();
        t.c_iflag = libc::ICRNL | libc::IXON | libc::BRKINT;
        t.c_oflag = libc::OPOST;
        t.c_lflag = libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN;
        t.c_cflag = libc::CS7 | libc::PARENB;
        t.c_cc[libc::VMIN] = 4;
        t.c_cc[libc::VTIME] = 3;
        t
    }

    #[test]
    fn make_raw_clears_line_processing() {
        let mut t = cooked();
        make_raw(&mut t);
        assert_eq!(t.c_lflag & (libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN), 0);
        assert_eq!(t.c_iflag & (libc::ICRNL | libc::IXON | libc::BRKINT), 0);
        assert_eq!(t.c_oflag & libc::OPOST, 0);
    }

    #[test]
    fn make_raw_forces_eight_bit_no_parity() {
        let mut t = cooked();
        make_raw(&mut t);
        assert_eq!(t.c_cflag & libc::CSIZE, libc::CS8);
        assert_eq!(t.c_cflag & libc::PARENB, 0);
    }

    #[test]
    fn make_raw_blocks_for_one_byte() {
        let mut t = cooked();
        make_raw(&mut t);
        assert_eq!(t.c_cc[libc::VMIN], 1);
        assert_eq!(t.c_cc[libc::VTIME], 0);
    }

    #[test]
    fn clear_signal_keys_only_touches_its_bits() {
        let mut t = cooked();
        clear_signal_keys(&mut t);
        assert_eq!(t.c_lflag & (libc::ISIG | libc::IEXTEN), 0);
        assert_eq!(t.c_iflag & (libc::IXON | libc::ICRNL), 0);
        // Echo, canonical mode and output processing are left alone.
        assert_ne!(t.c_lflag & libc::ECHO, 0);
        assert_ne!(t.c_lflag & libc::ICANON, 0);
        assert_ne!(t.c_oflag & libc::OPOST, 0);
        assert_ne!(t.c_iflag & libc::BRKINT, 0);
    }

    #[test]
    fn snapshot_debug_shows_flags() {
        let snapshot = RawModeSnapshot { termios: cooked() };
        let debug = format!("{snapshot:?}");
        assert!(debug.contains("RawModeSnapshot"));
        assert!(debug.contains("lflag"));
    }

    #[test]
    fn capture_fails_on_non_terminal() {
        // A pipe is never a terminal.
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let result = enter_raw_mode(fds[0]);
        assert!(matches!(result, Err(TermError::NotATerminal)));
        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }

    #[cfg(target_os = "linux")]
    mod pty {
        use super::super::*;
        use crate::testing::{Pty, same_attributes};

        #[test]
        fn enter_then_restore_is_bit_identical() {
            let Some(pty) = Pty::open_or_skip() else { return };
            let fd = pty.slave_fd();
            let before = get_attributes(fd).unwrap();

            let snapshot = enter_raw_mode(fd).unwrap();
            let during = get_attributes(fd).unwrap();
            assert_eq!(during.c_lflag & (libc::ICANON | libc::ECHO | libc::ISIG), 0);
            assert_eq!(during.c_oflag & libc::OPOST, 0);

            restore(fd, &snapshot).unwrap();
            let after = get_attributes(fd).unwrap();
            assert!(same_attributes(&before, &after));
        }

        #[test]
        fn snapshot_matches_pre_entry_state() {
            let Some(pty) = Pty::open_or_skip() else { return };
            let fd = pty.slave_fd();
            let before = get_attributes(fd).unwrap();
            let snapshot = enter_raw_mode(fd).unwrap();
            assert!(same_attributes(&before, snapshot.termios()));
            restore(fd, &snapshot).unwrap();
        }

        #[test]
        fn timed_reads_restore_on_drop() {
            let Some(pty) = Pty::open_or_skip() else { return };
            let fd = pty.slave_fd();
            let snapshot = enter_raw_mode(fd).unwrap();
            let raw = get_attributes(fd).unwrap();
            {
                let _timed = TimedReads::engage(fd, 1).unwrap();
                let t = get_attributes(fd).unwrap();
                assert_eq!(t.c_cc[libc::VMIN], 0);
                assert_eq!(t.c_cc[libc::VTIME], 1);
            }
            assert!(same_attributes(&raw, &get_attributes(fd).unwrap()));
            restore(fd, &snapshot).unwrap();
        }
    }
}
