// SPDX-License-Identifier: MIT
//
// Terminal lifecycle — raw mode, alternate screen, and restoration on every
// way out.
//
// Safety: `isatty` and the raw fd write in the emergency path have no safe
// wrapper in std. Each unsafe block is a single libc call.
#![allow(unsafe_code)]
//
// The snapshot taken on entry lives in one process-global slot. Whoever
// leaves first takes it out and writes it back: `Terminal::leave`, `Drop`,
// the panic hook, or the signal watcher thread. The mutex is held from the
// take until the attributes are written back, so the device is restored
// exactly once, and the signal watcher never exits the process while a
// restore is still half done.
//
// The panic hook and the signal watcher bypass Rust's stdout lock and write
// a short restore sequence straight to fd 1. The panic may have happened
// while the lock was held (mid-frame), and the signal may arrive while the
// main thread is blocked inside a write.

use std::io::{self, Write};
use std::sync::{Mutex, Once, PoisonError, TryLockError};

use crate::ansi;
use crate::error::Result;
use crate::raw::{self, Fd, RawModeSnapshot, STDIN, STDOUT};

// ─── Snapshot slot ──────────────────────────────────────────────────────────

/// The descriptor in raw mode and what it looked like before.
type Slot = Mutex<Option<(Fd, RawModeSnapshot)>>;

static SAVED: Slot = Mutex::new(None);

fn save_snapshot(fd: Fd, snapshot: RawModeSnapshot) {
    *SAVED.lock().unwrap_or_else(PoisonError::into_inner) = Some((fd, snapshot));
}

/// Restore the saved attributes if nobody has yet.
///
/// Returns `Ok(false)` if there was nothing to restore.
fn restore_saved() -> Result<bool> {
    restore_from(&SAVED)
}

/// Take the snapshot out of `slot` and write it back, holding the lock until
/// the device is restored. A second caller blocks until the first is done,
/// then finds the slot empty.
fn restore_from(slot: &Slot) -> Result<bool> {
    let mut saved = slot.lock().unwrap_or_else(PoisonError::into_inner);
    match saved.take() {
        Some((fd, snapshot)) => raw::restore(fd, &snapshot).map(|()| true),
        None => Ok(false),
    }
}

/// Restore for the panic path. The panic may have happened while this thread
/// held the lock, so it gives up instead of waiting.
fn restore_saved_quietly() {
    let mut saved = match SAVED.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => return,
    };
    if let Some((fd, snapshot)) = saved.take() {
        let _ = raw::restore(fd, &snapshot);
    }
}

// ─── Emergency restore ──────────────────────────────────────────────────────

/// Reset attributes, show the cursor, leave the alternate screen.
///
/// Alternate screen exit is last so the shell's screen comes back clean.
const EMERGENCY_RESTORE: &[u8] = b"\x1b[0m\x1b[?25h\x1b[?1049l";

fn write_emergency_sequence() {
    #[cfg(unix)]
    unsafe {
        let _ = libc::write(
            libc::STDOUT_FILENO,
            EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
            EMERGENCY_RESTORE.len(),
        );
    }

    #[cfg(not(unix))]
    {
        let _ = io::stdout().write_all(EMERGENCY_RESTORE);
        let _ = io::stdout().flush();
    }
}

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Restore the terminal before the default panic message is printed.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            write_emergency_sequence();
            restore_saved_quietly();
            original(info);
        }));
    });
}

static SIGNAL_WATCHER_INSTALLED: Once = Once::new();

/// Restore the terminal and exit on SIGTERM, SIGHUP, SIGQUIT or SIGINT.
///
/// The watcher lives for the rest of the process. It keeps the usual
/// "terminated by signal" exit status convention of 128 + signal number.
#[cfg(unix)]
fn install_signal_watcher() {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
    use signal_hook::iterator::Signals;

    SIGNAL_WATCHER_INSTALLED.call_once(|| {
        let mut signals = match Signals::new([SIGTERM, SIGHUP, SIGQUIT, SIGINT]) {
            Ok(signals) => signals,
            Err(err) => {
                tracing::warn!(%err, "cannot watch termination signals");
                return;
            }
        };
        let spawned = std::thread::Builder::new()
            .name("signal-watcher".into())
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    tracing::info!(signal, "termination signal received; restoring terminal");
                    write_emergency_sequence();
                    // Waits out a restore the main thread already started.
                    let _ = restore_saved();
                    std::process::exit(128 + signal);
                }
            });
        if let Err(err) = spawned {
            tracing::warn!(%err, "cannot spawn signal watcher thread");
        }
    });
}

#[cfg(not(unix))]
fn install_signal_watcher() {
    SIGNAL_WATCHER_INSTALLED.call_once(|| {});
}

// ─── Queries ────────────────────────────────────────────────────────────────

/// Whether `fd` is connected to a terminal.
#[cfg(unix)]
#[must_use]
pub fn is_tty(fd: Fd) -> bool {
    unsafe { libc::isatty(fd) != 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty(_fd: Fd) -> bool {
    false
}

// ─── Terminal ───────────────────────────────────────────────────────────────

/// Terminal handle with RAII cleanup.
///
/// [`enter`](Self::enter) puts stdin into raw mode and (optionally) switches
/// stdout to the alternate screen. The terminal is restored by
/// [`leave`](Self::leave), on drop, on panic, and on termination signals,
/// whichever comes first.
///
/// # Example
///
/// ```no_run
/// use rv_term::terminal::Terminal;
///
/// let mut term = Terminal::new(true);
/// term.enter()?;
/// // ... render frames, handle input ...
/// term.leave()?;
/// # Ok::<(), rv_term::TermError>(())
/// ```
#[derive(Debug)]
pub struct Terminal {
    input_fd: Fd,
    alternate_screen: bool,
    active: bool,
}

impl Terminal {
    /// A handle for stdin/stdout. Does not touch the device yet.
    #[must_use]
    pub const fn new(alternate_screen: bool) -> Self {
        Self {
            input_fd: STDIN,
            alternate_screen,
            active: false,
        }
    }

    /// The descriptor keys are read from.
    #[inline]
    #[must_use]
    pub const fn input_fd(&self) -> Fd {
        self.input_fd
    }

    /// The descriptor frames are written to.
    #[inline]
    #[must_use]
    pub const fn output_fd(&self) -> Fd {
        STDOUT
    }

    /// Whether raw mode is currently in effect.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Enter raw mode and the alternate screen. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`TermError::NotATerminal`](crate::TermError::NotATerminal)
    /// or [`TermError::Attributes`](crate::TermError::Attributes) if raw
    /// mode cannot be set up, and [`TermError::Io`](crate::TermError::Io)
    /// if the screen switch cannot be written. The device is left as it was
    /// found in every error case.
    pub fn enter(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }

        install_panic_hook();
        install_signal_watcher();

        let snapshot = raw::enter_raw_mode(self.input_fd)?;
        save_snapshot(self.input_fd, snapshot);
        self.active = true;

        if let Err(err) = self.write_enter_sequence() {
            let _ = self.leave();
            return Err(err.into());
        }

        tracing::info!(alternate_screen = self.alternate_screen, "terminal entered");
        Ok(())
    }

    fn write_enter_sequence(&self) -> io::Result<()> {
        let mut lock = io::stdout().lock();
        if self.alternate_screen {
            ansi::enter_alt_screen(&mut lock)?;
        }
        ansi::cursor_hide(&mut lock)?;
        lock.flush()
    }

    /// Show the cursor, leave the alternate screen, restore the attributes.
    /// Idempotent.
    ///
    /// The attributes are restored even if the screen sequences cannot be
    /// written.
    ///
    /// # Errors
    ///
    /// Returns the first failure: writing the screen sequences, or
    /// restoring the attributes.
    pub fn leave(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let written = self.write_leave_sequence();
        let restored = restore_saved();

        written?;
        if restored? {
            tracing::info!("terminal restored");
        }
        Ok(())
    }

    fn write_leave_sequence(&self) -> io::Result<()> {
        let mut lock = io::stdout().lock();
        ansi::reset(&mut lock)?;
        ansi::cursor_show(&mut lock)?;
        if self.alternate_screen {
            ansi::exit_alt_screen(&mut lock)?;
        }
        lock.flush()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if let Err(err) = self.leave() {
            tracing::warn!(%err, "failed to restore terminal on drop");
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
