// SPDX-License-Identifier: MIT
//
// Event loop — repaint, wait for a key, repeat.
//
// Each iteration resolves the terminal geometry, builds one complete frame
// in an `OutputBuffer`, hands it to the terminal in a single write, then
// blocks until the key reader delivers the next key. There is no tick and
// no idle redraw: the screen only changes in answer to a keystroke.
//
// Frame layout, in order:
//
//   ESC[?25l   hide the cursor while we draw
//   ESC[3J     drop the scrollback
//   ESC[2J     clear the screen
//   ESC[H      home
//   ...rows... whatever the application paints
//   ESC[r;cH   put the cursor where the application wants it
//   ESC[?25h   show it again
//
// The loop ends when the application answers `Action::Quit` or the key
// channel closes (end of input, read failure). `run` restores the terminal
// on every path before returning, and only then prints the application's
// farewell so it lands on the user's normal screen.

use std::io::{self, Write};
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crate::ansi;
use crate::error::{Result, TermError};
use crate::geometry::{Geometry, Resolver};
use crate::input::KeyEvent;
use crate::output::OutputBuffer;
use crate::reader::{InputGate, KeyReader};
use crate::terminal::Terminal;

// ─── App Trait ───────────────────────────────────────────────────────────────

/// What the application tells the event loop to do after handling a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Repaint and wait for the next key.
    Continue,
    /// Exit the event loop cleanly.
    Quit,
}

/// Application interface for the event loop.
///
/// Per iteration the loop calls [`paint`](App::paint), then
/// [`cursor`](App::cursor), writes the frame, and calls
/// [`on_key`](App::on_key) once the next key arrives.
pub trait App {
    /// Handle one decoded key. `geometry` is the one the current frame
    /// was painted with.
    ///
    /// Return [`Action::Quit`] to exit the event loop.
    fn on_key(&mut self, key: &KeyEvent, geometry: Geometry) -> Action;

    /// Write the visible rows. The screen has been cleared and the cursor
    /// is at the top-left corner.
    ///
    /// # Errors
    ///
    /// Only errors from writing to `out` are expected here.
    fn paint(&mut self, out: &mut OutputBuffer, geometry: Geometry) -> io::Result<()>;

    /// Where the cursor goes after painting, as `(col, row)`, 0-indexed.
    /// Positions outside `geometry` are clamped to the last cell.
    fn cursor(&self, geometry: Geometry) -> (u16, u16);

    /// A line printed after the terminal has been restored.
    fn farewell(&self) -> Option<&str> {
        None
    }
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Event loop configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// How long to wait for a cursor-position reply. Default: 100 ms.
    pub probe_timeout: Duration,
    /// Geometry used when neither the driver nor the terminal answers.
    /// Default: 80×25.
    pub fallback: Geometry,
    /// Draw on the alternate screen. Default: true.
    pub alternate_screen: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(100),
            fallback: Geometry::DEFAULT,
            alternate_screen: true,
        }
    }
}

/// Why the frame loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The application asked to quit.
    Quit,
    /// The key channel closed.
    EndOfInput,
}

/// What a finished run looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub reason: ExitReason,
    /// Keys discarded because a frame was still being drawn.
    pub dropped_keys: u64,
}

// ─── EventLoop ───────────────────────────────────────────────────────────────

/// The terminal event loop.
///
/// # Example
///
/// ```no_run
/// use std::io;
/// use rv_term::event_loop::{Action, App, EventLoop, LoopConfig};
/// use rv_term::geometry::Geometry;
/// use rv_term::input::KeyEvent;
/// use rv_term::output::OutputBuffer;
///
/// struct Blank;
///
/// impl App for Blank {
///     fn on_key(&mut self, key: &KeyEvent, _geometry: Geometry) -> Action {
///         if key.is_ctrl('q') { Action::Quit } else { Action::Continue }
///     }
///
///     fn paint(&mut self, _out: &mut OutputBuffer, _geometry: Geometry) -> io::Result<()> {
///         Ok(())
///     }
///
///     fn cursor(&self, _geometry: Geometry) -> (u16, u16) {
///         (0, 0)
///     }
/// }
///
/// let _outcome = EventLoop::new(LoopConfig::default()).run(&mut Blank)?;
/// # Ok::<(), rv_term::TermError>(())
/// ```
#[derive(Debug)]
pub struct EventLoop {
    terminal: Terminal,
    config: LoopConfig,
}

impl EventLoop {
    #[must_use]
    pub const fn new(config: LoopConfig) -> Self {
        Self {
            terminal: Terminal::new(config.alternate_screen),
            config,
        }
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Run until the application quits or input ends.
    ///
    /// This method:
    /// 1. Enters raw mode (and the alternate screen)
    /// 2. Spawns the background key reader
    /// 3. Runs the repaint / await-input loop
    /// 4. Stops the reader and restores the terminal, even on error
    /// 5. Prints the application's farewell
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be configured or restored,
    /// or if a frame cannot be written.
    pub fn run(&mut self, app: &mut impl App) -> Result<Outcome> {
        self.terminal.enter()?;

        let gate = InputGate::new();
        let (mut reader, rx) = match KeyReader::for_device(self.terminal.input_fd(), gate.clone()) {
            Ok(spawned) => spawned,
            Err(err) => {
                let _ = self.terminal.leave();
                return Err(err.into());
            }
        };
        let mut resolver = Resolver::for_terminal(
            self.terminal.input_fd(),
            self.terminal.output_fd(),
            gate,
            self.config.probe_timeout,
            self.config.fallback,
        );

        #[cfg(unix)]
        let mut out = crate::output::FdWriter::new(self.terminal.output_fd());
        #[cfg(not(unix))]
        let mut out = io::stdout();
        let result = run_frames(app, &rx, &mut resolver, &mut out);

        // Always clean up, even if the loop errored.
        reader.stop();
        let dropped_keys = reader.dropped();
        self.terminal.leave()?;

        let reason = result.map_err(TermError::from)?;
        tracing::info!(?reason, dropped_keys, "event loop finished");

        if let Some(message) = app.farewell() {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{message}")?;
            stdout.flush()?;
        }

        Ok(Outcome {
            reason,
            dropped_keys,
        })
    }
}

/// The frame loop without any device setup.
///
/// # Errors
///
/// Returns an error if painting or writing a frame fails.
pub fn run_frames(
    app: &mut impl App,
    rx: &Receiver<KeyEvent>,
    resolver: &mut Resolver,
    out: &mut impl Write,
) -> io::Result<ExitReason> {
    let mut frame = OutputBuffer::new();

    loop {
        let resolved = resolver.resolve();
        let geometry = resolved.geometry;

        compose_frame(app, geometry, &mut frame)?;
        frame.flush_to(out)?;

        let Ok(key) = rx.recv() else {
            tracing::debug!("key channel closed");
            return Ok(ExitReason::EndOfInput);
        };
        tracing::debug!(%key, "key received");

        if app.on_key(&key, geometry) == Action::Quit {
            return Ok(ExitReason::Quit);
        }
    }
}

/// Build one complete frame into `frame`, replacing what was there.
///
/// # Errors
///
/// Returns an error if the application's paint fails.
pub fn compose_frame(app: &mut impl App, geometry: Geometry, frame: &mut OutputBuffer) -> io::Result<()> {
    frame.clear();
    ansi::cursor_hide(frame)?;
    ansi::clear_scrollback(frame)?;
    ansi::clear_screen(frame)?;
    ansi::cursor_home(frame)?;

    app.paint(frame, geometry)?;

    let (col, row) = app.cursor(geometry);
    ansi::cursor_to(frame, col.min(geometry.last_col()), row.min(geometry.last_row()))?;
    ansi::cursor_show(frame)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
