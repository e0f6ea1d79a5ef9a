// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Background key reader — decodes keystrokes on a dedicated thread.
//
// The thread owns a `KeyDecoder` over the input device and hands each
// decoded key to the main thread through a single-slot channel. The main
// thread is either painting a frame or blocked in `recv()`, so one slot is
// all it ever needs. If a key arrives while the slot is still occupied the
// new key is dropped and counted; nothing queues up behind a slow frame.
//
// Shutdown: `DeviceInput` polls the descriptor with a short timeout and
// checks a stop flag between polls, so the thread is never stuck inside a
// blocking `read()` when we want it gone.
//
// Pausing: the cursor-position probe needs the input device to itself for
// up to 100 ms. `InputGate::pause` makes `DeviceInput` stop reading until
// the returned guard is dropped, and waits for any read already in flight.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
#[cfg(unix)]
use std::time::Duration;

use crate::input::{KeyDecoder, KeyEvent};
use crate::raw::Fd;

/// How often the reader checks the stop flag (milliseconds).
///
/// Bounds shutdown latency. 50 ms is not noticeable at exit.
#[cfg(unix)]
const POLL_TIMEOUT_MS: i32 = 50;

/// How long a paused reader sleeps before looking at the gate again.
#[cfg(unix)]
const PAUSED_NAP: Duration = Duration::from_millis(5);

// ─── Input gate ─────────────────────────────────────────────────────────────

/// Shared switch that keeps the reader thread off the input device.
#[derive(Debug, Clone, Default)]
pub struct InputGate {
    inner: Arc<GateState>,
}

#[derive(Debug, Default)]
struct GateState {
    paused: AtomicBool,
    // Held by the reader around each read; taking it proves no read is in flight.
    reading: Mutex<()>,
}

impl InputGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the reader from touching the device until the guard is dropped.
    ///
    /// Returns once any read the reader had already started has finished.
    #[must_use = "the reader resumes as soon as the guard is dropped"]
    pub fn pause(&self) -> GatePause<'_> {
        self.inner.paused.store(true, Ordering::SeqCst);
        drop(self.lock_reading());
        GatePause { gate: self }
    }

    /// Whether a pause is in effect.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    fn lock_reading(&self) -> MutexGuard<'_, ()> {
        self.inner
            .reading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resumes the reader when dropped.
#[derive(Debug)]
pub struct GatePause<'a> {
    gate: &'a InputGate,
}

impl Drop for GatePause<'_> {
    fn drop(&mut self) {
        self.gate.inner.paused.store(false, Ordering::SeqCst);
    }
}

// ─── Device readers ─────────────────────────────────────────────────────────

/// Unbuffered `read()` on a raw descriptor. Does not own or close `fd`.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub struct FdReader {
    fd: Fd,
}

#[cfg(unix)]
impl FdReader {
    #[must_use]
    pub const fn new(fd: Fd) -> Self {
        Self { fd }
    }
}

#[cfg(unix)]
impl Read for FdReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        #[allow(clippy::cast_sign_loss)] // n >= 0 checked above.
        Ok(n as usize)
    }
}

/// The terminal input device as the reader thread sees it.
///
/// Reads report end of stream (`Ok(0)`) once the stop flag is set, so a
/// decoder on top of it finishes cleanly.
pub struct DeviceInput {
    fd: Fd,
    gate: InputGate,
    stop: Arc<AtomicBool>,
}

impl DeviceInput {
    #[must_use]
    pub const fn new(fd: Fd, gate: InputGate, stop: Arc<AtomicBool>) -> Self {
        Self { fd, gate, stop }
    }

    #[cfg(unix)]
    fn poll_readable(&self) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let ready = unsafe { libc::poll(&raw mut pfd, 1, POLL_TIMEOUT_MS) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
        Ok(ready > 0)
    }
}

#[cfg(unix)]
impl Read for DeviceInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return Ok(0);
            }
            if self.gate.is_paused() {
                thread::sleep(PAUSED_NAP);
                continue;
            }
            if !self.poll_readable()? {
                continue;
            }

            let _reading = self.gate.lock_reading();
            if self.gate.is_paused() {
                continue;
            }
            return match FdReader::new(self.fd).read(buf) {
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                other => other,
            };
        }
    }
}

/// Without `poll()` the stop flag is only seen between reads.
#[cfg(not(unix))]
impl Read for DeviceInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let _ = self.fd;
        if self.stop.load(Ordering::Relaxed) {
            return Ok(0);
        }
        let _reading = self.gate.lock_reading();
        io::stdin().lock().read(buf)
    }
}

// ─── KeyReader ──────────────────────────────────────────────────────────────

/// Handle to the background key-decoding thread.
///
/// # Example
///
/// ```
/// use rv_term::input::KeyKind;
/// use rv_term::reader::KeyReader;
///
/// let (mut reader, rx) = KeyReader::spawn(&b"\x1b[A"[..])?;
/// assert_eq!(rx.recv().unwrap().kind, KeyKind::ArrowUp);
/// assert!(rx.recv().is_err()); // end of input closes the channel
/// reader.stop();
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct KeyReader {
    /// `None` after `stop()` joined it.
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl KeyReader {
    /// Decode keys from `input` on a new thread.
    ///
    /// The channel closes when `input` reaches end of stream, a read fails,
    /// or the reader is stopped. `stop()` waits for the thread, so `input`
    /// must eventually return from `read()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn a thread.
    pub fn spawn<R>(input: R) -> io::Result<(Self, Receiver<KeyEvent>)>
    where
        R: Read + Send + 'static,
    {
        Self::spawn_with(input, Arc::new(AtomicBool::new(false)))
    }

    /// Decode keys from the terminal device `fd`, honoring `gate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn a thread.
    pub fn for_device(fd: Fd, gate: InputGate) -> io::Result<(Self, Receiver<KeyEvent>)> {
        let stop = Arc::new(AtomicBool::new(false));
        let input = DeviceInput::new(fd, gate, Arc::clone(&stop));
        Self::spawn_with(input, stop)
    }

    fn spawn_with<R>(input: R, stop: Arc<AtomicBool>) -> io::Result<(Self, Receiver<KeyEvent>)>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let dropped = Arc::new(AtomicU64::new(0));

        let handle = thread::Builder::new().name("key-reader".into()).spawn({
            let stop = Arc::clone(&stop);
            let dropped = Arc::clone(&dropped);
            move || decode_loop(KeyDecoder::new(input), &tx, &stop, &dropped)
        })?;

        Ok((
            Self {
                handle: Some(handle),
                stop,
                dropped,
            },
            rx,
        ))
    }

    /// Keys discarded because the previous one had not been taken yet.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Signal the thread to stop and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("key reader thread panicked");
            }
        }
    }
}

impl Drop for KeyReader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decode until end of stream, a read error, a stop request, or nobody is
/// listening any more.
fn decode_loop<R: Read>(
    mut decoder: KeyDecoder<R>,
    tx: &SyncSender<KeyEvent>,
    stop: &AtomicBool,
    dropped: &AtomicU64,
) {
    while !stop.load(Ordering::Relaxed) {
        let key = match decoder.next_key() {
            Ok(Some(key)) => key,
            Ok(None) => {
                tracing::debug!("input ended");
                break;
            }
            Err(err) => {
                tracing::debug!(%err, "input read failed; closing key channel");
                break;
            }
        };

        match tx.try_send(key) {
            Ok(()) => tracing::trace!(%key, "key decoded"),
            Err(TrySendError::Full(key)) => {
                dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%key, "key dropped; previous key not yet consumed");
            }
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
