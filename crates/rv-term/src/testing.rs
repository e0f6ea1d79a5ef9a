// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Pseudo-terminal pairs for tests that need a real line discipline.

use std::ffi::CStr;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// A master/slave pty pair. The slave plays the user's terminal device,
/// the master plays the terminal emulator on the other end.
pub struct Pty {
    master: OwnedFd,
    slave: OwnedFd,
}

impl Pty {
    /// Open a fresh pair, or fail if the sandbox has no `/dev/ptmx`.
    pub fn open() -> io::Result<Self> {
        unsafe {
            let master = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
            if master < 0 {
                return Err(io::Error::last_os_error());
            }
            let master = OwnedFd::from_raw_fd(master);
            if libc::grantpt(master.as_raw_fd()) != 0 || libc::unlockpt(master.as_raw_fd()) != 0 {
                return Err(io::Error::last_os_error());
            }

            let mut name = [0 as libc::c_char; 128];
            if libc::ptsname_r(master.as_raw_fd(), name.as_mut_ptr(), name.len()) != 0 {
                return Err(io::Error::last_os_error());
            }
            let path = CStr::from_ptr(name.as_ptr());
            let slave = libc::open(path.as_ptr(), libc::O_RDWR | libc::O_NOCTTY);
            if slave < 0 {
                return Err(io::Error::last_os_error());
            }

            Ok(Self {
                master,
                slave: OwnedFd::from_raw_fd(slave),
            })
        }
    }

    /// Open a pair for a test, or say on stderr why the test is not running.
    ///
    /// Callers return early on `None`. Run with `--nocapture` to see which
    /// tests were skipped.
    pub fn open_or_skip() -> Option<Self> {
        match Self::open() {
            Ok(pty) => Some(pty),
            Err(err) => {
                let test = std::thread::current().name().unwrap_or("?").to_owned();
                eprintln!("SKIPPED {test}: no pseudo-terminal available ({err})");
                None
            }
        }
    }

    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    pub fn slave_fd(&self) -> RawFd {
        self.slave.as_raw_fd()
    }

    /// Set the window size the slave side reports.
    pub fn set_size(&self, cols: u16, rows: u16) -> io::Result<()> {
        let ws = libc::winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        if unsafe { libc::ioctl(self.master_fd(), libc::TIOCSWINSZ, &raw const ws) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Write bytes as if the terminal emulator sent them to the program.
    pub fn send(&self, bytes: &[u8]) -> io::Result<()> {
        let n = unsafe { libc::write(self.master_fd(), bytes.as_ptr().cast(), bytes.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Read whatever the program wrote to its terminal, waiting up to
    /// `timeout_ms` for the first byte.
    pub fn receive(&self, timeout_ms: i32) -> io::Result<Vec<u8>> {
        let mut pfd = libc::pollfd {
            fd: self.master_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        if unsafe { libc::poll(&raw mut pfd, 1, timeout_ms) } <= 0 {
            return Ok(Vec::new());
        }
        let mut buf = [0u8; 1024];
        let n = unsafe { libc::read(self.master_fd(), buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        #[allow(clippy::cast_sign_loss)]
        Ok(buf[..n as usize].to_vec())
    }
}

/// Field-by-field termios equality (padding bytes are not compared).
pub fn same_attributes(a: &libc::termios, b: &libc::termios) -> bool {
    a.c_iflag == b.c_iflag
        && a.c_oflag == b.c_oflag
        && a.c_cflag == b.c_cflag
        && a.c_lflag == b.c_lflag
        && a.c_cc == b.c_cc
        && unsafe { libc::cfgetispeed(a) == libc::cfgetispeed(b) }
        && unsafe { libc::cfgetospeed(a) == libc::cfgetospeed(b) }
}
