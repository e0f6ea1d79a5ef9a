// SPDX-License-Identifier: MIT
//
// Frame output buffering.
//
// Every byte of a frame (cursor hide, clears, row text, cursor placement)
// is accumulated here first and handed to the device in one write. Writing
// row by row lets the terminal paint half a frame before the rest arrives,
// which shows up as tearing.
//
// `FdWriter` is the unbuffered sink for frames. `io::stdout()` is line
// buffered and would split a multi-row frame at its last newline.
#![allow(unsafe_code)]

use std::io::{self, Write};

use crate::raw::Fd;

/// A byte buffer that accumulates ANSI output for a single `write()` call.
///
/// Default capacity: 16 KB, enough for a full 80×25 or 200×60 frame
/// without reallocation.
pub struct OutputBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 16_384;

impl OutputBuffer {
    /// Create an empty buffer with default capacity (16 KB).
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Number of bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes (for testing and debugging).
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append a string verbatim.
    #[inline]
    pub fn push_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Clear the buffer for reuse (keeps allocated capacity).
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write accumulated output to `w` in one call, flush, and clear.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails. The buffer keeps its
    /// contents in that case.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if !self.buf.is_empty() {
            w.write_all(&self.buf)?;
            w.flush()?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Real flushing happens in flush_to().
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Unbuffered writes straight to a descriptor: one `write_all` is one
/// `write(2)` unless the kernel takes the bytes in pieces.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub struct FdWriter {
    fd: Fd,
}

#[cfg(unix)]
impl FdWriter {
    #[must_use]
    pub const fn new(fd: Fd) -> Self {
        Self { fd }
    }
}

#[cfg(unix)]
impl Write for FdWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe { libc::write(self.fd, buf.as_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        #[allow(clippy::cast_sign_loss)] // n >= 0 checked above.
        Ok(n as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts `write` calls so we can prove a frame goes out in one piece.
    struct CountingWriter {
        writes: usize,
        flushes: usize,
        data: Vec<u8>,
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes += 1;
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn new_is_empty() {
        let out = OutputBuffer::new();
        assert!(out.is_empty());
        assert_eq!(out.len(), 0);
    }

    #[test]
    fn write_accumulates() {
        let mut out = OutputBuffer::new();
        out.write_all(b"\x1b[2J").unwrap();
        out.push_str("hello");
        assert_eq!(out.as_bytes(), b"\x1b[2Jhello");
        assert_eq!(out.len(), 9);
    }

    #[test]
    fn flush_to_is_single_write() {
        let mut out = OutputBuffer::new();
        for _ in 0..100 {
            out.push_str("row\r\n");
        }
        let mut w = CountingWriter {
            writes: 0,
            flushes: 0,
            data: Vec::new(),
        };
        out.flush_to(&mut w).unwrap();
        assert_eq!(w.writes, 1);
        assert_eq!(w.flushes, 1);
        assert_eq!(w.data.len(), 500);
        assert!(out.is_empty());
    }

    #[test]
    fn flush_empty_writes_nothing() {
        let mut out = OutputBuffer::new();
        let mut w = CountingWriter {
            writes: 0,
            flushes: 0,
            data: Vec::new(),
        };
        out.flush_to(&mut w).unwrap();
        assert_eq!(w.writes, 0);
        assert_eq!(w.flushes, 0);
    }

    #[cfg(unix)]
    mod fd {
        use super::super::*;

        /// A pipe whose read end does not block.
        fn pipe() -> (Fd, Fd) {
            let mut fds = [0; 2];
            assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
            unsafe { libc::fcntl(fds[0], libc::F_SETFL, libc::O_NONBLOCK) };
            (fds[0], fds[1])
        }

        fn drain(fd: Fd) -> Vec<u8> {
            let mut buf = [0u8; 4096];
            let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
            usize::try_from(n).map(|n| buf[..n].to_vec()).unwrap_or_default()
        }

        fn close(fds: (Fd, Fd)) {
            unsafe {
                libc::close(fds.0);
                libc::close(fds.1);
            }
        }

        #[test]
        fn frame_reaches_the_descriptor_whole() {
            let fds = pipe();
            let mut out = OutputBuffer::new();
            out.push_str("\x1b[?25l\x1b[Krow 1\r\n\x1b[Krow 2\x1b[1;1H\x1b[?25h");
            let frame = out.as_bytes().to_vec();

            out.flush_to(&mut FdWriter::new(fds.1)).unwrap();
            // One read gets everything, including the bytes after the last
            // newline.
            assert_eq!(drain(fds.0), frame);
            assert!(out.is_empty());
            close(fds);
        }

        #[test]
        fn writes_are_not_held_back_until_flush() {
            let fds = pipe();
            let mut writer = FdWriter::new(fds.1);
            writer.write_all(b"a\r\nb").unwrap();
            assert_eq!(drain(fds.0), b"a\r\nb");
            close(fds);
        }
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut out = OutputBuffer::new();
        out.push_str("abc");
        let cap = out.buf.capacity();
        out.clear();
        assert!(out.is_empty());
        assert_eq!(out.buf.capacity(), cap);
    }
}
