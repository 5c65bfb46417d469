//! A [`Write`] sink that hands complete lines to a callback.
//!
//! Used to turn container output into one log event per line.

use std::io::{self, Write};

/// Buffers written bytes and calls `on_line` once per `\n`-terminated line.
///
/// The line passed to the callback excludes the newline. Bytes after the
/// last newline are held until more data arrives or the writer is finished
/// (explicitly via [`LineWriter::finish`] or on drop).
pub struct LineWriter<F: FnMut(&str)> {
    on_line: F,
    buf: Vec<u8>,
}

impl<F: FnMut(&str)> LineWriter<F> {
    /// Creates a writer that reports lines to `on_line`.
    pub fn new(on_line: F) -> Self {
        Self {
            on_line,
            buf: Vec::new(),
        }
    }

    /// Emits any buffered partial line.
    pub fn finish(&mut self) {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            (self.on_line)(&String::from_utf8_lossy(&rest));
        }
    }

    fn drain_lines(&mut self) {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            (self.on_line)(&String::from_utf8_lossy(&line[..pos]));
        }
    }
}

impl<F: FnMut(&str)> Write for LineWriter<F> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        self.drain_lines();
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<F: FnMut(&str)> Drop for LineWriter<F> {
    fn drop(&mut self) {
        self.finish();
    }
}
