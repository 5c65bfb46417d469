//! Demultiplexing of Docker's combined stdout/stderr stream.
//!
//! When a container or exec runs without a TTY, the daemon multiplexes both
//! output streams over one connection. Every frame starts with
//! `[stream, 0, 0, 0, len_be_u32]` and is followed by `len` payload bytes.

use std::io::Write;

use bollard::container::LogOutput;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Size of a frame header.
pub const HEADER_LEN: usize = 8;

/// Output stream a frame belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Stream type `1`.
    Stdout,
    /// Stream type `2`.
    Stderr,
}

impl StreamKind {
    /// Maps a header's stream byte to a kind.
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            1 => Ok(StreamKind::Stdout),
            2 => Ok(StreamKind::Stderr),
            other => Err(Error::UnknownStream(other)),
        }
    }

    /// The header byte for this kind.
    pub fn as_byte(self) -> u8 {
        match self {
            StreamKind::Stdout => 1,
            StreamKind::Stderr => 2,
        }
    }
}

/// One decoded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Stream the payload was written to.
    pub kind: StreamKind,
    /// Payload bytes.
    pub payload: Bytes,
}

/// Takes one complete frame off the front of `buf`.
///
/// Returns `Ok(None)` and leaves `buf` untouched while the frame is still
/// incomplete.
pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<Frame>> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let kind = StreamKind::from_byte(buf[0])?;
    let len = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
    if buf.len() < HEADER_LEN + len {
        buf.reserve(HEADER_LEN + len - buf.len());
        return Ok(None);
    }
    buf.advance(HEADER_LEN);
    let payload = buf.split_to(len).freeze();
    Ok(Some(Frame { kind, payload }))
}

/// Encodes `payload` as a single frame.
pub fn encode_frame(kind: StreamKind, payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(HEADER_LEN + payload.len());
    out.put_u8(kind.as_byte());
    out.put_bytes(0, 3);
    out.put_u32(payload.len() as u32);
    out.put_slice(payload);
    out.freeze()
}

fn truncated(buf: &BytesMut) -> Error {
    let expected = if buf.len() >= HEADER_LEN {
        HEADER_LEN + u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize
    } else {
        HEADER_LEN
    };
    Error::TruncatedFrame {
        expected,
        got: buf.len(),
    }
}

/// Reads framed output from `reader` and copies each payload to its sink.
///
/// Ends successfully on EOF at a frame boundary. EOF inside a frame and
/// frames for unknown streams are errors.
pub async fn demux_reader<R>(
    mut reader: R,
    stdout: &mut (dyn Write + Send),
    stderr: &mut (dyn Write + Send),
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(8 * 1024);
    loop {
        while let Some(frame) = decode_frame(&mut buf)? {
            write_frame(&frame, stdout, stderr)?;
        }
        if reader.read_buf(&mut buf).await? == 0 {
            if buf.is_empty() {
                stdout.flush()?;
                stderr.flush()?;
                return Ok(());
            }
            return Err(truncated(&buf));
        }
    }
}

fn write_frame(
    frame: &Frame,
    stdout: &mut (dyn Write + Send),
    stderr: &mut (dyn Write + Send),
) -> Result<()> {
    match frame.kind {
        StreamKind::Stdout => stdout.write_all(&frame.payload)?,
        StreamKind::Stderr => stderr.write_all(&frame.payload)?,
    }
    Ok(())
}

/// Routes an already demultiplexed bollard output stream to sinks.
///
/// bollard decodes the framing itself; this keeps the same stream rules on
/// top of it. Input echoes (stream `0`) and console output (reported as
/// stream `3`) are rejected as unknown.
pub async fn route_output<S>(
    mut stream: S,
    stdout: &mut (dyn Write + Send),
    stderr: &mut (dyn Write + Send),
) -> Result<()>
where
    S: Stream<Item = std::result::Result<LogOutput, bollard::errors::Error>> + Unpin,
{
    while let Some(item) = stream.next().await {
        match item? {
            LogOutput::StdOut { message } => stdout.write_all(&message)?,
            LogOutput::StdErr { message } => stderr.write_all(&message)?,
            LogOutput::StdIn { .. } => return Err(Error::UnknownStream(0)),
            LogOutput::Console { .. } => return Err(Error::UnknownStream(3)),
        }
    }
    stdout.flush()?;
    stderr.flush()?;
    Ok(())
}
