//! stdio transport for MCP server.
//!
//! This module implements the stdio transport as specified by MCP:
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - stdin: receives messages from client
//! - stdout: sends messages to client
//! - stderr: may be used for logging (not MCP messages)
//!
//! # Thread Safety
//!
//! Reading is owned by the single run loop. Writing goes through
//! [`FrameWriter`], a cloneable handle whose lock is held for the whole of
//! one frame, so concurrently dispatched requests never interleave output.

use std::io;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// Reads newline-delimited frames from a byte stream.
pub struct FrameReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    /// Wraps a buffered reader.
    #[must_use]
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Reads the next non-blank frame, trimmed of surrounding whitespace.
    ///
    /// Returns `None` at end of stream. Bytes left over without a
    /// terminating newline when the stream closes are discarded.
    ///
    /// Cancel safe: bytes of a partially read frame stay buffered and the
    /// next call resumes where the cancelled one stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    pub async fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            self.reader.read_until(b'\n', &mut self.buf).await?;

            if self.buf.last() != Some(&b'\n') {
                if !trim_whitespace(&self.buf).is_empty() {
                    tracing::warn!(
                        bytes = self.buf.len(),
                        "Discarding unterminated frame at end of input"
                    );
                }
                self.buf.clear();
                return Ok(None);
            }

            let frame = trim_whitespace(&self.buf).to_vec();
            self.buf.clear();
            if frame.is_empty() {
                continue;
            }

            tracing::trace!(frame = %String::from_utf8_lossy(&frame), "Received frame");
            return Ok(Some(frame));
        }
    }
}

/// Strips leading and trailing ASCII whitespace (including `\r\n`).
fn trim_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Serialised, newline-terminated writes to a single output stream.
///
/// Cloning shares the same stream and lock.
pub struct FrameWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for FrameWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    /// Wraps an output stream.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Serialises a message and writes it as one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> io::Result<()> {
        let json = serde_json::to_vec(message)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        self.write_frame(json).await
    }

    /// Writes one JSON text followed by a newline, in a single write.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or flushing fails.
    pub async fn write_frame(&self, mut json: Vec<u8>) -> io::Result<()> {
        // MCP spec: messages must not contain embedded newlines
        debug_assert!(
            !json.contains(&b'\n'),
            "JSON message must not contain embedded newlines"
        );

        tracing::trace!(frame = %String::from_utf8_lossy(&json), "Sending frame");
        json.push(b'\n');

        let mut writer = self.inner.lock().await;
        writer.write_all(&json).await?;
        writer.flush().await?;

        Ok(())
    }
}

/// A paired reader and writer over one bidirectional channel.
pub struct Transport<R, W> {
    /// Incoming frames.
    pub reader: FrameReader<R>,
    /// Outgoing frames.
    pub writer: FrameWriter<W>,
}

impl<R, W> Transport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    /// Builds a transport from a reader and a writer.
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }
}

/// The transport over the process's stdin and stdout.
pub type StdioTransport = Transport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioTransport {
    /// Creates a transport reading stdin and writing stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}
