//! Newline-delimited JSON framing over a byte stream.
//!
//! Each frame is one JSON document followed by `\n`. Serialized JSON never
//! contains a raw newline, so the delimiter is unambiguous. A frame counts as
//! complete only once its delimiter has been read; trailing bytes at EOF are
//! dropped and reported as a closed channel.

use crate::error::McpError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Reading half of a framed channel.
pub struct FrameReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Wait for the next complete frame, without its delimiter.
    ///
    /// Blank lines are skipped. Fails with [`McpError::ChannelClosed`] when the
    /// stream ends or errors, and with [`McpError::Decode`] when a frame is not
    /// valid UTF-8.
    pub async fn receive(&mut self) -> Result<String, McpError> {
        loop {
            self.buf.clear();
            let read = match self.reader.read_until(b'\n', &mut self.buf).await {
                Ok(read) => read,
                Err(e) => {
                    tracing::debug!("Frame read failed: {e}");
                    return Err(McpError::ChannelClosed);
                }
            };
            if read == 0 {
                return Err(McpError::ChannelClosed);
            }
            if self.buf.last() != Some(&b'\n') {
                tracing::warn!("Discarding {} bytes of unterminated frame at EOF", read);
                return Err(McpError::ChannelClosed);
            }

            let line = std::str::from_utf8(&self.buf)
                .map_err(|e| McpError::Decode(format!("frame is not valid UTF-8: {e}")))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return Ok(line.to_string());
        }
    }

    /// Receive the next frame and decode it as `T`.
    pub async fn receive_message<T: DeserializeOwned>(&mut self) -> Result<T, McpError> {
        let frame = self.receive().await?;
        serde_json::from_str(&frame).map_err(|e| McpError::Decode(format!("{e}: {frame}")))
    }
}

/// Writing half of a framed channel.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize `message` and write it as one frame.
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), McpError> {
        let frame = serde_json::to_string(message)?;
        self.write_frame(&frame).await
    }

    /// Write an already-serialized JSON document as one frame.
    pub async fn write_frame(&mut self, frame: &str) -> Result<(), McpError> {
        debug_assert!(!frame.contains('\n'), "frame must be a single line");
        let result = async {
            self.writer.write_all(frame.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.writer.flush().await
        }
        .await;
        result.map_err(|e| {
            tracing::debug!("Frame write failed: {e}");
            McpError::ChannelClosed
        })
    }

    /// Flush and close the underlying stream.
    pub async fn shutdown(&mut self) -> Result<(), McpError> {
        self.writer.shutdown().await.map_err(McpError::from)
    }
}
