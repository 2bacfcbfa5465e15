//! Newline-delimited JSON-RPC transport.
//!
//! MCP's stdio transport frames messages as single lines:
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - stderr may be used for logging (not MCP messages)
//!
//! [`LineTransport`] implements that framing over any async reader/writer
//! pair, so the same code serves stdin/stdout and each TCP connection.
//! Incoming lines are capped at [`MAX_MESSAGE_BYTES`] unless configured
//! otherwise.

use std::io;

use serde::Serialize;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Default limit on one incoming message, excluding the newline.
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// Line-framed message transport.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
    max_message_bytes: usize,
}

/// Transport over the process's stdin/stdout.
pub type StdioTransport = LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

/// Transport over one accepted TCP connection.
pub type TcpTransport = LineTransport<BufReader<OwnedReadHalf>, OwnedWriteHalf>;

impl StdioTransport {
    /// Creates a transport on stdin/stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl TcpTransport {
    /// Creates a transport on a connected socket.
    #[must_use]
    pub fn tcp(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self::new(BufReader::new(read_half), write_half)
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wraps a buffered reader and a writer.
    pub const fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            max_message_bytes: MAX_MESSAGE_BYTES,
        }
    }

    /// Sets the largest accepted message, excluding the newline.
    #[must_use]
    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    /// Reads the next message line.
    ///
    /// Returns `None` when the peer closes its side (EOF).
    ///
    /// # Errors
    ///
    /// Returns an `InvalidData` error if the line is longer than the message
    /// limit or not UTF-8, and any error from the reader.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        // One byte over the limit leaves room for the newline
        let limit = u64::try_from(self.max_message_bytes)
            .unwrap_or(u64::MAX)
            .saturating_add(1);

        let mut buf = Vec::new();
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            return Ok(None);
        }

        if buf.last() != Some(&b'\n') && buf.len() > self.max_message_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "message exceeds the {} byte limit",
                    self.max_message_bytes
                ),
            ));
        }

        let mut line =
            String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let trimmed_len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed_len);
        Ok(Some(line))
    }

    /// Serialises `message` as one line and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn send<T: Serialize>(&mut self, message: &T) -> io::Result<()> {
        let json = serde_json::to_string(message)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // serde_json escapes newlines inside strings, so compact output is one line
        debug_assert!(!json.contains('\n'));

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_test::io::Builder;

    use super::*;
    use crate::mcp::protocol::{RequestId, Response};

    #[tokio::test]
    async fn reads_lines_and_strips_terminators() {
        let reader = Builder::new()
            .read(b"{\"a\":1}\r\n{\"b\":2}\n")
            .read(b"tail-without-newline")
            .build();
        let mut transport = LineTransport::new(BufReader::new(reader), Builder::new().build());

        assert_eq!(transport.read_line().await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(transport.read_line().await.unwrap().as_deref(), Some("{\"b\":2}"));
        assert_eq!(
            transport.read_line().await.unwrap().as_deref(),
            Some("tail-without-newline")
        );
        assert_eq!(transport.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_line_is_rejected() {
        let reader = Builder::new()
            .read(b"0123456789")
            .read(b"abcdefghij")
            .build();
        let mut transport = LineTransport::new(BufReader::new(reader), Builder::new().build())
            .with_max_message_bytes(16);

        let err = transport.read_line().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("16 byte limit"));
    }

    #[tokio::test]
    async fn line_at_the_limit_is_accepted() {
        let reader = Builder::new().read(b"0123456789abcdef\nnext\n").build();
        let mut transport = LineTransport::new(BufReader::new(reader), Builder::new().build())
            .with_max_message_bytes(16);

        assert_eq!(
            transport.read_line().await.unwrap().as_deref(),
            Some("0123456789abcdef")
        );
        assert_eq!(transport.read_line().await.unwrap().as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn invalid_utf8_is_rejected() {
        let reader = Builder::new().read(b"\xff\xfe\n").build();
        let mut transport = LineTransport::new(BufReader::new(reader), Builder::new().build());

        let err = transport.read_line().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn writes_one_line_per_message() {
        let writer = Builder::new()
            .write(br#"{"jsonrpc":"2.0","id":1,"result":{"text":"a\nb"}}"#)
            .write(b"\n")
            .build();
        let mut transport = LineTransport::new(BufReader::new(Builder::new().build()), writer);

        let response = Response::success(RequestId::Number(1), json!({"text": "a\nb"}));
        transport.send(&response).await.unwrap();
    }
}
