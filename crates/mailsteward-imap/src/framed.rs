//! Buffered line-oriented I/O over an [`ImapStream`](crate::ImapStream).
//!
//! IMAP is CRLF-line framed; a command's response is every line up to
//! and including the line echoing the command's tag. Reads are bounded
//! by the configured response timeout — a deadline miss is the only
//! cancellation mechanism the protocol driver has.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Bound on the graceful-close wait before the connection is dropped.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Buffered connection with per-read deadlines.
pub(crate) struct FramedConnection<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    response_timeout: Duration,
}

impl<S> FramedConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed connection.
    pub(crate) fn new(stream: S, response_timeout: Duration) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            response_timeout,
        }
    }

    /// Reads a single line (terminator included), or fails with a
    /// timeout error when the server stays silent past the deadline.
    pub(crate) async fn read_line(&mut self) -> Result<Vec<u8>> {
        match timeout(self.response_timeout, self.read_line_inner()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.response_timeout)),
        }
    }

    async fn read_line_inner(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Socket(
                    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed").to_string(),
                ));
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..=pos]);
                self.reader.consume(pos + 1);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Response("line too long".to_string()));
            }
        }

        Ok(line)
    }

    /// Reads lines until the one echoing `tag`, returning the raw
    /// accumulated response bytes.
    pub(crate) async fn read_until_tag(&mut self, tag: &str) -> Result<Vec<u8>> {
        let mut raw = Vec::new();

        loop {
            let line = self.read_line().await?;
            let is_tagged = line
                .get(..tag.len())
                .is_some_and(|prefix| prefix == tag.as_bytes())
                && line.get(tag.len()).is_some_and(|&b| b == b' ');

            raw.extend_from_slice(&line);

            if is_tagged {
                break;
            }
        }

        Ok(raw)
    }

    /// Writes a complete command line to the stream.
    pub(crate) async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Requests a graceful close, bounded by [`SHUTDOWN_TIMEOUT`]; when
    /// the peer does not confirm in time the connection is dropped.
    pub(crate) async fn shutdown(mut self) {
        let stream = self.reader.get_mut();
        if timeout(SHUTDOWN_TIMEOUT, stream.shutdown()).await.is_err() {
            tracing::warn!("graceful close timed out, dropping connection");
        }
    }

    /// Consumes the framed connection and returns the inner stream.
    ///
    /// Note: any buffered data is lost. Only safe at protocol points
    /// where the server cannot have sent more data (STARTTLS upgrade).
    pub(crate) fn into_stream(self) -> S {
        self.reader.into_inner()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn read_simple_line() {
        let mock = tokio_test::io::Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedConnection::new(mock, TIMEOUT);

        let line = framed.read_line().await.unwrap();
        assert_eq!(line, b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn read_until_tag_collects_untagged_lines() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* CAPABILITY IMAP4rev1 STARTTLS\r\n")
            .read(b"a000001 OK Completed\r\n")
            .build();
        let mut framed = FramedConnection::new(mock, TIMEOUT);

        let raw = framed.read_until_tag("a000001").await.unwrap();
        assert_eq!(
            raw,
            b"* CAPABILITY IMAP4rev1 STARTTLS\r\na000001 OK Completed\r\n"
        );
    }

    #[tokio::test]
    async fn tag_prefix_must_be_followed_by_space() {
        // "a000001x" must not satisfy a read for tag "a000001".
        let mock = tokio_test::io::Builder::new()
            .read(b"a000001x NO not ours\r\n")
            .read(b"a000001 OK done\r\n")
            .build();
        let mut framed = FramedConnection::new(mock, TIMEOUT);

        let raw = framed.read_until_tag("a000001").await.unwrap();
        assert_eq!(raw, b"a000001x NO not ours\r\na000001 OK done\r\n");
    }

    #[tokio::test]
    async fn write_command_flushes() {
        let mock = tokio_test::io::Builder::new()
            .write(b"a000001 CAPABILITY\r\n")
            .build();
        let mut framed = FramedConnection::new(mock, TIMEOUT);

        framed.write_command(b"a000001 CAPABILITY\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn eof_is_socket_error() {
        let mock = tokio_test::io::Builder::new().build();
        let mut framed = FramedConnection::new(mock, TIMEOUT);

        let err = framed.read_line().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::SocketError);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_times_out() {
        let mock = tokio_test::io::Builder::new()
            .wait(Duration::from_secs(60))
            .read(b"* OK late\r\n")
            .build();
        let mut framed = FramedConnection::new(mock, Duration::from_secs(1));

        let err = framed.read_line().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConnectionTimeout);
    }
}
