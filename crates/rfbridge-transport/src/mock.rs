//! Mock serial transport for testing and development.
//!
//! This module provides an in-memory transport that can stand in for a
//! real serial port, with a handle for scripting the device side of the
//! conversation line by line.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadBuf,
    ReadHalf, WriteHalf,
};

/// Default in-memory buffer size for the mock link.
const DEFAULT_CAPACITY: usize = 16 * 1024;

/// Mock serial port for testing and development.
///
/// Behaves like an opened port from the host's point of view; everything
/// written to it can be read from the paired [`MockSerialHandle`], and
/// lines sent through the handle arrive as reads. Dropping or closing the
/// handle looks like the cable being pulled.
///
/// # Examples
///
/// ```
/// use rfbridge_transport::MockSerial;
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
///
/// #[tokio::main]
/// async fn main() -> std::io::Result<()> {
///     let (mut port, mut handle) = MockSerial::new();
///
///     handle.send_line("ready").await?;
///
///     let mut buffer = [0u8; 6];
///     port.read_exact(&mut buffer).await?;
///     assert_eq!(&buffer, b"ready\n");
///
///     port.write_all(b"RESET\n").await?;
///     assert_eq!(handle.read_line().await?, Some("RESET".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockSerial {
    inner: DuplexStream,
}

impl MockSerial {
    /// Create a mock port with the default buffer capacity.
    ///
    /// Returns a tuple of (MockSerial, MockSerialHandle) where the handle
    /// plays the device side of the link.
    pub fn new() -> (Self, MockSerialHandle) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a mock port with a custom buffer capacity.
    ///
    /// A small capacity makes write backpressure observable in tests.
    pub fn with_capacity(capacity: usize) -> (Self, MockSerialHandle) {
        let (host, device) = tokio::io::duplex(capacity);
        let (device_read, device_write) = tokio::io::split(device);

        let port = Self { inner: host };
        let handle = MockSerialHandle {
            reader: BufReader::new(device_read),
            writer: device_write,
        };

        (port, handle)
    }
}

impl AsyncRead for MockSerial {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for MockSerial {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Handle for scripting the device side of a [`MockSerial`] link.
///
/// The handle is itself an [`AsyncRead`] + [`AsyncWrite`] stream, so a
/// device-side double can wrap it in a codec instead of scripting lines
/// one at a time.
#[derive(Debug)]
pub struct MockSerialHandle {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl MockSerialHandle {
    /// Send one line to the host, adding the `\n` terminator.
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await
    }

    /// Send raw bytes to the host, exactly as given.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await
    }

    /// Read the next line the host wrote, without its terminator.
    ///
    /// Returns `None` once the host side has shut down.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        while line.ends_with(['\n', '\r']) {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Close the device side, which the host observes as a disconnect.
    pub async fn close(mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}

impl AsyncRead for MockSerialHandle {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

impl AsyncWrite for MockSerialHandle {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.writer).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.writer).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.writer).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_host_reads_what_handle_sends() {
        let (mut port, mut handle) = MockSerial::new();

        handle.send_line("RES OK").await.unwrap();

        let mut buffer = vec![0u8; 7];
        port.read_exact(&mut buffer).await.unwrap();
        assert_eq!(&buffer, b"RES OK\n");
    }

    #[tokio::test]
    async fn test_handle_reads_what_host_writes() {
        let (mut port, mut handle) = MockSerial::new();

        port.write_all(b"PIN receive 2\nPING x\n").await.unwrap();

        assert_eq!(
            handle.read_line().await.unwrap(),
            Some("PIN receive 2".to_string())
        );
        assert_eq!(handle.read_line().await.unwrap(), Some("PING x".to_string()));
    }

    #[tokio::test]
    async fn test_close_surfaces_as_eof() {
        let (mut port, handle) = MockSerial::new();

        handle.close().await.unwrap();

        let mut buffer = [0u8; 1];
        assert_eq!(port.read(&mut buffer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dropped_handle_surfaces_as_eof() {
        let (mut port, handle) = MockSerial::new();
        drop(handle);

        let mut buffer = [0u8; 1];
        assert_eq!(port.read(&mut buffer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_handle_sees_host_shutdown() {
        let (mut port, mut handle) = MockSerial::new();

        port.write_all(b"RESET\n").await.unwrap();
        port.shutdown().await.unwrap();

        assert_eq!(handle.read_line().await.unwrap(), Some("RESET".to_string()));
        assert_eq!(handle.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_raw_bytes_preserved() {
        let (mut port, mut handle) = MockSerial::new();

        handle.send_raw(b"par").await.unwrap();
        handle.send_raw(b"tial\n").await.unwrap();

        let mut buffer = vec![0u8; 8];
        port.read_exact(&mut buffer).await.unwrap();
        assert_eq!(&buffer, b"partial\n");
    }
}
