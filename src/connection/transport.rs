//! Transport abstraction (TCP with optional TLS, Unix socket, or a caller-supplied stream)

use super::tls::{parse_server_name, SslMode, TlsConfig};
use crate::{Error, Result};
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpStream, UnixStream};

/// Byte stream the protocol can run over
pub trait IoStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> IoStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// TCP stream variant: plain or TLS-encrypted
#[allow(clippy::large_enum_variant)]
pub enum TcpVariant {
    /// Plain TCP connection
    Plain(TcpStream),
    /// TLS-encrypted TCP connection
    Tls(tokio_rustls::client::TlsStream<TcpStream>),
}

impl std::fmt::Debug for TcpVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TcpVariant::Plain(_) => f.write_str("TcpVariant::Plain(TcpStream)"),
            TcpVariant::Tls(_) => f.write_str("TcpVariant::Tls(TlsStream)"),
        }
    }
}

/// Transport layer abstraction
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    /// TCP socket (plain or TLS)
    Tcp(TcpVariant),
    /// Unix domain socket
    Unix(UnixStream),
    /// Caller-provided connected stream
    Stream {
        /// Underlying stream
        io: Box<dyn IoStream>,
        /// Whether the stream is already encrypted or local
        secure: bool,
    },
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Tcp(tcp) => f.debug_tuple("Transport::Tcp").field(tcp).finish(),
            Transport::Unix(_) => f.write_str("Transport::Unix(UnixStream)"),
            Transport::Stream { secure, .. } => f
                .debug_struct("Transport::Stream")
                .field("secure", secure)
                .finish_non_exhaustive(),
        }
    }
}

impl Transport {
    /// Connect via plain TCP
    pub async fn connect_tcp(host: &str, port: u16, nodelay: bool) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(nodelay)?;
        Ok(Transport::Tcp(TcpVariant::Plain(stream)))
    }

    /// Connect via Unix domain socket
    pub async fn connect_unix(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path).await?;
        Ok(Transport::Unix(stream))
    }

    /// Wrap an already connected stream.
    ///
    /// `secure` marks streams that may carry passwords in clear (already encrypted or local).
    pub fn from_stream<S: IoStream>(io: S, secure: bool) -> Self {
        Transport::Stream {
            io: Box::new(io),
            secure,
        }
    }

    /// Whether passwords may be sent in clear over this transport
    pub fn is_secure(&self) -> bool {
        match self {
            Transport::Tcp(TcpVariant::Plain(_)) => false,
            Transport::Tcp(TcpVariant::Tls(_)) | Transport::Unix(_) => true,
            Transport::Stream { secure, .. } => *secure,
        }
    }

    /// Whether the transport is TLS-encrypted
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tcp(TcpVariant::Tls(_)))
    }

    /// Upgrade the transport to TLS in place.
    ///
    /// Called right after the SSL request packet has been flushed; every byte written
    /// afterwards is encrypted.
    pub async fn upgrade_to_tls(self, tls: &TlsConfig, hostname: &str, mode: SslMode) -> Result<Self> {
        let server_name = parse_server_name(hostname)?;
        let server_name = rustls_pki_types::ServerName::try_from(server_name)
            .map_err(|_| Error::Config(format!("Invalid hostname for TLS: {}", hostname)))?;
        let connector = tokio_rustls::TlsConnector::from(tls.client_config(mode)?);

        let upgraded = match self {
            Transport::Tcp(TcpVariant::Plain(stream)) => {
                let stream = connector
                    .connect(server_name, stream)
                    .await
                    .map_err(|e| Error::Config(format!("TLS handshake failed: {}", e)))?;
                Transport::Tcp(TcpVariant::Tls(stream))
            }
            Transport::Stream { io, .. } => {
                let stream = connector
                    .connect(server_name, io)
                    .await
                    .map_err(|e| Error::Config(format!("TLS handshake failed: {}", e)))?;
                Transport::from_stream(stream, true)
            }
            Transport::Tcp(TcpVariant::Tls(_)) => {
                return Err(Error::InvalidState {
                    expected: "plain transport".into(),
                    actual: "TLS transport".into(),
                })
            }
            Transport::Unix(_) => {
                return Err(Error::Config("TLS is not supported over Unix sockets".into()))
            }
        };

        tracing::info!(host = %hostname, mode = %mode, "TLS established");
        Ok(upgraded)
    }
}

impl AsyncRead for Transport {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(TcpVariant::Plain(s)) => Pin::new(s).poll_read(cx, buf),
            Transport::Tcp(TcpVariant::Tls(s)) => Pin::new(s).poll_read(cx, buf),
            Transport::Unix(s) => Pin::new(s).poll_read(cx, buf),
            Transport::Stream { io, .. } => Pin::new(io).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Tcp(TcpVariant::Plain(s)) => Pin::new(s).poll_write(cx, buf),
            Transport::Tcp(TcpVariant::Tls(s)) => Pin::new(s).poll_write(cx, buf),
            Transport::Unix(s) => Pin::new(s).poll_write(cx, buf),
            Transport::Stream { io, .. } => Pin::new(io).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(TcpVariant::Plain(s)) => Pin::new(s).poll_flush(cx),
            Transport::Tcp(TcpVariant::Tls(s)) => Pin::new(s).poll_flush(cx),
            Transport::Unix(s) => Pin::new(s).poll_flush(cx),
            Transport::Stream { io, .. } => Pin::new(io).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(TcpVariant::Plain(s)) => Pin::new(s).poll_shutdown(cx),
            Transport::Tcp(TcpVariant::Tls(s)) => Pin::new(s).poll_shutdown(cx),
            Transport::Unix(s) => Pin::new(s).poll_shutdown(cx),
            Transport::Stream { io, .. } => Pin::new(io).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_tcp_connect_failure() {
        let result = Transport::connect_tcp("127.0.0.1", 9999, true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stream_round_trip() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut transport = Transport::from_stream(client, false);
        assert!(!transport.is_secure());
        assert!(!transport.is_tls());

        transport.write_all(b"ping").await.unwrap();
        transport.flush().await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        server.write_all(b"pong").await.unwrap();
        transport.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn test_secure_stream_flag() {
        let (client, _server) = tokio::io::duplex(64);
        assert!(Transport::from_stream(client, true).is_secure());
    }
}
