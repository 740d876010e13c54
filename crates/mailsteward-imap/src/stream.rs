//! Stream types for IMAP connections.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::config::Config;
use crate::{Error, Result};

/// A stream that can be either plaintext or TLS.
#[derive(Debug)]
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Upgrades a plaintext stream to TLS in place (STARTTLS flow).
    ///
    /// The handshake runs on the already-open connection; afterwards the
    /// stream must actually be in the encrypted client state, otherwise
    /// the upgrade is reported as an encryption error and the connection
    /// is dropped.
    pub async fn upgrade_to_tls(self, config: &Config) -> Result<Self> {
        match self {
            Self::Plain(tcp) => {
                let connector = create_tls_connector()?;
                let server_name = peer_name(config)?;
                let tls = connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(|err| Error::Encryption(err.to_string()))?;
                if tls.get_ref().1.is_handshaking() {
                    return Err(Error::Encryption(
                        "STARTTLS handshake did not reach the encrypted state".to_string(),
                    ));
                }
                Ok(Self::Tls(Box::new(tls)))
            }
            Self::Tls(_) => Err(Error::Encryption(
                "stream is already encrypted".to_string(),
            )),
        }
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Creates a TLS connector with default root certificates.
pub fn create_tls_connector() -> Result<TlsConnector> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Connects without TLS (for STARTTLS or unsecured sessions).
pub async fn connect_plain(config: &Config) -> Result<ImapStream> {
    let tcp = connect_tcp(config).await?;
    Ok(ImapStream::Plain(tcp))
}

/// Connects with TLS from the start (implicit TLS).
///
/// Any handshake failure surfaces the TLS library's message; the
/// underlying TCP connection is dropped, not gracefully closed.
pub async fn connect_tls(config: &Config) -> Result<ImapStream> {
    let tcp = connect_tcp(config).await?;

    let connector = create_tls_connector()?;
    let server_name = peer_name(config)?;
    let tls = connector
        .connect(server_name, tcp)
        .await
        .map_err(|err| Error::Encryption(err.to_string()))?;

    Ok(ImapStream::Tls(Box::new(tls)))
}

fn peer_name(config: &Config) -> Result<ServerName<'static>> {
    ServerName::try_from(config.tls_peer_name().to_string())
        .map_err(|err| Error::Config(format!("invalid TLS peer name: {err}")))
}

/// Resolves the host and connects to the first address matching the
/// configured address-family preference, each attempt bounded by the
/// connection timeout.
async fn connect_tcp(config: &Config) -> Result<TcpStream> {
    let addrs: Vec<SocketAddr> = lookup_host((config.host.as_str(), config.port))
        .await
        .map_err(|err| Error::Socket(err.to_string()))?
        .filter(|addr| config.network_protocol.matches(addr))
        .collect();

    if addrs.is_empty() {
        return Err(Error::Socket(format!(
            "no suitable address found for {}",
            config.host
        )));
    }

    let mut last_err = None;
    for addr in addrs {
        match timeout(config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(tcp)) => return Ok(tcp),
            Ok(Err(err)) => last_err = Some(Error::Socket(err.to_string())),
            Err(_) => last_err = Some(Error::Timeout(config.connect_timeout)),
        }
    }

    Err(last_err.unwrap_or(Error::Timeout(config.connect_timeout)))
}
