//! rustls-backed secure socket.
//!
//! One session to one gateway. The TLS handshake itself belongs to rustls;
//! this type wires the TCP stream, keeps a decrypted read buffer so
//! `pending` and partial reads work without blocking, and maps transport
//! failures into the crate error type so the connection manager can classify
//! them.

use super::secure::{Readiness, SecureSocket};
use super::tls::{parse_server_name, TlsConfig};
use crate::connection::ConnectionConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use rustls_pki_types::ServerName;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, Interest};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

const READ_BUF_CAPACITY: usize = 8192;

/// TLS client socket for a single gateway session.
pub struct SslSocket {
    gateway: String,
    port: u16,
    tls: TlsConfig,
    stream: Option<TlsStream<TcpStream>>,
    read_buf: BytesMut,
}

impl SslSocket {
    /// Compile the TLS configuration and prepare an unconnected socket.
    /// Performs no I/O; `connect` establishes the session.
    pub fn open(config: &ConnectionConfig) -> Result<Self> {
        let gateway = config.gateway.clone().ok_or(Error::MissingGateway)?;
        let port = config.port.ok_or(Error::MissingPort)?;
        let tls = TlsConfig::from_connection_config(config)?;

        Ok(Self {
            gateway,
            port,
            tls,
            stream: None,
            read_buf: BytesMut::with_capacity(READ_BUF_CAPACITY),
        })
    }

    fn stream_mut(&mut self) -> Result<&mut TlsStream<TcpStream>> {
        self.stream.as_mut().ok_or(Error::NotConnected)
    }
}

impl std::fmt::Debug for SslSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SslSocket")
            .field("gateway", &self.gateway)
            .field("port", &self.port)
            .field("connected", &self.stream.is_some())
            .field("pending", &self.read_buf.len())
            .finish()
    }
}

#[async_trait]
impl SecureSocket for SslSocket {
    async fn connect(&mut self) -> Result<()> {
        crate::metrics::counters::connect_attempted();

        let tcp = TcpStream::connect((self.gateway.as_str(), self.port)).await?;

        let server_name = parse_server_name(&self.gateway)?;
        let server_name = ServerName::try_from(server_name).map_err(|_| {
            Error::Config(format!("invalid gateway hostname for TLS: {}", self.gateway))
        })?;

        let connector = TlsConnector::from(self.tls.client_config());
        // Handshake failures arrive as io::Error wrapping the rustls error;
        // kept intact so the expiration classifier can inspect them.
        let stream = connector.connect(server_name, tcp).await?;

        self.read_buf.clear();
        self.stream = Some(stream);
        tracing::info!(gateway = %self.gateway, port = self.port, "TLS session established");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.read_buf.clear();
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
            tracing::debug!(gateway = %self.gateway, "TLS session closed");
        }
        Ok(())
    }

    async fn read(&mut self, size: usize, buf: &mut BytesMut) -> Result<usize> {
        if size == 0 {
            return Ok(0);
        }

        loop {
            if !self.read_buf.is_empty() {
                let n = self.read_buf.len().min(size);
                buf.extend_from_slice(&self.read_buf.split_to(n));
                return Ok(n);
            }

            let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
            let n = stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    async fn write(&mut self, content: &[u8]) -> Result<usize> {
        let stream = self.stream_mut()?;
        stream.write_all(content).await?;
        stream.flush().await?;
        Ok(content.len())
    }

    async fn select(&mut self, timeout: Duration) -> Result<Readiness> {
        // Already-decrypted bytes count as readable
        if !self.read_buf.is_empty() {
            return Ok(Readiness::Readable);
        }

        let stream = self.stream_mut()?;
        let (tcp, _) = stream.get_ref();

        let interest = Interest::READABLE | Interest::WRITABLE;
        match tokio::time::timeout(timeout, tcp.ready(interest)).await {
            Ok(ready) => {
                let ready = ready?;
                Ok(match (ready.is_readable(), ready.is_writable()) {
                    (true, true) => Readiness::ReadWrite,
                    (true, false) => Readiness::Readable,
                    (false, true) => Readiness::Writable,
                    (false, false) => Readiness::TimedOut,
                })
            }
            Err(_) => Ok(Readiness::TimedOut),
        }
    }

    fn pending(&self) -> usize {
        self.read_buf.len()
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::builder()
            .gateway("127.0.0.1")
            .port(1)
            .build()
    }

    #[test]
    fn test_open_requires_gateway_and_port() {
        let missing_gateway = ConnectionConfig::builder().port(2195).build();
        assert!(matches!(
            SslSocket::open(&missing_gateway),
            Err(Error::MissingGateway)
        ));

        let missing_port = ConnectionConfig::builder().gateway("localhost").build();
        assert!(matches!(
            SslSocket::open(&missing_port),
            Err(Error::MissingPort)
        ));
    }

    #[test]
    fn test_open_performs_no_io() {
        let socket = SslSocket::open(&config()).expect("open");
        assert!(!socket.is_connected());
        assert_eq!(socket.pending(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_against_dead_port() {
        let mut socket = SslSocket::open(&config()).expect("open");
        assert!(socket.connect().await.is_err());
        assert!(!socket.is_connected());
    }

    #[tokio::test]
    async fn test_io_without_session_fails() {
        let mut socket = SslSocket::open(&config()).expect("open");

        let mut buf = BytesMut::new();
        assert!(matches!(
            socket.read(16, &mut buf).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            socket.write(b"payload").await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            socket.select(Duration::from_millis(1)).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mut socket = SslSocket::open(&config()).expect("open");
        socket.disconnect().await.expect("first disconnect");
        socket.disconnect().await.expect("second disconnect");
    }

    #[test]
    fn test_zero_length_read_is_noop() {
        let mut socket = SslSocket::open(&config()).expect("open");
        let mut buf = BytesMut::new();
        let n = tokio_test::block_on(socket.read(0, &mut buf)).expect("read");
        assert_eq!(n, 0);
        assert!(buf.is_empty());
    }
}
