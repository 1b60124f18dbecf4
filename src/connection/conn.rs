//! Core connection type

use super::state::SessionState;
use crate::metrics::labels;
use crate::socket::{Readiness, SecureSocket, SslSocket};
use crate::{Error, Result};
use bytes::BytesMut;
use std::time::Duration;

/// Default number of attempts for a single logical read/write
const DEFAULT_RETRIES: u32 = 3;

/// Connection configuration
///
/// Stores the gateway endpoint, the client credential, and the retry budget.
/// Use [`ConnectionConfig::builder`] to construct one; `gateway` and `port`
/// are validated when the [`Connection`] is built, not here.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Client certificate material (PEM: certificate chain + private key),
    /// required for mutual TLS. May be absent for non-authenticated test
    /// paths.
    pub certificate: Option<String>,
    /// Passphrase for an encrypted private key inside `certificate`
    pub passphrase: Option<String>,
    /// Remote gateway host. Required; absence fails `Connection` construction.
    pub gateway: Option<String>,
    /// Remote gateway port. Required; absence fails `Connection` construction.
    pub port: Option<u16>,
    /// Total attempts for a single read/write before the failure surfaces
    /// (default 3). Zero still performs one attempt, just without retry.
    pub retries: u32,
    /// CA bundle (PEM) used instead of platform roots to validate the
    /// gateway certificate
    pub ca_certificate: Option<String>,
}

impl ConnectionConfig {
    /// Create a builder with default settings
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            certificate: None,
            passphrase: None,
            gateway: None,
            port: None,
            retries: DEFAULT_RETRIES,
            ca_certificate: None,
        }
    }
}

/// Builder for [`ConnectionConfig`]
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Client certificate material (PEM text)
    pub fn certificate(mut self, pem: impl Into<String>) -> Self {
        self.config.certificate = Some(pem.into());
        self
    }

    /// Passphrase for an encrypted private key
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.config.passphrase = Some(passphrase.into());
        self
    }

    /// Remote gateway host
    pub fn gateway(mut self, gateway: impl Into<String>) -> Self {
        self.config.gateway = Some(gateway.into());
        self
    }

    /// Remote gateway port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Retry budget: total attempts for a single read/write
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// CA bundle (PEM text) for private-CA gateways
    pub fn ca_certificate(mut self, pem: impl Into<String>) -> Self {
        self.config.ca_certificate = Some(pem.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

/// Factory building an unconnected socket from the configuration.
///
/// Invoked lazily on first use and again after every teardown, so each retry
/// attempt starts from a clean handle.
pub type SocketFactory<S> = Box<dyn Fn(&ConnectionConfig) -> Result<S> + Send + Sync>;

/// A retried I/O request. Holding the buffer by reference lets the retry
/// loop replay the same operation against a rebuilt socket.
enum IoOp<'a> {
    Read { size: usize, buf: &'a mut BytesMut },
    Write { content: &'a [u8] },
}

impl IoOp<'_> {
    fn label(&self) -> &'static str {
        match self {
            IoOp::Read { .. } => labels::OP_READ,
            IoOp::Write { .. } => labels::OP_WRITE,
        }
    }
}

/// Managed gateway connection.
///
/// Owns at most one socket, built lazily on first use. Every `read`/`write`
/// runs under the retry protocol: on transient failure the socket is torn
/// down and rebuilt, up to `retries` total attempts; a failure classified as
/// certificate expiration propagates immediately. `select`, `pending` and
/// `is_connected` are deliberate pass-throughs with no retry.
///
/// Not internally synchronized: `&mut self` on every operation makes
/// exclusive access structural. Wrap the whole connection in a mutex for
/// concurrent use.
pub struct Connection<S: SecureSocket = SslSocket> {
    config: ConnectionConfig,
    socket: Option<S>,
    factory: SocketFactory<S>,
}

impl Connection<SslSocket> {
    /// Create a connection manager backed by the production TLS socket.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::MissingGateway`] / [`Error::MissingPort`] when the
    /// configuration omits them. No socket is built and no I/O happens here.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Self::with_socket_factory(config, Box::new(SslSocket::open))
    }
}

impl<S: SecureSocket> Connection<S> {
    /// Create a connection manager with a custom socket factory.
    ///
    /// This is the seam for alternative transports and for tests that drive
    /// the retry protocol against scripted sockets.
    pub fn with_socket_factory(config: ConnectionConfig, factory: SocketFactory<S>) -> Result<Self> {
        if config.gateway.is_none() {
            return Err(Error::MissingGateway);
        }
        if config.port.is_none() {
            return Err(Error::MissingPort);
        }

        Ok(Self {
            config,
            socket: None,
            factory,
        })
    }

    /// The validated configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Current lifecycle state, derived from the socket handle
    pub fn state(&self) -> SessionState {
        match &self.socket {
            None => SessionState::Unestablished,
            Some(socket) if socket.is_connected() => SessionState::Connected,
            Some(_) => SessionState::Disconnected,
        }
    }

    /// Session status. `false` when no socket has been built yet.
    pub fn is_connected(&self) -> bool {
        self.socket.as_ref().is_some_and(S::is_connected)
    }

    /// Bytes buffered on the socket and readable without blocking.
    /// `0` when no socket has been built yet.
    pub fn pending(&self) -> usize {
        self.socket.as_ref().map_or(0, S::pending)
    }

    /// Ensure an established session, lazily building the socket first.
    ///
    /// Idempotent: a socket already reporting connected is left alone.
    pub async fn connect(&mut self) -> Result<()> {
        let socket = self.ensure_socket()?;
        if !socket.is_connected() {
            socket.connect().await?;
        }
        Ok(())
    }

    /// Read up to `size` bytes into `buf` under the retry protocol.
    pub async fn read(&mut self, size: usize, buf: &mut BytesMut) -> Result<usize> {
        self.with_connection(IoOp::Read { size, buf }).await
    }

    /// Write `content` under the retry protocol, returning bytes written.
    pub async fn write(&mut self, content: &[u8]) -> Result<usize> {
        self.with_connection(IoOp::Write { content }).await
    }

    /// Read from a possibly-closed connection without opening it.
    ///
    /// Returns `Ok(None)` immediately — zero collaborator calls, no socket
    /// construction — when no socket exists or the session is down. Callers
    /// polling for late gateway responses must not trigger a handshake as a
    /// side effect.
    pub async fn read_non_blocking(
        &mut self,
        size: usize,
        buf: &mut BytesMut,
    ) -> Result<Option<usize>> {
        match self.socket.as_mut() {
            Some(socket) if socket.is_connected() => socket.read(size, buf).await.map(Some),
            _ => Ok(None),
        }
    }

    /// Wait up to `timeout` for the socket to become ready.
    ///
    /// Delegates to the socket's readiness primitive, lazily building the
    /// socket (but not connecting it) if absent. A readiness check is not a
    /// data operation, so it is never retried.
    pub async fn select(&mut self, timeout: Duration) -> Result<Readiness> {
        self.ensure_socket()?.select(timeout).await
    }

    /// Tear the session down and clear the handle.
    ///
    /// Best-effort: a failure from the socket's own disconnect is logged and
    /// suppressed, and the handle is cleared regardless, so the next
    /// operation rebuilds from scratch. No-op when nothing was ever built.
    pub async fn close(&mut self) {
        self.destroy_socket().await;
    }

    fn ensure_socket(&mut self) -> Result<&mut S> {
        if self.socket.is_none() {
            self.socket = Some((self.factory)(&self.config)?);
        }
        Ok(self.socket.as_mut().expect("socket built above"))
    }

    async fn destroy_socket(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(err) = socket.disconnect().await {
                tracing::debug!(error = %err, "ignoring disconnect failure during teardown");
            }
        }
    }

    /// The retry protocol.
    ///
    /// Each attempt ensures a connected socket and performs the operation.
    /// Certificate expiration propagates immediately; other failures tear
    /// the socket down and retry until `retries` attempts have failed, at
    /// which point the last failure surfaces unchanged. At least one attempt
    /// always occurs, so a budget of zero behaves like a budget of one.
    async fn with_connection(&mut self, mut op: IoOp<'_>) -> Result<usize> {
        let op_label = op.label();
        let mut attempt: u32 = 1;

        loop {
            match self.attempt_io(&mut op).await {
                Ok(n) => return Ok(n),
                Err(err) if err.is_certificate_expired() => {
                    crate::metrics::counters::certificate_expired();
                    tracing::warn!(error = %err, "certificate expired; not retrying");
                    return Err(Error::certificate_expired(err));
                }
                Err(err) => {
                    if attempt >= self.config.retries {
                        crate::metrics::counters::retries_exhausted(op_label);
                        tracing::warn!(attempt, error = %err, "retry budget exhausted");
                        return Err(err);
                    }

                    crate::metrics::counters::reconnect_cycle(op_label);
                    tracing::debug!(attempt, error = %err, "transient failure; rebuilding session");
                    self.destroy_socket().await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt_io(&mut self, op: &mut IoOp<'_>) -> Result<usize> {
        self.connect().await?;
        let socket = self.socket.as_mut().expect("socket established by connect");
        match op {
            IoOp::Read { size, buf } => socket.read(*size, buf).await,
            IoOp::Write { content } => socket.write(content).await,
        }
    }
}

impl<S: SecureSocket> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("gateway", &self.config.gateway)
            .field("port", &self.config.port)
            .field("retries", &self.config.retries)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ConnectionConfig::builder().build();
        assert!(config.certificate.is_none());
        assert!(config.passphrase.is_none());
        assert!(config.gateway.is_none());
        assert!(config.port.is_none());
        assert!(config.ca_certificate.is_none());
        assert_eq!(config.retries, 3);
    }

    #[test]
    fn test_config_builder_fluent() {
        let config = ConnectionConfig::builder()
            .certificate("PEM")
            .passphrase("secret")
            .gateway("gateway.push.example.com")
            .port(2195)
            .retries(5)
            .build();

        assert_eq!(config.certificate.as_deref(), Some("PEM"));
        assert_eq!(config.passphrase.as_deref(), Some("secret"));
        assert_eq!(config.gateway.as_deref(), Some("gateway.push.example.com"));
        assert_eq!(config.port, Some(2195));
        assert_eq!(config.retries, 5);
    }

    #[test]
    fn test_construction_requires_gateway() {
        let config = ConnectionConfig::builder().port(2195).build();
        assert!(matches!(Connection::new(config), Err(Error::MissingGateway)));
    }

    #[test]
    fn test_construction_requires_port() {
        let config = ConnectionConfig::builder().gateway("localhost").build();
        assert!(matches!(Connection::new(config), Err(Error::MissingPort)));
    }

    #[test]
    fn test_fresh_connection_is_unestablished() {
        let config = ConnectionConfig::builder()
            .gateway("localhost")
            .port(2195)
            .build();
        let conn = Connection::new(config).expect("valid config");

        assert_eq!(conn.state(), SessionState::Unestablished);
        assert!(!conn.is_connected());
        assert_eq!(conn.pending(), 0);
    }
}
