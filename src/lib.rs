//! Resilient mutual-TLS connection management for push notification gateways.
//!
//! This crate maintains a single certificate-authenticated TLS connection to
//! a remote gateway and hides reconnect-on-failure behind a bounded retry
//! policy:
//!
//! * [`Connection`] — the lifecycle manager: lazy establishment, bounded
//!   retry with full session teardown between attempts, and immediate
//!   propagation of certificate-expiration failures (retrying cannot help an
//!   expired credential).
//! * [`SecureSocket`] — the capability set the manager drives; implement it
//!   to substitute the transport.
//! * [`SslSocket`] — the production transport backed by `tokio-rustls`.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> apns_wire::Result<()> {
//! use apns_wire::{Connection, ConnectionConfig};
//!
//! let config = ConnectionConfig::builder()
//!     .certificate(std::fs::read_to_string("pusher.pem")?)
//!     .gateway("gateway.push.example.com")
//!     .port(2195)
//!     .build();
//!
//! let mut conn = Connection::new(config)?;
//! conn.write(b"payload").await?;
//! conn.close().await;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod metrics;
pub mod socket;

pub use connection::{Connection, ConnectionConfig, ConnectionConfigBuilder, SessionState};
pub use socket::{Readiness, SecureSocket, SslSocket, TlsConfig};

/// Crate error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Gateway host missing from the configuration
    #[error("no gateway configured")]
    MissingGateway,

    /// Gateway port missing from the configuration
    #[error("no port configured")]
    MissingPort,

    /// Configuration error (certificate material, hostnames, root store)
    #[error("configuration error: {0}")]
    Config(String),

    /// A handshake or transport failure caused by an expired certificate.
    ///
    /// Produced by the retry protocol's classifier; the original failure is
    /// preserved as the error source. Never retried.
    #[error("certificate expired: {0}")]
    CertificateExpired(#[source] Box<Error>),

    /// TLS-layer failure
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Transport I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection cleanly
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Operation requires an established session
    #[error("socket is not connected")]
    NotConnected,
}

/// Crate result type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this failure signals an expired certificate.
    ///
    /// Pure predicate used by the retry protocol to decide between
    /// reconnect-and-retry and immediate propagation. Matches the structured
    /// rustls signals (an `Expired` validation failure or a
    /// `certificate_expired` alert from the peer, including those buried in
    /// an I/O error's source chain) and falls back to a case-insensitive
    /// message match for collaborators that only report text.
    pub fn is_certificate_expired(&self) -> bool {
        match self {
            Error::CertificateExpired(_) => true,
            Error::Tls(err) => tls_error_is_expired(err),
            Error::Io(err) => io_error_is_expired(err),
            _ => false,
        }
    }

    /// Tag a failure as certificate expiration, preserving it as the source.
    /// Already-tagged errors pass through unchanged.
    pub fn certificate_expired(err: Error) -> Error {
        match err {
            Error::CertificateExpired(_) => err,
            other => Error::CertificateExpired(Box::new(other)),
        }
    }
}

fn tls_error_is_expired(err: &rustls::Error) -> bool {
    matches!(
        err,
        rustls::Error::InvalidCertificate(rustls::CertificateError::Expired)
            | rustls::Error::AlertReceived(rustls::AlertDescription::CertificateExpired)
    ) || message_mentions_expiry(&err.to_string())
}

fn io_error_is_expired(err: &std::io::Error) -> bool {
    // tokio-rustls surfaces handshake failures as io::Error wrapping the
    // rustls error, so walk the source chain.
    let mut source = err
        .get_ref()
        .map(|inner| inner as &(dyn std::error::Error + 'static));
    while let Some(inner) = source {
        if let Some(tls) = inner.downcast_ref::<rustls::Error>() {
            return tls_error_is_expired(tls);
        }
        if message_mentions_expiry(&inner.to_string()) {
            return true;
        }
        source = inner.source();
    }
    message_mentions_expiry(&err.to_string())
}

fn message_mentions_expiry(message: &str) -> bool {
    message.to_ascii_lowercase().contains("certificate expired")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_invalid_certificate_expired_is_classified() {
        let err = Error::Tls(rustls::Error::InvalidCertificate(
            rustls::CertificateError::Expired,
        ));
        assert!(err.is_certificate_expired());
    }

    #[test]
    fn test_expired_alert_is_classified() {
        let err = Error::Tls(rustls::Error::AlertReceived(
            rustls::AlertDescription::CertificateExpired,
        ));
        assert!(err.is_certificate_expired());
    }

    #[test]
    fn test_io_wrapped_rustls_expiry_is_classified() {
        let tls = rustls::Error::InvalidCertificate(rustls::CertificateError::Expired);
        let err = Error::Io(io::Error::new(io::ErrorKind::InvalidData, tls));
        assert!(err.is_certificate_expired());
    }

    #[test]
    fn test_message_fallback_is_case_insensitive() {
        let err = Error::Io(io::Error::new(
            io::ErrorKind::Other,
            "SSL error: Certificate EXPIRED during handshake",
        ));
        assert!(err.is_certificate_expired());
    }

    #[test]
    fn test_transient_errors_are_not_classified() {
        let err = Error::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ));
        assert!(!err.is_certificate_expired());
        assert!(!Error::ConnectionClosed.is_certificate_expired());
        assert!(!Error::NotConnected.is_certificate_expired());
    }

    #[test]
    fn test_tagging_preserves_source() {
        let original = Error::Tls(rustls::Error::AlertReceived(
            rustls::AlertDescription::CertificateExpired,
        ));
        let tagged = Error::certificate_expired(original);
        assert!(matches!(tagged, Error::CertificateExpired(_)));
        assert!(std::error::Error::source(&tagged).is_some());
    }

    #[test]
    fn test_tagging_is_idempotent() {
        let tagged = Error::certificate_expired(Error::ConnectionClosed);
        let twice = Error::certificate_expired(tagged);
        match twice {
            Error::CertificateExpired(inner) => {
                assert!(matches!(*inner, Error::ConnectionClosed));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
