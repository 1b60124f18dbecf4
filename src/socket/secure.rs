//! The secure socket capability set

use crate::Result;
use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;

/// Result of a readiness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Data can be read without blocking
    Readable,
    /// Data can be written without blocking
    Writable,
    /// Both directions are ready
    ReadWrite,
    /// The timeout elapsed before either direction became ready
    TimedOut,
}

impl Readiness {
    /// Whether a read would not block
    pub fn is_readable(&self) -> bool {
        matches!(self, Self::Readable | Self::ReadWrite)
    }

    /// Whether a write would not block
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Writable | Self::ReadWrite)
    }

    /// Whether the check timed out with nothing ready
    pub fn timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

/// Capability set of the underlying secure transport.
///
/// [`Connection`](crate::Connection) is generic over this trait: production
/// code uses [`SslSocket`](crate::SslSocket), tests inject scripted doubles
/// through `Connection::with_socket_factory`.
///
/// Implementations own a single session. `disconnect` must be safe to call
/// when no session is established — the manager always calls it inside a
/// failure-suppressing teardown.
#[async_trait]
pub trait SecureSocket: Send {
    /// Establish the session. The manager only calls this when
    /// `is_connected` reports false.
    async fn connect(&mut self) -> Result<()>;

    /// Tear the session down. Must be idempotent.
    async fn disconnect(&mut self) -> Result<()>;

    /// Read up to `size` bytes into `buf`, returning the count transferred.
    async fn read(&mut self, size: usize, buf: &mut BytesMut) -> Result<usize>;

    /// Write `content`, returning the number of bytes written.
    async fn write(&mut self, content: &[u8]) -> Result<usize>;

    /// Wait up to `timeout` for the transport to become ready.
    async fn select(&mut self, timeout: Duration) -> Result<Readiness>;

    /// Bytes already buffered and readable without blocking.
    fn pending(&self) -> usize;

    /// Current session status. No side effects.
    fn is_connected(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_accessors() {
        assert!(Readiness::Readable.is_readable());
        assert!(!Readiness::Readable.is_writable());
        assert!(Readiness::Writable.is_writable());
        assert!(!Readiness::Writable.is_readable());
        assert!(Readiness::ReadWrite.is_readable());
        assert!(Readiness::ReadWrite.is_writable());
        assert!(Readiness::TimedOut.timed_out());
        assert!(!Readiness::TimedOut.is_readable());
        assert!(!Readiness::TimedOut.is_writable());
    }
}
