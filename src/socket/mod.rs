//! Secure socket collaborators
//!
//! This module holds:
//! * The capability set the connection manager drives ([`SecureSocket`])
//! * Readiness reporting for the select primitive ([`Readiness`])
//! * TLS configuration: client identity and root store ([`TlsConfig`])
//! * The production rustls-backed transport ([`SslSocket`])

mod secure;
mod ssl;
mod tls;

pub use secure::{Readiness, SecureSocket};
pub use ssl::SslSocket;
pub use tls::{parse_server_name, TlsConfig, TlsConfigBuilder};
