//! Connection management
//!
//! This module handles:
//! * Connection configuration and its construction-time validation
//! * The connection lifecycle (lazy establishment, teardown, rebuild)
//! * The bounded retry protocol around read/write

mod conn;
mod state;

pub use conn::{Connection, ConnectionConfig, ConnectionConfigBuilder, SocketFactory};
pub use state::SessionState;
