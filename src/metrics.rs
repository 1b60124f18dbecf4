//! Metrics instrumentation
//!
//! Thin helpers over the `metrics` facade so call sites stay one line.
//! Recording is a no-op unless the embedding application installs a
//! recorder.

/// Label values shared across counters
pub mod labels {
    /// Retried read operations
    pub const OP_READ: &str = "read";
    /// Retried write operations
    pub const OP_WRITE: &str = "write";
}

/// Counter helpers
pub mod counters {
    use metrics::counter;

    /// A session establishment was attempted.
    pub fn connect_attempted() {
        counter!("apns_wire_connect_attempts_total").increment(1);
    }

    /// A transient failure triggered teardown and rebuild.
    pub fn reconnect_cycle(op: &'static str) {
        counter!("apns_wire_reconnect_cycles_total", "op" => op).increment(1);
    }

    /// A failure was classified as certificate expiration.
    pub fn certificate_expired() {
        counter!("apns_wire_certificate_expired_total").increment(1);
    }

    /// The retry budget was exhausted and the failure surfaced.
    pub fn retries_exhausted(op: &'static str) {
        counter!("apns_wire_retries_exhausted_total", "op" => op).increment(1);
    }
}
