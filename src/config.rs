//! Connection configuration.
//!
//! The transport only needs an address and a few timeouts; nothing is read
//! from the environment or from files.

use std::time::Duration;

use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

/// Port the devices listen on for the local protocol.
pub const DEFAULT_PORT: u16 = 9999;

/// Default bound on establishing the TCP connection.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on one write + read exchange.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a [`DeviceConnection`](crate::DeviceConnection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Bound on the dial.
    pub dial_timeout: Duration,
    /// Bound on the whole exchange, not on each read.
    pub exchange_timeout: Duration,
    /// Largest response payload accepted.
    pub max_payload_size: u32,
    /// Keep the socket open after a successful exchange.
    pub keep_alive: bool,
}

impl ConnectionConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dial timeout.
    ///
    /// Default: 10 seconds
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Set the exchange timeout.
    ///
    /// Default: 5 seconds
    pub fn exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Set the maximum response payload size.
    ///
    /// Default: 4 MB
    pub fn max_payload_size(mut self, limit: u32) -> Self {
        self.max_payload_size = limit;
        self
    }

    /// Keep the socket open between exchanges.
    ///
    /// Default: false (a fresh connection per exchange)
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            keep_alive: false,
        }
    }
}

/// Append the default device port when `addr` has none.
///
/// ```
/// use kasa_transport::config::with_default_port;
///
/// assert_eq!(with_default_port("10.0.0.25"), "10.0.0.25:9999");
/// assert_eq!(with_default_port("10.0.0.25:10000"), "10.0.0.25:10000");
/// assert_eq!(with_default_port("[fe80::1]"), "[fe80::1]:9999");
/// ```
pub fn with_default_port(addr: &str) -> String {
    let has_port = match addr.rfind(':') {
        // Bracketed IPv6 only has a port after the closing bracket.
        Some(idx) if addr.starts_with('[') => addr[..idx].ends_with(']'),
        // Bare IPv6 literals contain several colons and no port.
        Some(_) => addr.matches(':').count() == 1,
        None => false,
    };

    if has_port {
        addr.to_string()
    } else if addr.contains(':') && !addr.starts_with('[') {
        format!("[{}]:{}", addr, DEFAULT_PORT)
    } else {
        format!("{}:{}", addr, DEFAULT_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.dial_timeout, Duration::from_secs(10));
        assert_eq!(config.exchange_timeout, Duration::from_secs(5));
        assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
        assert!(!config.keep_alive);
    }

    #[test]
    fn test_builder_configuration() {
        let config = ConnectionConfig::new()
            .dial_timeout(Duration::from_millis(250))
            .exchange_timeout(Duration::from_secs(2))
            .max_payload_size(64 * 1024)
            .keep_alive(true);

        assert_eq!(config.dial_timeout, Duration::from_millis(250));
        assert_eq!(config.exchange_timeout, Duration::from_secs(2));
        assert_eq!(config.max_payload_size, 64 * 1024);
        assert!(config.keep_alive);
    }

    #[test]
    fn test_with_default_port() {
        assert_eq!(with_default_port("plug.local"), "plug.local:9999");
        assert_eq!(with_default_port("plug.local:1234"), "plug.local:1234");
        assert_eq!(with_default_port("fe80::1"), "[fe80::1]:9999");
        assert_eq!(with_default_port("[fe80::1]:80"), "[fe80::1]:80");
    }
}
