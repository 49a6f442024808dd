//! # Client Configuration
//!
//! Constructor-time options for [`crate::ModbusTcpClient`]. Immutable once the
//! client is built.
//!
//! | Option | Default |
//! |--------|---------|
//! | port | 502 |
//! | request_attempts | 3 |
//! | response_timeout_ms | 1000 |
//! | ban_timeout_ms | 10000 |
//! | max_concurrent_requests | 20 |
//! | max_concurrent_requests_per_slave | 2 |
//! | reconnect_delay_ms | 5000 |
//! | ban_reject_delay_ms | 1000 |

use std::time::Duration;

use crate::error::{ModbusError, ModbusResult};

/// Modbus TCP default port.
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Retries granted to a slave before it is banned.
pub const DEFAULT_REQUEST_ATTEMPTS: u32 = 3;

/// Time to wait for a response before counting a timeout.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 1000;

/// How long a banned slave stays banned.
pub const DEFAULT_BAN_TIMEOUT_MS: u64 = 10_000;

/// Requests in flight across all slaves.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 20;

/// Requests in flight towards a single slave.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS_PER_SLAVE: usize = 2;

/// Fixed delay between a close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;

/// Delay before a request to a banned slave is rejected.
pub const DEFAULT_BAN_REJECT_DELAY_MS: u64 = 1000;

/// Gateway client configuration.
///
/// # Example
///
/// ```rust
/// use voltage_modbus_mux::ClientConfig;
///
/// let config = ClientConfig::new("192.168.1.50")
///     .with_response_timeout_ms(500)
///     .with_max_concurrent_requests_per_slave(1);
///
/// assert_eq!(config.port, 502);
/// assert_eq!(config.max_concurrent_requests_per_slave, 1);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Gateway host name or address.
    pub host: String,
    /// Gateway TCP port.
    pub port: u16,
    /// Retry budget per slave; reset on every successful exchange.
    pub request_attempts: u32,
    /// Response timeout (milliseconds).
    pub response_timeout_ms: u64,
    /// Ban duration (milliseconds).
    pub ban_timeout_ms: u64,
    /// Global in-flight cap.
    pub max_concurrent_requests: usize,
    /// Per-slave in-flight cap.
    pub max_concurrent_requests_per_slave: usize,
    /// Reconnect delay (milliseconds).
    pub reconnect_delay_ms: u64,
    /// Delay before rejecting requests to a banned slave (milliseconds).
    pub ban_reject_delay_ms: u64,
}

impl ClientConfig {
    /// Create a configuration for `host` with default values.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Set the gateway port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the per-slave retry budget.
    pub fn with_request_attempts(mut self, attempts: u32) -> Self {
        self.request_attempts = attempts;
        self
    }

    /// Set the response timeout in milliseconds.
    pub fn with_response_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.response_timeout_ms = timeout_ms;
        self
    }

    /// Set the ban duration in milliseconds.
    pub fn with_ban_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.ban_timeout_ms = timeout_ms;
        self
    }

    /// Set the global in-flight cap.
    pub fn with_max_concurrent_requests(mut self, count: usize) -> Self {
        self.max_concurrent_requests = count;
        self
    }

    /// Set the per-slave in-flight cap.
    pub fn with_max_concurrent_requests_per_slave(mut self, count: usize) -> Self {
        self.max_concurrent_requests_per_slave = count;
        self
    }

    /// Set the reconnect delay in milliseconds.
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    /// Set the banned-slave rejection delay in milliseconds.
    pub fn with_ban_reject_delay_ms(mut self, delay_ms: u64) -> Self {
        self.ban_reject_delay_ms = delay_ms;
        self
    }

    #[inline]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    #[inline]
    pub fn ban_timeout(&self) -> Duration {
        Duration::from_millis(self.ban_timeout_ms)
    }

    #[inline]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    #[inline]
    pub fn ban_reject_delay(&self) -> Duration {
        Duration::from_millis(self.ban_reject_delay_ms)
    }

    /// `host:port` string for logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.host.trim().is_empty() {
            return Err(ModbusError::configuration("Host must not be empty"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ModbusError::configuration(
                "max_concurrent_requests must be at least 1",
            ));
        }
        if self.max_concurrent_requests > usize::from(u16::MAX) {
            return Err(ModbusError::configuration(format!(
                "max_concurrent_requests must not exceed {} (transaction id space)",
                u16::MAX
            )));
        }
        if self.max_concurrent_requests_per_slave == 0 {
            return Err(ModbusError::configuration(
                "max_concurrent_requests_per_slave must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: DEFAULT_TCP_PORT,
            request_attempts: DEFAULT_REQUEST_ATTEMPTS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            ban_timeout_ms: DEFAULT_BAN_TIMEOUT_MS,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_concurrent_requests_per_slave: DEFAULT_MAX_CONCURRENT_REQUESTS_PER_SLAVE,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            ban_reject_delay_ms: DEFAULT_BAN_REJECT_DELAY_MS,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
