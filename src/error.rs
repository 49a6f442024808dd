//! Error types for the gateway client
//!
//! Every operation ends with exactly one [`ModbusResult`]. The variants split
//! into three groups:
//!
//! - **Slave faults**: the gateway answered, but the answer is a failure
//!   (`ResponseException`, `GatewayPathUnavailable`, `SlaveNoReply`, `SlaveBanned`)
//! - **Response faults**: the answer could not be trusted
//!   (`ResponseWrongSlave`, `ResponseWrongLength`)
//! - **Connection faults**: the link itself failed
//!   (`SocketNotConnected`, `ConnectionLost`, `WriteError`, `ClientClosed`)
//!
//! `InvalidData`, `Configuration` and `Protocol` are raised locally before a
//! request ever reaches the wire.

use thiserror::Error;

/// Result alias used across the crate.
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Errors reported to callers of [`crate::ModbusTcpClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModbusError {
    /// The connection is not open (still connecting, or waiting to reconnect).
    #[error("Socket isn't connected")]
    SocketNotConnected,

    /// The unit id in the response does not match the request.
    #[error("Response wrong slave: expected {expected}, got {actual}")]
    ResponseWrongSlave { expected: u8, actual: u8 },

    /// The response frame length differs from the length the request implies.
    #[error("Response wrong length: expected {expected} bytes, got {actual}")]
    ResponseWrongLength { expected: usize, actual: usize },

    /// The slave answered with an exception code that has no special handling.
    #[error("Response exception: function {function:#04X}, code {code:#04X}")]
    ResponseException { function: u8, code: u8 },

    /// The gateway reported exception 0x0A; the slave is banned.
    #[error("Gateway path unavailable for slave {slave_id}")]
    GatewayPathUnavailable { slave_id: u8 },

    /// Retries are exhausted (timeouts or exception 0x0B); the slave is banned.
    #[error("Slave {slave_id} doesn't reply")]
    SlaveNoReply { slave_id: u8 },

    /// The slave is serving a ban; nothing was transmitted.
    #[error("Slave {slave_id} is banned")]
    SlaveBanned { slave_id: u8 },

    /// The connection closed while the operation was queued or in flight.
    #[error("TCP connection lost")]
    ConnectionLost,

    /// Writing the request to the socket failed.
    #[error("Error writing to socket: {message}")]
    WriteError { message: String },

    /// Schema or value validation failed.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Client configuration is unusable.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Internal protocol bookkeeping failed.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// The client engine has stopped.
    #[error("Client closed")]
    ClientClosed,
}

impl ModbusError {
    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a socket write error
    pub fn write_error(message: impl Into<String>) -> Self {
        Self::WriteError {
            message: message.into(),
        }
    }

    /// Errors that come from the slave's answer (or lack of one).
    pub fn is_slave_fault(&self) -> bool {
        matches!(
            self,
            Self::ResponseException { .. }
                | Self::GatewayPathUnavailable { .. }
                | Self::SlaveNoReply { .. }
                | Self::SlaveBanned { .. }
        )
    }

    /// Errors caused by the state of the TCP link.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::SocketNotConnected
                | Self::ConnectionLost
                | Self::WriteError { .. }
                | Self::ClientClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ModbusError::ConnectionLost.to_string(),
            "TCP connection lost"
        );
        assert_eq!(
            ModbusError::SlaveNoReply { slave_id: 3 }.to_string(),
            "Slave 3 doesn't reply"
        );
        assert_eq!(
            ModbusError::ResponseException {
                function: 0x03,
                code: 0x02
            }
            .to_string(),
            "Response exception: function 0x03, code 0x02"
        );
    }

    #[test]
    fn test_classification() {
        assert!(ModbusError::SlaveBanned { slave_id: 1 }.is_slave_fault());
        assert!(!ModbusError::SlaveBanned { slave_id: 1 }.is_connection_error());
        assert!(ModbusError::write_error("broken pipe").is_connection_error());
        assert!(!ModbusError::invalid_data("x").is_slave_fault());
        assert!(!ModbusError::ResponseWrongLength {
            expected: 13,
            actual: 11
        }
        .is_slave_fault());
    }
}
