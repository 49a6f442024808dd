//! # Voltage Modbus Mux - Multiplexing Modbus TCP Gateway Client
//!
//! **Author:** Evan Liu <liuyifanz.1996@gmail.com>
//! **License:** MIT
//!
//! An async client for Modbus TCP gateways that front many serial slaves. All
//! requests share one TCP connection; responses are matched back to their
//! requests by transaction id, in whatever order the gateway returns them.
//!
//! ## Features
//!
//! - **Transaction Correlation**: Many requests in flight on one connection
//! - **Admission Control**: Global and per-slave in-flight caps with a queue
//!   that lets idle slaves overtake saturated ones
//! - **Slave Health**: Transparent retries on timeout, timed bans for slaves
//!   that stop answering
//! - **Auto-Reconnect**: Fixed-delay reconnect; outstanding work fails fast
//!   with `ConnectionLost`
//! - **Schema Codec**: Typed register layouts (word, int, binary, float,
//!   double word, double int, padding) with optional word swap
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Client |
//! |------|----------|--------|
//! | 0x03 | Read Holding Registers | ✅ |
//! | 0x10 | Write Multiple Registers | ✅ |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voltage_modbus_mux::{
//!     ClientConfig, ModbusResult, ModbusTcpClient, RegisterValue, SchemaItem,
//! };
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     let client = ModbusTcpClient::new(ClientConfig::new("127.0.0.1"))?;
//!     client.wait_connected().await?;
//!
//!     let values = client.read_holdings(1, 0, &[SchemaItem::word(2)]).await?;
//!     println!("Read registers: {:?}", values);
//!
//!     let ack = client
//!         .write_holdings(1, 10, &[SchemaItem::float(1)], &[RegisterValue::Float(3.5)])
//!         .await?;
//!     println!("Wrote {} registers at {}", ack.quantity, ack.address);
//!
//!     client.close().await
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus protocol constants
pub mod constants;

/// Client configuration
pub mod config;

/// Gateway client handle
pub mod client;

/// Stream connector and connection tasks
pub mod transport;

mod engine;

// ============================================================================
// Transaction bookkeeping
// ============================================================================

/// Per-slave health and ban state machine
pub mod slave;

/// Transaction id allocation and pending map
pub mod registry;

/// Global and per-slave concurrency caps
pub mod admission;

// ============================================================================
// Data encoding
// ============================================================================

/// Register value types
pub mod value;

/// Word order for 32-bit register pairs
pub mod word_order;

/// Register schemas
pub mod schema;

/// Telegram building and response decoding
pub mod codec;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime (users can use voltage_modbus_mux::tokio) ===
pub use tokio;

// === Core client API ===
pub use client::ModbusTcpClient;
pub use config::ClientConfig;
pub use engine::{ClientStats, ConnectionState, SlaveSnapshot};
pub use transport::{Connector, TcpConnector};

// === Error handling ===
pub use error::{ModbusError, ModbusResult};

// === Core types ===
pub use codec::{ModbusCodec, SlaveId, Telegram, WriteAck};
pub use schema::{ItemType, SchemaItem};
pub use slave::SlaveHealth;
pub use value::RegisterValue;
pub use word_order::{value_to_wire_bytes, wire_to_value_bytes, WordOrder};

// === Protocol limits (commonly needed constants) ===
pub use constants::{MAX_PDU_SIZE, MAX_READ_REGISTERS, MAX_WRITE_REGISTERS};

pub use config::DEFAULT_TCP_PORT;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!(
        "Voltage Modbus Mux v{} - Multiplexing Modbus TCP gateway client by Evan Liu",
        VERSION
    )
}
