//! Gateway client handle
//!
//! [`ModbusTcpClient`] is a cheap, cloneable handle to a background engine task
//! that owns the gateway connection. Any number of tasks may issue reads and
//! writes concurrently; the engine correlates responses by transaction id and
//! applies the concurrency caps from [`ClientConfig`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use voltage_modbus_mux::{ClientConfig, ModbusResult, ModbusTcpClient, SchemaItem};
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     let client = ModbusTcpClient::new(ClientConfig::new("192.168.1.50"))?;
//!     client.wait_connected().await?;
//!
//!     // Two words, one swapped float, from slave 3 starting at register 100
//!     let schema = [SchemaItem::word(2), SchemaItem::float(1).swapped()];
//!     let values = client.read_holdings(3, 100, &schema).await?;
//!     println!("Values: {:?}", values);
//!
//!     client.close().await
//! }
//! ```

use tokio::sync::{mpsc, oneshot, watch};

use crate::codec::{ModbusCodec, SlaveId, WriteAck};
use crate::config::ClientConfig;
use crate::engine::{ClientStats, Command, ConnectionState, Engine, Operation, Responder};
use crate::error::{ModbusError, ModbusResult};
use crate::schema::SchemaItem;
use crate::transport::{Connector, TcpConnector};
use crate::value::RegisterValue;

/// Multiplexing Modbus TCP gateway client.
///
/// Every operation resolves exactly once. Telegram building happens on the
/// caller's side, so schema and value errors return before anything is queued.
#[derive(Debug, Clone)]
pub struct ModbusTcpClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    address: String,
}

impl ModbusTcpClient {
    /// Start a client over plain TCP.
    ///
    /// Must be called from within a Tokio runtime. The first connect attempt
    /// starts immediately; use [`wait_connected`](Self::wait_connected) to wait
    /// for it.
    pub fn new(config: ClientConfig) -> ModbusResult<Self> {
        Self::with_connector(config, TcpConnector)
    }

    /// Start a client over a custom stream connector.
    pub fn with_connector<C: Connector>(config: ClientConfig, connector: C) -> ModbusResult<Self> {
        config.validate()?;

        let address = config.address();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);
        let engine = Engine::new(config, connector, commands_rx, state_tx);
        tokio::spawn(engine.run());

        Ok(Self {
            commands,
            state,
            address,
        })
    }

    /// Read holding registers (FC03) and decode them with `schema`.
    pub async fn read_holdings(
        &self,
        slave_id: SlaveId,
        start_register: u16,
        schema: &[SchemaItem],
    ) -> ModbusResult<Vec<RegisterValue>> {
        let telegram = ModbusCodec::build_read_request(slave_id, start_register, schema)?;
        let (reply, outcome) = oneshot::channel();
        self.submit(Operation {
            slave_id,
            telegram,
            responder: Responder::Read {
                schema: schema.to_vec(),
                reply,
            },
        })?;
        outcome.await.map_err(|_| ModbusError::ClientClosed)?
    }

    /// Encode `values` with `schema` and write them (FC16).
    ///
    /// Returns the start register and quantity echoed by the slave.
    pub async fn write_holdings(
        &self,
        slave_id: SlaveId,
        start_register: u16,
        schema: &[SchemaItem],
        values: &[RegisterValue],
    ) -> ModbusResult<WriteAck> {
        let telegram = ModbusCodec::build_write_request(slave_id, start_register, schema, values)?;
        let (reply, outcome) = oneshot::channel();
        self.submit(Operation {
            slave_id,
            telegram,
            responder: Responder::Write { reply },
        })?;
        outcome.await.map_err(|_| ModbusError::ClientClosed)?
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Open
    }

    /// Wait until the connection is open.
    pub async fn wait_connected(&self) -> ModbusResult<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|state| *state == ConnectionState::Open)
            .await
            .map(|_| ())
            .map_err(|_| ModbusError::ClientClosed)
    }

    /// Snapshot of counters, queue and slave health.
    pub async fn stats(&self) -> ModbusResult<ClientStats> {
        let (reply, snapshot) = oneshot::channel();
        self.commands
            .send(Command::Stats(reply))
            .map_err(|_| ModbusError::ClientClosed)?;
        snapshot.await.map_err(|_| ModbusError::ClientClosed)
    }

    /// Gateway address this client connects to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Stop the engine. Outstanding operations fail with `ConnectionLost`;
    /// later calls on any clone fail with `ClientClosed`.
    pub async fn close(&self) -> ModbusResult<()> {
        let (done, stopped) = oneshot::channel();
        if self.commands.send(Command::Shutdown(done)).is_err() {
            return Ok(());
        }
        let _ = stopped.await;
        Ok(())
    }

    fn submit(&self, operation: Operation) -> ModbusResult<()> {
        self.commands
            .send(Command::Submit(operation))
            .map_err(|_| ModbusError::ClientClosed)
    }
}
