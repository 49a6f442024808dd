//! # Transaction Engine
//!
//! One task owns every piece of mutable client state: the connection, the
//! slave table, the pending map, the wait queue and all timers. Handles talk to
//! it through a command channel, so no state is shared and nothing is locked.
//!
//! ## Event Sources
//!
//! ```text
//! commands ──┐
//! link events ┼──> select! ──> one handler at a time
//! connects ───┤
//! timers ─────┘   (response timeouts, unbans, reconnects, ban rejections)
//! ```
//!
//! Every admitted request holds one global and one per-slave slot. The slot is
//! returned on each exit path (response, timeout, write failure, connection
//! loss) before the request's outcome is delivered.

use std::collections::BTreeMap;
use std::fmt;
use std::future::poll_fn;
use std::io;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::time::{delay_queue, DelayQueue};
use tracing::{debug, info, trace, warn};

use crate::admission::AdmissionController;
use crate::codec::{decode_read_response, parse_write_ack, SlaveId, Telegram, WriteAck};
use crate::config::ClientConfig;
use crate::constants::{
    EXCEPTION_CODE_OFFSET, EXCEPTION_FLAG, EXCEPTION_RESPONSE_LEN, FUNCTION_OFFSET,
    MIN_RESPONSE_LEN, UNIT_ID_OFFSET,
};
use crate::error::{ModbusError, ModbusResult};
use crate::registry::TransactionRegistry;
use crate::schema::SchemaItem;
use crate::slave::{FaultKind, SlaveHealth, SlaveTable, Verdict};
use crate::transport::{Connector, Link, LinkEvent, OutboundFrame};
use crate::value::RegisterValue;

/// Lifecycle of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A connect attempt is running.
    Connecting,
    /// Requests can be transmitted.
    Open,
    /// Waiting for the reconnect timer.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Per-slave view in [`ClientStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveSnapshot {
    pub health: SlaveHealth,
    pub concurrent_requests: usize,
}

/// Point-in-time snapshot of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStats {
    pub connection: ConnectionState,
    /// Requests holding a global slot.
    pub in_flight: usize,
    /// Requests awaiting a response (equals `in_flight` while open).
    pub pending: usize,
    /// Requests waiting for admission.
    pub queued: usize,
    pub slaves: BTreeMap<SlaveId, SlaveSnapshot>,
    /// Transmissions, retries included.
    pub requests_sent: u64,
    /// Responses matched to a pending request.
    pub responses_received: u64,
    pub timeouts: u64,
    pub connection_losses: u64,
}

/// How an operation reports its outcome.
pub(crate) enum Responder {
    Read {
        schema: Vec<SchemaItem>,
        reply: oneshot::Sender<ModbusResult<Vec<RegisterValue>>>,
    },
    Write {
        reply: oneshot::Sender<ModbusResult<WriteAck>>,
    },
}

impl Responder {
    /// Deliver an error. Consumes the responder, so it can fire only once.
    pub fn fail(self, error: ModbusError) {
        // A dropped receiver means the caller stopped waiting.
        match self {
            Self::Read { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Self::Write { reply } => {
                let _ = reply.send(Err(error));
            }
        }
    }

    /// Decode a well-formed response and deliver the result.
    pub fn complete(self, frame: &[u8]) {
        match self {
            Self::Read { schema, reply } => {
                let _ = reply.send(decode_read_response(&schema, frame));
            }
            Self::Write { reply } => {
                let _ = reply.send(parse_write_ack(frame));
            }
        }
    }
}

/// A read or write on its way through the engine.
pub(crate) struct Operation {
    pub slave_id: SlaveId,
    pub telegram: Telegram,
    pub responder: Responder,
}

pub(crate) enum Command {
    Submit(Operation),
    Stats(oneshot::Sender<ClientStats>),
    Shutdown(oneshot::Sender<()>),
}

enum TimerEvent {
    Response(u16),
    Unban(SlaveId),
    Reconnect,
    BanReject {
        slave_id: SlaveId,
        responder: Responder,
    },
}

struct PendingRequest {
    operation: Operation,
    timer: delay_queue::Key,
}

#[derive(Debug, Default)]
struct Counters {
    requests_sent: u64,
    responses_received: u64,
    timeouts: u64,
    connection_losses: u64,
}

enum Wake<S> {
    Command(Option<Command>),
    Link(u64, LinkEvent),
    Connected(u64, io::Result<S>),
    Timer(TimerEvent),
}

type ConnectResult<C> = (u64, io::Result<<C as Connector>::Stream>);

pub(crate) struct Engine<C: Connector> {
    config: ClientConfig,
    connector: Arc<C>,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,

    link: Option<Link>,
    epoch: u64,
    link_events_tx: mpsc::UnboundedSender<(u64, LinkEvent)>,
    link_events: mpsc::UnboundedReceiver<(u64, LinkEvent)>,
    connect_task: Option<JoinHandle<()>>,
    connect_results_tx: mpsc::UnboundedSender<ConnectResult<C>>,
    connect_results: mpsc::UnboundedReceiver<ConnectResult<C>>,

    timers: DelayQueue<TimerEvent>,
    registry: TransactionRegistry<PendingRequest>,
    admission: AdmissionController<Operation>,
    slaves: SlaveTable,
    counters: Counters,
    drain_requested: bool,
}

impl<C: Connector> Engine<C> {
    pub fn new(
        config: ClientConfig,
        connector: C,
        commands: mpsc::UnboundedReceiver<Command>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        let (link_events_tx, link_events) = mpsc::unbounded_channel();
        let (connect_results_tx, connect_results) = mpsc::unbounded_channel();
        let admission = AdmissionController::new(
            config.max_concurrent_requests,
            config.max_concurrent_requests_per_slave,
        );
        let slaves = SlaveTable::new(config.request_attempts);

        Self {
            config,
            connector: Arc::new(connector),
            commands,
            state,
            link: None,
            epoch: 0,
            link_events_tx,
            link_events,
            connect_task: None,
            connect_results_tx,
            connect_results,
            timers: DelayQueue::new(),
            registry: TransactionRegistry::new(),
            admission,
            slaves,
            counters: Counters::default(),
            drain_requested: false,
        }
    }

    /// Run until shutdown or until every client handle is dropped.
    pub async fn run(mut self) {
        self.start_connect();

        loop {
            // Each pass admits at most one queued request.
            while std::mem::take(&mut self.drain_requested) {
                self.drain_once();
            }

            let wake = tokio::select! {
                command = self.commands.recv() => Wake::Command(command),
                Some((epoch, event)) = self.link_events.recv() => Wake::Link(epoch, event),
                Some((epoch, result)) = self.connect_results.recv() => {
                    Wake::Connected(epoch, result)
                }
                Some(expired) = poll_fn(|cx| self.timers.poll_expired(cx)),
                    if !self.timers.is_empty() =>
                {
                    Wake::Timer(expired.into_inner())
                }
            };

            match wake {
                Wake::Command(Some(Command::Submit(operation))) => self.submit(operation),
                Wake::Command(Some(Command::Stats(reply))) => {
                    let _ = reply.send(self.stats());
                }
                Wake::Command(Some(Command::Shutdown(done))) => {
                    self.shutdown();
                    let _ = done.send(());
                    return;
                }
                Wake::Command(None) => {
                    self.shutdown();
                    return;
                }
                Wake::Link(epoch, event) => self.on_link_event(epoch, event),
                Wake::Connected(epoch, result) => self.on_connected(epoch, result),
                Wake::Timer(event) => self.on_timer(event),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------------

    fn start_connect(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;
        self.set_state(ConnectionState::Connecting);
        info!(address = %self.config.address(), epoch, "Connecting to gateway");

        let connector = Arc::clone(&self.connector);
        let host = self.config.host.clone();
        let port = self.config.port;
        let results = self.connect_results_tx.clone();
        self.connect_task = Some(tokio::spawn(async move {
            let result = connector.connect(&host, port).await;
            let _ = results.send((epoch, result));
        }));
    }

    fn on_connected(&mut self, epoch: u64, result: io::Result<C::Stream>) {
        if epoch != self.epoch {
            return;
        }
        self.connect_task = None;

        match result {
            Ok(stream) => {
                info!(address = %self.config.address(), epoch, "Connected to gateway");
                self.link = Some(Link::spawn(stream, epoch, self.link_events_tx.clone()));
                self.set_state(ConnectionState::Open);
            }
            Err(e) => {
                warn!(address = %self.config.address(), error = %e, "Connection failed");
                self.set_state(ConnectionState::Closed);
                self.schedule_reconnect();
            }
        }
    }

    fn on_connection_lost(&mut self) {
        warn!(
            address = %self.config.address(),
            pending = self.registry.len(),
            queued = self.admission.queued(),
            "Connection lost"
        );
        self.link = None;
        self.epoch += 1;
        self.counters.connection_losses += 1;
        self.set_state(ConnectionState::Closed);
        self.fail_all(ModbusError::ConnectionLost);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        debug!(delay_ms = self.config.reconnect_delay_ms, "Reconnect scheduled");
        self.timers
            .insert(TimerEvent::Reconnect, self.config.reconnect_delay());
    }

    fn shutdown(&mut self) {
        info!(address = %self.config.address(), "Client closing");
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        self.link = None;
        self.set_state(ConnectionState::Closed);
        self.fail_all(ModbusError::ConnectionLost);
    }

    /// Fail every pending and queued request and zero all counters.
    fn fail_all(&mut self, error: ModbusError) {
        for (_, pending) in self.registry.drain() {
            self.timers.try_remove(&pending.timer);
            pending.operation.responder.fail(error.clone());
        }
        for operation in self.admission.reset() {
            operation.responder.fail(error.clone());
        }
        self.slaves.reset_counters();
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    // ------------------------------------------------------------------------
    // Admission and transmission
    // ------------------------------------------------------------------------

    fn submit(&mut self, operation: Operation) {
        let slave_id = operation.slave_id;
        if self.slaves.entry(slave_id).is_banned() {
            debug!(slave_id, "Slave is banned, rejecting request");
            self.timers.insert(
                TimerEvent::BanReject {
                    slave_id,
                    responder: operation.responder,
                },
                self.config.ban_reject_delay(),
            );
            return;
        }
        self.admit(operation);
    }

    fn admit(&mut self, operation: Operation) {
        if self
            .admission
            .has_capacity(self.slaves.concurrent_requests(operation.slave_id))
        {
            self.transmit(operation);
        } else {
            trace!(
                slave_id = operation.slave_id,
                queued = self.admission.queued() + 1,
                "Request queued"
            );
            self.admission.enqueue(operation);
        }
    }

    fn schedule_drain(&mut self) {
        self.drain_requested = true;
    }

    fn drain_once(&mut self) {
        let slaves = &self.slaves;
        let next = self
            .admission
            .next_admissible(|operation| slaves.concurrent_requests(operation.slave_id));
        if let Some(operation) = next {
            self.transmit(operation);
            self.schedule_drain();
        }
    }

    fn transmit(&mut self, mut operation: Operation) {
        let Some(link) = self.link.as_ref() else {
            operation.responder.fail(ModbusError::SocketNotConnected);
            return;
        };

        let Some(transaction_id) = self.registry.allocate() else {
            operation
                .responder
                .fail(ModbusError::protocol("No free transaction id"));
            return;
        };

        let slave_id = operation.slave_id;
        operation.telegram.stamp(transaction_id, slave_id);
        let frame = OutboundFrame {
            transaction_id,
            bytes: operation.telegram.to_bytes(),
        };

        if link.send(frame).is_err() {
            warn!(transaction_id, slave_id, "Writer task stopped");
            operation
                .responder
                .fail(ModbusError::write_error("writer task stopped"));
            self.schedule_drain();
            return;
        }

        self.admission.acquire(self.slaves.entry(slave_id));
        self.counters.requests_sent += 1;
        let timer = self.timers.insert(
            TimerEvent::Response(transaction_id),
            self.config.response_timeout(),
        );
        trace!(transaction_id, slave_id, "Request sent");
        self.registry
            .insert(transaction_id, PendingRequest { operation, timer });
    }

    /// Give back the slots of a request that left the pending map.
    fn release(&mut self, slave_id: SlaveId) {
        self.admission.release(self.slaves.entry(slave_id));
        self.schedule_drain();
    }

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    fn on_link_event(&mut self, epoch: u64, event: LinkEvent) {
        if epoch != self.epoch {
            trace!(epoch, current = self.epoch, "Event from a closed connection ignored");
            return;
        }

        match event {
            LinkEvent::Frame(frame) => self.on_frame(&frame),
            LinkEvent::WriteFailed {
                transaction_id,
                message,
            } => {
                let Some(pending) = self.registry.remove(transaction_id) else {
                    return;
                };
                self.timers.try_remove(&pending.timer);
                self.release(pending.operation.slave_id);
                pending
                    .operation
                    .responder
                    .fail(ModbusError::write_error(message));
            }
            LinkEvent::Closed => self.on_connection_lost(),
        }
    }

    fn on_frame(&mut self, frame: &[u8]) {
        if frame.len() < MIN_RESPONSE_LEN {
            trace!(len = frame.len(), "Short frame ignored");
            return;
        }

        let transaction_id = u16::from_be_bytes([frame[0], frame[1]]);
        let Some(pending) = self.registry.remove(transaction_id) else {
            debug!(transaction_id, "Response without pending request ignored");
            return;
        };
        self.timers.try_remove(&pending.timer);
        self.counters.responses_received += 1;

        let operation = pending.operation;
        let slave_id = operation.slave_id;
        self.release(slave_id);

        let unit_id = frame[UNIT_ID_OFFSET];
        if unit_id != slave_id {
            operation.responder.fail(ModbusError::ResponseWrongSlave {
                expected: slave_id,
                actual: unit_id,
            });
            return;
        }

        if frame.len() == EXCEPTION_RESPONSE_LEN
            && frame[FUNCTION_OFFSET] == operation.telegram.function() | EXCEPTION_FLAG
        {
            let code = frame[EXCEPTION_CODE_OFFSET];
            debug!(transaction_id, slave_id, code, "Exception response");
            self.on_fault(operation, FaultKind::from_exception_code(code));
            return;
        }

        let expected = operation.telegram.expected_response_len();
        if frame.len() != expected {
            operation.responder.fail(ModbusError::ResponseWrongLength {
                expected,
                actual: frame.len(),
            });
            return;
        }

        self.slaves
            .entry(slave_id)
            .record_success(self.config.request_attempts);
        operation.responder.complete(frame);
    }

    fn on_fault(&mut self, operation: Operation, fault: FaultKind) {
        let slave_id = operation.slave_id;
        let slave = self.slaves.entry(slave_id);

        match slave.on_fault(fault, self.config.request_attempts) {
            Verdict::Retry => {
                debug!(
                    slave_id,
                    errors_left = slave.health.errors_left(),
                    "Retrying request"
                );
                self.admit(operation);
            }
            Verdict::Fail { ban_started } => {
                if ban_started {
                    warn!(slave_id, ban_ms = self.config.ban_timeout_ms, "Slave banned");
                    self.timers
                        .insert(TimerEvent::Unban(slave_id), self.config.ban_timeout());
                }
                let error = match fault {
                    FaultKind::GatewayPathUnavailable => {
                        ModbusError::GatewayPathUnavailable { slave_id }
                    }
                    FaultKind::NoReply => ModbusError::SlaveNoReply { slave_id },
                    FaultKind::Exception(code) => ModbusError::ResponseException {
                        function: operation.telegram.function(),
                        code,
                    },
                };
                operation.responder.fail(error);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Response(transaction_id) => {
                let Some(pending) = self.registry.remove(transaction_id) else {
                    return;
                };
                let slave_id = pending.operation.slave_id;
                debug!(transaction_id, slave_id, "Response timeout");
                self.counters.timeouts += 1;
                self.release(slave_id);
                self.on_fault(pending.operation, FaultKind::NoReply);
            }
            TimerEvent::Unban(slave_id) => {
                info!(slave_id, "Slave unbanned");
                self.slaves.entry(slave_id).lift_ban();
            }
            TimerEvent::Reconnect => {
                if self.link.is_none() && self.connect_task.is_none() {
                    self.start_connect();
                }
            }
            TimerEvent::BanReject {
                slave_id,
                responder,
            } => responder.fail(ModbusError::SlaveBanned { slave_id }),
        }
    }

    fn stats(&self) -> ClientStats {
        ClientStats {
            connection: *self.state.borrow(),
            in_flight: self.admission.in_flight(),
            pending: self.registry.len(),
            queued: self.admission.queued(),
            slaves: self
                .slaves
                .iter()
                .map(|(id, state)| {
                    (
                        *id,
                        SlaveSnapshot {
                            health: state.health,
                            concurrent_requests: state.concurrent_requests,
                        },
                    )
                })
                .collect(),
            requests_sent: self.counters.requests_sent,
            responses_received: self.counters.responses_received,
            timeouts: self.counters.timeouts,
            connection_losses: self.counters.connection_losses,
        }
    }
}
