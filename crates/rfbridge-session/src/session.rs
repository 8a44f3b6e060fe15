//! The session controller: one handle, one I/O task, one serial link.
//!
//! # Architecture
//!
//! ```text
//! Session (cloneable handle)
//!     │
//!     ├── mpsc ─────────> I/O task ──> Framed<Transport, LineCodec>
//!     │                      │
//!     ├── broadcast <── decoded ProtocolEvents
//!     └── watch     <── ConnectionState changes
//! ```
//!
//! The I/O task owns the transport exclusively. Commands travel through
//! the mpsc channel as [`Transaction`]s carrying a oneshot responder; the
//! channel is only polled while no transaction is in flight, which
//! serializes commands on the wire and keeps each result line paired with
//! exactly one command. Everything else arriving on the line is either a
//! command echo (acknowledges the pending transaction, diagnostically) or
//! an unsolicited `RF` report, which is decoded against the registry and
//! fanned out to subscribers.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rfbridge_pulse::ProtocolRegistry;
//! use rfbridge_session::{Session, SessionConfig};
//! use rfbridge_transport::MockSerial;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (transport, _device) = MockSerial::new();
//! let registry = Arc::new(ProtocolRegistry::default());
//!
//! let session = Session::connect(transport, registry, SessionConfig::default()).await?;
//! session.configure_receive_pin(2.try_into()?).await?;
//!
//! let mut events = session.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{} {:?}", event.protocol, event.values);
//! }
//!
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::num::NonZeroU8;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Notify, broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

use rfbridge_core::Pin;
use rfbridge_protocol::{Command, FirmwareLine, LineCodec, PinRole};
use rfbridge_pulse::{FieldValue, ProtocolEvent, ProtocolRegistry};
use rfbridge_transport::Transport;

use crate::config::SessionConfig;
use crate::error::{Error, Result, TransactionError};
use crate::state::ConnectionState;

/// Commands queued while another is in flight; senders past this depth
/// wait for room.
const COMMAND_QUEUE_DEPTH: usize = 16;

type TransactionOutcome = std::result::Result<Option<String>, TransactionError>;

/// Which line resolves a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// A `RES OK` / `RES ERROR` line.
    Result,
    /// The `ready` handshake line, answering a reset.
    Handshake,
}

/// One command/response exchange, queued toward the I/O task.
struct Transaction {
    command: Command,
    expect: Expect,
    timeout: Duration,
    responder: oneshot::Sender<TransactionOutcome>,
}

/// A dispatched transaction waiting for its terminal line.
struct Pending {
    expect: Expect,
    command_line: String,
    deadline: Instant,
    timeout: Duration,
    acknowledged: bool,
    responder: oneshot::Sender<TransactionOutcome>,
}

/// Why the I/O task stopped.
enum Exit {
    /// Orderly shutdown: `disconnect()` or every handle dropped.
    Closed,
    /// The transport died or the handshake never arrived.
    Failed,
}

/// Handle to one firmware session.
///
/// Cheap to clone; all clones drive the same I/O task and the same serial
/// link. Dropping every clone shuts the task down as if
/// [`disconnect`](Session::disconnect) had been called.
///
/// # Lifecycle
///
/// 1. [`connect`](Session::connect) an opened transport (handshake included)
/// 2. [`configure_receive_pin`](Session::configure_receive_pin) /
///    [`configure_transmit_pin`](Session::configure_transmit_pin)
/// 3. [`subscribe`](Session::subscribe) for decoded events,
///    [`send`](Session::send) to transmit
/// 4. [`disconnect`](Session::disconnect)
#[derive(Debug, Clone)]
pub struct Session {
    requests: mpsc::Sender<Transaction>,
    shutdown: Arc<Notify>,
    events: broadcast::Sender<ProtocolEvent>,
    state: watch::Receiver<ConnectionState>,
    registry: Arc<ProtocolRegistry>,
    config: SessionConfig,
    ping_seq: Arc<AtomicU64>,
}

impl Session {
    /// Take ownership of an opened transport and perform the handshake.
    ///
    /// Spawns the I/O task, sends the reset command and waits for the
    /// firmware's `ready` line. The firmware also emits `ready` on its
    /// own after a power-on reset; whichever banner arrives first
    /// completes the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTimeout`] when no handshake line arrives
    /// within `config.handshake_timeout`. The transport is consumed either
    /// way; retry with a freshly opened one.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use rfbridge_pulse::ProtocolRegistry;
    /// use rfbridge_session::{Session, SessionConfig};
    /// use rfbridge_transport::serial;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let port = serial::open("/dev/ttyUSB0", 115_200)?;
    /// let registry = Arc::new(ProtocolRegistry::default());
    /// let session = Session::connect(port, registry, SessionConfig::default()).await?;
    /// assert!(session.is_ready());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect<T>(
        transport: T,
        registry: Arc<ProtocolRegistry>,
        config: SessionConfig,
    ) -> Result<Self>
    where
        T: Transport,
    {
        let (requests, requests_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let shutdown = Arc::new(Notify::new());
        // broadcast::channel panics on a zero capacity
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);

        tokio::spawn(run_io(
            transport,
            Arc::clone(&registry),
            requests_rx,
            Arc::clone(&shutdown),
            events.clone(),
            state_tx,
        ));

        let session = Self {
            requests,
            shutdown,
            events,
            state,
            registry,
            config,
            ping_seq: Arc::new(AtomicU64::new(0)),
        };

        info!("Resetting firmware and awaiting handshake");
        match session
            .transact(Command::Reset, Expect::Handshake, config.handshake_timeout)
            .await
        {
            Ok(_) => {
                info!("Session ready");
                Ok(session)
            }
            Err(TransactionError::Timeout { timeout }) => {
                warn!("No handshake within {}ms", timeout.as_millis());
                Err(Error::HandshakeTimeout { timeout })
            }
            Err(error) => Err(error.into()),
        }
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether the session is in the ready state.
    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// A watch receiver observing connection state changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Subscribe to decoded protocol events.
    ///
    /// Events are delivered in wire arrival order; a train matching
    /// several protocols yields consecutive events in registration order.
    /// A subscriber that falls more than the configured event capacity
    /// behind loses the oldest events (`RecvError::Lagged`).
    pub fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.events.subscribe()
    }

    /// The protocol registry this session decodes and encodes with.
    pub fn registry(&self) -> &ProtocolRegistry {
        &self.registry
    }

    /// Configure which pin the firmware listens for RF pulses on.
    ///
    /// # Errors
    ///
    /// [`Error::NotReady`] outside the ready state;
    /// [`Error::ConfigurationFailed`] when the firmware rejects the pin or
    /// the command times out. Both leave the session usable.
    pub async fn configure_receive_pin(&self, pin: Pin) -> Result<()> {
        self.configure_pin(PinRole::Receive, pin).await
    }

    /// Configure which pin the firmware transmits RF pulses on.
    ///
    /// # Errors
    ///
    /// Same as [`configure_receive_pin`](Session::configure_receive_pin).
    pub async fn configure_transmit_pin(&self, pin: Pin) -> Result<()> {
        self.configure_pin(PinRole::Transmit, pin).await
    }

    async fn configure_pin(&self, role: PinRole, pin: Pin) -> Result<()> {
        self.ensure_ready()?;
        debug!("Configuring {} pin {}", role, pin);
        self.transact(
            Command::SetPin { role, pin },
            Expect::Result,
            self.config.response_timeout,
        )
        .await
        .map(|_| ())
        .map_err(|source| Error::ConfigurationFailed { role, pin, source })
    }

    /// Encode a protocol message and transmit it `repeat` times.
    ///
    /// Encoding happens before anything touches the wire, so encode
    /// errors never leave a partial transmission behind. Each repetition
    /// is its own transmit command awaiting its own result; RF receivers
    /// expect identical bursts close together, which is why the default
    /// caller-facing repeat is above one.
    ///
    /// # Errors
    ///
    /// [`Error::NotReady`] outside the ready state; [`Error::Encode`] for
    /// unknown protocol ids or bad field values; [`Error::TransmitFailed`]
    /// naming the first repetition whose transmit command failed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::collections::BTreeMap;
    /// use std::num::NonZeroU8;
    /// use rfbridge_pulse::FieldValue;
    /// # async fn example(session: rfbridge_session::Session) -> rfbridge_session::Result<()> {
    /// let values = BTreeMap::from([
    ///     ("unit".to_string(), FieldValue::Number(4)),
    ///     ("state".to_string(), FieldValue::Flag(true)),
    /// ]);
    /// session.send("switch", &values, NonZeroU8::new(3).unwrap()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send(
        &self,
        protocol_id: &str,
        values: &BTreeMap<String, FieldValue>,
        repeat: NonZeroU8,
    ) -> Result<()> {
        self.ensure_ready()?;
        let train = self.registry.encode(protocol_id, values)?;
        debug!(
            protocol = protocol_id,
            pulses = train.len(),
            repeat = repeat.get(),
            "Transmitting"
        );

        for repetition in 1..=repeat.get() {
            let command = Command::Send {
                train: train.clone(),
                repeat: None,
            };
            self.transact(command, Expect::Result, self.config.response_timeout)
                .await
                .map_err(|source| Error::TransmitFailed {
                    protocol: protocol_id.to_string(),
                    repetition,
                    source,
                })?;
        }
        Ok(())
    }

    /// Check firmware liveness.
    ///
    /// Sends a ping carrying a session-unique token and reports whether
    /// the ok-result echoed it back. `Ok(false)` means the firmware
    /// answered but with the wrong payload.
    ///
    /// # Errors
    ///
    /// [`Error::NotReady`] outside the ready state; [`Error::PingFailed`]
    /// when the ping times out, is rejected, or the link dies.
    pub async fn ping(&self) -> Result<bool> {
        self.ensure_ready()?;
        let token = format!("rfbridge-{}", self.ping_seq.fetch_add(1, Ordering::Relaxed));
        let payload = self
            .transact(
                Command::Ping {
                    token: token.clone(),
                },
                Expect::Result,
                self.config.response_timeout,
            )
            .await
            .map_err(|source| Error::PingFailed { source })?;

        let echoed = payload.as_deref() == Some(token.as_str());
        if !echoed {
            warn!(expected = %token, actual = ?payload, "Ping response did not echo the token");
        }
        Ok(echoed)
    }

    /// Shut the session down.
    ///
    /// Resolves any in-flight transaction as cancelled, stops the I/O
    /// task and waits until the state watch reports a terminal state.
    /// Safe to call at any time, from any clone, more than once.
    pub async fn disconnect(&self) {
        debug!("Disconnect requested");
        // A Notify rather than a queued request: the request channel is
        // not polled while a transaction is pending, and disconnect must
        // not wait out that transaction's deadline.
        self.shutdown.notify_one();

        let mut state = self.state.clone();
        // The watch retains its last value, so this resolves even when
        // the task exited before we started waiting.
        let _ = state.wait_for(|state| state.is_terminal()).await;
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Ready => Ok(()),
            state => Err(Error::NotReady { state }),
        }
    }

    async fn transact(
        &self,
        command: Command,
        expect: Expect,
        timeout: Duration,
    ) -> TransactionOutcome {
        let (responder, outcome) = oneshot::channel();
        let transaction = Transaction {
            command,
            expect,
            timeout,
            responder,
        };

        if self.requests.send(transaction).await.is_err() {
            return Err(TransactionError::Disconnected);
        }

        // The I/O task resolves every accepted transaction before it
        // drops the responder; a closed channel still means the link died.
        outcome.await.unwrap_or(Err(TransactionError::Disconnected))
    }
}

/// The I/O task: sole owner of the transport.
///
/// Multiplexes three event sources: queued transactions (only while none
/// is pending), inbound lines, and the pending transaction's deadline.
async fn run_io<T>(
    transport: T,
    registry: Arc<ProtocolRegistry>,
    mut requests: mpsc::Receiver<Transaction>,
    shutdown: Arc<Notify>,
    events: broadcast::Sender<ProtocolEvent>,
    state: watch::Sender<ConnectionState>,
) where
    T: Transport,
{
    let mut framed = Framed::new(transport, LineCodec::new());
    let mut pending: Option<Pending> = None;

    let exit = loop {
        let deadline = pending.as_ref().map(|pending| pending.deadline);

        tokio::select! {
            () = shutdown.notified() => {
                debug!("Shutdown requested");
                break Exit::Closed;
            }

            request = requests.recv(), if pending.is_none() => match request {
                Some(transaction) => {
                    match dispatch(&mut framed, transaction).await {
                        Some(dispatched) => pending = Some(dispatched),
                        None => break Exit::Failed,
                    }
                }
                // Every handle is gone; nobody can issue commands anymore.
                None => break Exit::Closed,
            },

            line = framed.next() => match line {
                Some(Ok(line)) => {
                    handle_line(line, &mut pending, &registry, &events, &state);
                }
                Some(Err(error)) => {
                    error!("Serial read failed: {}", error);
                    break Exit::Failed;
                }
                None => {
                    warn!("Serial link closed by peer");
                    break Exit::Failed;
                }
            },

            () = expire(deadline) => {
                if let Some(expired) = pending.take() {
                    warn!(
                        command = %expired.command_line,
                        timeout_ms = expired.timeout.as_millis() as u64,
                        "Command timed out"
                    );
                    let handshake = expired.expect == Expect::Handshake;
                    let _ = expired.responder.send(Err(TransactionError::Timeout {
                        timeout: expired.timeout,
                    }));
                    // A dead handshake means a dead session; command
                    // timeouts after that are survivable.
                    if handshake {
                        break Exit::Failed;
                    }
                }
            }
        }
    };

    let final_state = match exit {
        Exit::Closed => ConnectionState::Disconnected,
        Exit::Failed => ConnectionState::Error,
    };
    set_state(&state, final_state);

    let outcome = match exit {
        Exit::Closed => TransactionError::Cancelled,
        Exit::Failed => TransactionError::Disconnected,
    };
    if let Some(abandoned) = pending.take() {
        let _ = abandoned.responder.send(Err(outcome.clone()));
    }
    // Queued transactions that never reached the wire resolve the same way.
    requests.close();
    while let Ok(transaction) = requests.try_recv() {
        let _ = transaction.responder.send(Err(outcome.clone()));
    }

    // Signal EOF to the peer before the transport drops.
    if let Err(error) = framed.into_inner().shutdown().await {
        debug!("Transport shutdown failed: {}", error);
    }

    debug!("Session I/O task stopped in state {}", final_state);
}

/// Write one command to the wire and turn it into a pending transaction.
///
/// Returns `None` when the write fails; the transaction is resolved as
/// disconnected before returning.
async fn dispatch<T>(
    framed: &mut Framed<T, LineCodec>,
    transaction: Transaction,
) -> Option<Pending>
where
    T: Transport,
{
    let command_line = transaction.command.to_string();
    trace!(command = %command_line, "Dispatching command");

    if let Err(error) = framed.send(transaction.command).await {
        error!("Serial write failed: {}", error);
        let _ = transaction
            .responder
            .send(Err(TransactionError::Disconnected));
        return None;
    }

    Some(Pending {
        expect: transaction.expect,
        command_line,
        deadline: Instant::now() + transaction.timeout,
        timeout: transaction.timeout,
        acknowledged: false,
        responder: transaction.responder,
    })
}

/// Route one classified line: resolve the pending transaction, mark its
/// echo, or fan a decoded event out to subscribers.
fn handle_line(
    line: FirmwareLine,
    pending: &mut Option<Pending>,
    registry: &ProtocolRegistry,
    events: &broadcast::Sender<ProtocolEvent>,
    state: &watch::Sender<ConnectionState>,
) {
    match line {
        FirmwareLine::Received(train) => {
            let decoded = registry.decode_all(&train);
            if decoded.is_empty() {
                debug!(pulses = train.len(), "Pulse train matched no protocol");
            }
            for event in decoded {
                trace!(
                    protocol = %event.protocol,
                    confidence = event.confidence,
                    "Decoded protocol event"
                );
                // Err only means nobody is subscribed right now.
                let _ = events.send(event);
            }
        }

        FirmwareLine::Echo(text) => match pending.as_mut() {
            Some(current) if !current.acknowledged && current.command_line == text => {
                current.acknowledged = true;
                trace!(command = %text, "Command echoed by firmware");
            }
            _ => trace!(echo = %text, "Stray firmware echo"),
        },

        FirmwareLine::Ok(payload) => resolve(pending, Ok(payload)),

        FirmwareLine::Error(payload) => {
            resolve(pending, Err(TransactionError::Rejected { payload }));
        }

        FirmwareLine::Ready => match pending.take() {
            Some(done) if done.expect == Expect::Handshake => {
                set_state(state, ConnectionState::Ready);
                let _ = done.responder.send(Ok(None));
            }
            kept => {
                *pending = kept;
                warn!("Unexpected handshake line; firmware may have restarted");
            }
        },
    }
}

/// Resolve the pending transaction with a result-line outcome.
fn resolve(pending: &mut Option<Pending>, outcome: TransactionOutcome) {
    match pending.take() {
        Some(current) if current.expect == Expect::Result => {
            trace!(
                command = %current.command_line,
                ok = outcome.is_ok(),
                acknowledged = current.acknowledged,
                "Transaction resolved"
            );
            let _ = current.responder.send(outcome);
        }
        Some(current) => {
            // Only the handshake line resolves a handshake wait.
            warn!("Result line while awaiting handshake; dropped");
            *pending = Some(current);
        }
        None => {
            debug!("Result line with no transaction pending; dropped");
        }
    }
}

/// Sleep until the pending transaction's deadline; never wake without one.
async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn set_state(state: &watch::Sender<ConnectionState>, next: ConnectionState) {
    let current = *state.borrow();
    if current == next {
        return;
    }
    if !current.can_transition_to(next) {
        warn!("Irregular session state change {} -> {}", current, next);
    }
    debug!("Session state {} -> {}", current, next);
    let _ = state.send(next);
}
