//! Device side of the firmware line protocol.
//!
//! [`MockFirmware`] plays the transceiver firmware over the far end of a
//! [`MockSerial`] link: it greets with the boot banner, echoes and
//! executes every command, and reports injected pulse trains as `RF`
//! event lines. [`FirmwareHandle`] scripts what the "hardware" sees and
//! reads back what it was told to do.

use futures::{SinkExt, StreamExt};
use rfbridge_core::{Pin, PulseTrain};
use rfbridge_protocol::{Command, FirmwareLine, PinRole};
use rfbridge_transport::{MockSerial, MockSerialHandle};
use std::io;
use std::num::NonZeroU8;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, trace, warn};

/// Host lines are read through the same length cap the host codec uses.
const MAX_HOST_LINE_LENGTH: usize = 8 * 1024;

/// Behavior switches for [`MockFirmware::spawn_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirmwareConfig {
    /// Never send the `ready` banner, neither at power-on nor after
    /// `RESET`. Models a dead or foreign device for handshake timeouts.
    pub mute: bool,
    /// Echo commands but never send a result line. Models a wedged
    /// device for command timeouts. The banner is still sent, so a
    /// session can connect first.
    pub unresponsive: bool,
}

/// In-process stand-in for the transceiver firmware.
///
/// [`spawn`](MockFirmware::spawn) starts the device task and returns the
/// host side of the link, ready to be handed to a session, together with
/// a [`FirmwareHandle`] for driving the device from the test.
///
/// The device answers like the real firmware: a `ready` banner at
/// power-on and after `RESET`, an `ECHO` of every command line, then a
/// `RES OK` or `RES ERROR` result. Configured pins and transmitted
/// trains are recorded for the handle to read back.
///
/// # Examples
///
/// ```
/// use rfbridge_emulator::MockFirmware;
/// use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
///
/// #[tokio::main]
/// async fn main() -> std::io::Result<()> {
///     let (port, handle) = MockFirmware::spawn();
///     let mut port = BufReader::new(port);
///
///     let mut line = String::new();
///     port.read_line(&mut line).await?;
///     assert_eq!(line, "ready\n");
///
///     port.write_all(b"PIN receive 2\n").await?;
///     line.clear();
///     port.read_line(&mut line).await?;
///     assert_eq!(line, "ECHO PIN receive 2\n");
///     line.clear();
///     port.read_line(&mut line).await?;
///     assert_eq!(line, "RES OK\n");
///
///     assert_eq!(handle.receive_pin().await.map(|pin| pin.as_u8()), Some(2));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockFirmware {
    link: Framed<MockSerialHandle, LinesCodec>,
    directives: mpsc::Receiver<Directive>,
    state: Arc<Mutex<DeviceState>>,
    config: FirmwareConfig,
}

impl MockFirmware {
    /// Start an emulated device with default behavior.
    ///
    /// Must be called from within a Tokio runtime; the device runs as a
    /// spawned task until the host side of the link goes away.
    pub fn spawn() -> (MockSerial, FirmwareHandle) {
        Self::spawn_with(FirmwareConfig::default())
    }

    /// Start an emulated device with the given behavior switches.
    pub fn spawn_with(config: FirmwareConfig) -> (MockSerial, FirmwareHandle) {
        let (port, link) = MockSerial::new();
        let (directive_tx, directive_rx) = mpsc::channel(32);
        let state = Arc::new(Mutex::new(DeviceState::default()));

        let firmware = MockFirmware {
            link: Framed::new(link, LinesCodec::new_with_max_length(MAX_HOST_LINE_LENGTH)),
            directives: directive_rx,
            state: Arc::clone(&state),
            config,
        };
        tokio::spawn(firmware.run());

        let handle = FirmwareHandle {
            directives: directive_tx,
            state,
        };
        (port, handle)
    }

    async fn run(mut self) {
        debug!(
            mute = self.config.mute,
            unresponsive = self.config.unresponsive,
            "Firmware emulator started"
        );
        if !self.config.mute && self.say(FirmwareLine::Ready).await.is_err() {
            return;
        }

        let mut injections_open = true;
        loop {
            tokio::select! {
                frame = self.link.next() => match frame {
                    Some(Ok(line)) => {
                        if let Err(error) = self.handle_line(&line).await {
                            debug!(%error, "Device write failed");
                            break;
                        }
                    }
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        warn!("Oversized host line skipped");
                    }
                    Some(Err(LinesCodecError::Io(error))) => {
                        debug!(%error, "Serial link failed");
                        break;
                    }
                    None => {
                        debug!("Host hung up");
                        break;
                    }
                },
                directive = self.directives.recv(), if injections_open => match directive {
                    Some(Directive::Inject(line)) => {
                        if self.say_raw(line).await.is_err() {
                            break;
                        }
                    }
                    None => injections_open = false,
                },
            }
        }
        debug!("Firmware emulator stopped");
    }

    async fn handle_line(&mut self, line: &str) -> Result<(), LinesCodecError> {
        self.say(FirmwareLine::Echo(line.to_string())).await?;

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(_) => {
                debug!(%line, "Rejecting unknown command");
                let reason = Some("unknown command".to_string());
                return self.respond(FirmwareLine::Error(reason)).await;
            }
        };

        match command {
            Command::Reset => {
                {
                    let mut state = self.state.lock().await;
                    state.receive_pin = None;
                    state.transmit_pin = None;
                }
                debug!("Device reset");
                // A reset is answered by the boot banner, not a result line.
                if self.config.mute {
                    Ok(())
                } else {
                    self.say(FirmwareLine::Ready).await
                }
            }
            Command::Ping { token } => self.respond(FirmwareLine::Ok(Some(token))).await,
            Command::SetPin { role, pin } => {
                {
                    let mut state = self.state.lock().await;
                    match role {
                        PinRole::Receive => state.receive_pin = Some(pin),
                        PinRole::Transmit => state.transmit_pin = Some(pin),
                    }
                }
                debug!(%role, %pin, "Pin configured");
                self.respond(FirmwareLine::Ok(None)).await
            }
            Command::Send { train, repeat } => {
                let count = repeat.map_or(1, NonZeroU8::get);
                {
                    let mut state = self.state.lock().await;
                    for _ in 0..count {
                        state.transmissions.push(train.clone());
                    }
                }
                debug!(%train, count, "Transmission recorded");
                self.respond(FirmwareLine::Ok(None)).await
            }
        }
    }

    /// Send a result line, unless the device is playing dead.
    async fn respond(&mut self, line: FirmwareLine) -> Result<(), LinesCodecError> {
        if self.config.unresponsive {
            trace!(%line, "Result suppressed");
            return Ok(());
        }
        self.say(line).await
    }

    async fn say(&mut self, line: FirmwareLine) -> Result<(), LinesCodecError> {
        self.say_raw(line.to_string()).await
    }

    async fn say_raw(&mut self, line: String) -> Result<(), LinesCodecError> {
        trace!(%line, "Device line out");
        self.link.send(line).await
    }
}

/// Internal instruction from a [`FirmwareHandle`] to the device task.
#[derive(Debug)]
enum Directive {
    /// Write one raw line to the host.
    Inject(String),
}

/// What the device has been told so far.
#[derive(Debug, Default)]
struct DeviceState {
    receive_pin: Option<Pin>,
    transmit_pin: Option<Pin>,
    transmissions: Vec<PulseTrain>,
}

/// Handle for driving and inspecting a [`MockFirmware`].
///
/// Cloneable; all clones talk to the same device task. Injected lines go
/// through the device task itself, so they never split an in-progress
/// echo or result line.
#[derive(Debug, Clone)]
pub struct FirmwareHandle {
    directives: mpsc::Sender<Directive>,
    state: Arc<Mutex<DeviceState>>,
}

impl FirmwareHandle {
    /// Report a received pulse train to the host as an `RF` event line.
    ///
    /// # Errors
    ///
    /// Returns a `BrokenPipe` error when the device task has stopped,
    /// which happens once the host side of the link is gone.
    ///
    /// # Examples
    ///
    /// ```
    /// use rfbridge_core::PulseTrain;
    /// use rfbridge_emulator::MockFirmware;
    /// use tokio::io::{AsyncBufReadExt, BufReader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let (port, handle) = MockFirmware::spawn();
    ///     let mut port = BufReader::new(port);
    ///
    ///     let mut line = String::new();
    ///     port.read_line(&mut line).await?; // ready
    ///
    ///     handle.emit_event(&PulseTrain::new(vec![276, -2670])?).await?;
    ///
    ///     line.clear();
    ///     port.read_line(&mut line).await?;
    ///     assert_eq!(line, "RF 276,-2670\n");
    ///     Ok(())
    /// }
    /// ```
    pub async fn emit_event(&self, train: &PulseTrain) -> io::Result<()> {
        self.inject(FirmwareLine::Received(train.clone()).to_string())
            .await
    }

    /// Write one raw line to the host, exactly as given.
    ///
    /// Useful for boot chatter and corrupted lines the host is expected
    /// to drop.
    ///
    /// # Errors
    ///
    /// Returns a `BrokenPipe` error when the device task has stopped.
    pub async fn emit_noise(&self, line: &str) -> io::Result<()> {
        self.inject(line.to_string()).await
    }

    /// The pulse trains the device was asked to transmit, in order.
    ///
    /// A `SEND` with a trailing repeat count appears once per repetition.
    /// The log survives `RESET`; it records what the observer saw, not
    /// device memory.
    pub async fn transmissions(&self) -> Vec<PulseTrain> {
        self.state.lock().await.transmissions.clone()
    }

    /// The currently configured receive pin, if any.
    pub async fn receive_pin(&self) -> Option<Pin> {
        self.state.lock().await.receive_pin
    }

    /// The currently configured transmit pin, if any.
    pub async fn transmit_pin(&self) -> Option<Pin> {
        self.state.lock().await.transmit_pin
    }

    async fn inject(&self, line: String) -> io::Result<()> {
        self.directives
            .send(Directive::Inject(line))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "firmware task stopped"))
    }
}
