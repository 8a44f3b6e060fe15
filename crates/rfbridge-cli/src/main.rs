//! Manual listen/send tool for the RF bridge.
//!
//! Diagnostics go to stderr through `tracing`; decoded events are the
//! payload and go to stdout, one line each, as `<protocol> <values-json>`.

mod catalog;

use std::collections::BTreeMap;
use std::num::NonZeroU8;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rfbridge_core::Pin;
use rfbridge_core::constants::{BAUD_RATES, DEFAULT_BAUD_RATE, DEFAULT_RECEIVE_PIN, DEFAULT_SEND_PIN};
use rfbridge_emulator::{FirmwareHandle, MockFirmware};
use rfbridge_pulse::{FieldValue, ProtocolRegistry};
use rfbridge_session::{Session, SessionConfig};
use rfbridge_transport::{Transport, serial};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Port name selecting the built-in emulated bridge.
const EMULATOR_PORT: &str = "emulator";

/// Seconds between demo transmissions in emulated listen mode.
const DEMO_PERIOD: Duration = Duration::from_secs(5);

/// Talk to a 433MHz transceiver bridge over its serial port.
///
/// `listen` prints every decoded transmission; `send` encodes field
/// values and puts them on the air. The port name `emulator` targets a
/// built-in emulated bridge, useful for trying the tool without any
/// hardware attached.
#[derive(Parser, Debug)]
#[command(name = "rfbridge", version, about)]
struct Args {
    /// Serial port of the bridge, or `emulator`.
    port: String,

    /// GPIO pin wired to the receiver.
    #[arg(default_value_t = DEFAULT_RECEIVE_PIN)]
    receive_pin: u8,

    /// GPIO pin wired to the transmitter.
    #[arg(default_value_t = DEFAULT_SEND_PIN)]
    send_pin: u8,

    #[command(subcommand)]
    mode: Mode,

    /// Serial baud rate.
    #[arg(long, global = true, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Merge protocol definitions from a JSON catalog file.
    #[arg(long, global = true, value_name = "FILE")]
    protocols: Option<PathBuf>,

    /// Raise diagnostic verbosity to debug level.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Print decoded events until interrupted.
    Listen,
    /// Encode one message and transmit it.
    Send {
        /// Protocol id from the catalog.
        protocol: String,
        /// Field values as a JSON object, e.g. '{"code": 9}'.
        values: String,
        /// Number of transmissions.
        #[arg(long, default_value_t = 3)]
        repeat: u8,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let registry = catalog::registry(args.protocols.as_deref())?;
    let receive_pin = Pin::new(args.receive_pin).context("receive pin out of range")?;
    let send_pin = Pin::new(args.send_pin).context("send pin out of range")?;
    if !BAUD_RATES.contains(&args.baud) {
        bail!(
            "unsupported baud rate {} (supported: {BAUD_RATES:?})",
            args.baud
        );
    }

    if args.port == EMULATOR_PORT {
        info!("Using the built-in firmware emulator");
        let (port, device) = MockFirmware::spawn();
        drive(port, registry, receive_pin, send_pin, args.mode, Some(device)).await
    } else {
        let transport = serial::open(&args.port, args.baud)
            .with_context(|| format!("cannot open {}", args.port))?;
        drive(transport, registry, receive_pin, send_pin, args.mode, None).await
    }
}

/// Connect, configure both pins, run the selected mode, disconnect.
async fn drive<T>(
    transport: T,
    registry: Arc<ProtocolRegistry>,
    receive_pin: Pin,
    send_pin: Pin,
    mode: Mode,
    demo: Option<FirmwareHandle>,
) -> Result<()>
where
    T: Transport,
{
    let session = Session::connect(transport, Arc::clone(&registry), SessionConfig::default())
        .await
        .context("failed to connect to the bridge")?;
    session.configure_receive_pin(receive_pin).await?;
    session.configure_transmit_pin(send_pin).await?;
    info!(%receive_pin, %send_pin, "Connected");

    if let Some(device) = demo {
        if matches!(mode, Mode::Listen) {
            spawn_demo_feeder(device, Arc::clone(&registry));
        }
    }

    let result = match mode {
        Mode::Listen => listen(&session).await,
        Mode::Send {
            protocol,
            values,
            repeat,
        } => send(&session, &protocol, &values, repeat).await,
    };

    info!("Disconnecting");
    session.disconnect().await;
    result
}

/// Print decoded events until Ctrl-C or connection loss.
async fn listen(session: &Session) -> Result<()> {
    let mut events = session.subscribe();
    let mut states = session.state_changes();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    info!("Listening; press Ctrl-C to stop");
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    debug!(confidence = event.confidence, raw = %event.raw, "Event decoded");
                    println!("{} {}", event.protocol, serde_json::to_string(&event.values)?);
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Event stream lagged; some transmissions were dropped");
                }
                Err(RecvError::Closed) => bail!("event stream closed"),
            },
            state = states.wait_for(|state| state.is_terminal()) => {
                match state {
                    Ok(state) => {
                        let state = *state;
                        bail!("connection lost in state {state}");
                    }
                    Err(_) => bail!("connection lost"),
                }
            }
            result = &mut interrupt => {
                result.context("failed to install the Ctrl-C handler")?;
                info!("Interrupted");
                return Ok(());
            }
        }
    }
}

/// Encode one message and transmit it `repeat` times.
async fn send(session: &Session, protocol: &str, values: &str, repeat: u8) -> Result<()> {
    let values: BTreeMap<String, FieldValue> =
        serde_json::from_str(values).context("values must be a JSON object of field values")?;
    let repeat = NonZeroU8::new(repeat).context("repeat must be at least 1")?;

    session.send(protocol, &values, repeat).await?;
    info!(protocol, repeat = repeat.get(), "Transmitted");
    Ok(())
}

/// Feed the emulated bridge a changing demo transmission so listen mode
/// has something to show.
fn spawn_demo_feeder(device: FirmwareHandle, registry: Arc<ProtocolRegistry>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DEMO_PERIOD);
        for code in 0u64.. {
            ticker.tick().await;
            let values = BTreeMap::from([("code".to_string(), FieldValue::Number(code % 16))]);
            let train = match registry.encode(catalog::DEMO_PROTOCOL, &values) {
                Ok(train) => train,
                Err(error) => {
                    debug!(%error, "Demo encode failed");
                    return;
                }
            };
            if device.emit_event(&train).await.is_err() {
                return;
            }
        }
    });
}

fn init_tracing(debug: bool) {
    let default_directive = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
