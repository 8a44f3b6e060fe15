//! Real serial port transport.

use crate::error::{Error, Result};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

/// Open a serial port at the given baud rate, configured 8N1 without flow
/// control, the framing the transceiver firmware expects.
///
/// # Errors
///
/// Returns `Error::Open` when the device node cannot be opened or
/// configured.
pub fn open(port: &str, baud_rate: u32) -> Result<SerialStream> {
    #[allow(unused_mut)]
    let mut stream = tokio_serial::new(port, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|source| Error::open(port, source))?;

    // Without this, a second open of the same device fails on Linux even
    // after the first handle is dropped.
    #[cfg(unix)]
    stream
        .set_exclusive(false)
        .map_err(|source| Error::open(port, source))?;

    Ok(stream)
}
