//! Core constants shared across the rfbridge workspace.
//!
//! These values describe the fixed firmware contract (serial line settings,
//! pin addressing, pulse buffer capacity) and are referenced by the codec,
//! the session controller and the CLI. Changing them breaks compatibility
//! with deployed bridge firmware.

// ============================================================================
// Serial Line Settings
// ============================================================================

/// Baud rate the bridge firmware is flashed with by default.
///
/// # Examples
///
/// ```
/// use rfbridge_core::constants::DEFAULT_BAUD_RATE;
///
/// assert_eq!(DEFAULT_BAUD_RATE, 115_200);
/// ```
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Baud rates supported by known firmware builds.
///
/// Older boards with 8 MHz clocks run at 57600; everything newer runs at
/// 115200. The CLI validates user-supplied rates against this list.
pub const BAUD_RATES: [u32; 2] = [57_600, 115_200];

// ============================================================================
// Pin Addressing
// ============================================================================

/// Lowest assignable digital pin.
///
/// Pins 0 and 1 carry the serial link to the host and can never be handed
/// to the receiver or transmitter.
pub const MIN_PIN: u8 = 2;

/// Highest assignable digital pin on supported boards.
pub const MAX_PIN: u8 = 13;

/// Default pin wired to the 433MHz receiver's data line.
///
/// Pin 2 is the first external-interrupt-capable pin on supported boards,
/// which the firmware requires for edge-timestamping received pulses.
pub const DEFAULT_RECEIVE_PIN: u8 = 2;

/// Default pin wired to the 433MHz transmitter's data line.
pub const DEFAULT_SEND_PIN: u8 = 4;

// ============================================================================
// Pulse Train Limits
// ============================================================================

/// Maximum number of pulses in one train.
///
/// Matches the firmware's capture buffer; trains longer than this can never
/// come off the wire and are rejected host-side before encoding.
///
/// # Examples
///
/// ```
/// use rfbridge_core::constants::MAX_TRAIN_PULSES;
///
/// assert!(MAX_TRAIN_PULSES >= 256);
/// ```
pub const MAX_TRAIN_PULSES: usize = 512;

/// Maximum magnitude of a single pulse duration, in microseconds.
///
/// One second of continuous carrier is not a pulse; the firmware splits
/// anything longer into separate bursts. Used as a plausibility bound when
/// validating trains.
pub const MAX_PULSE_MICROS: i32 = 1_000_000;
