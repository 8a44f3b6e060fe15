//! In-process firmware emulator for tests and demos.
//!
//! The real system needs a microcontroller flashed with the transceiver
//! firmware on the far end of a serial cable. This crate replaces both
//! with a task: [`MockFirmware`] speaks the device side of the line
//! protocol over a [`MockSerial`](rfbridge_transport::MockSerial) link,
//! and [`FirmwareHandle`] scripts what the "hardware" receives and reads
//! back what it was told to transmit. The end-to-end tests run a full
//! session against it; the CLI uses it as a demo port when no bridge is
//! plugged in.

pub mod firmware;

pub use firmware::{FirmwareConfig, FirmwareHandle, MockFirmware};
