//! Pulse-train codec for 433MHz remote protocols.
//!
//! A protocol is described declaratively as a template of timed slots
//! plus a field layout ([`ProtocolDefinition`]), built in code through
//! [`ProtocolBuilder`] or loaded from a serialized catalog. The codec
//! turns received trains into [`ProtocolEvent`]s and field values back
//! into transmit-ready trains; a [`ProtocolRegistry`] fans one train out
//! across every known protocol.
//!
//! Nothing here touches the serial link. The codec is pure so it can be
//! tested and benchmarked without hardware.

pub mod codec;
pub mod definition;
pub mod error;
pub mod event;
pub mod field;
pub mod registry;

pub use codec::{decode, encode, MIN_CONFIDENCE};
pub use definition::{
    BitOrder, DurationRange, EnumVariant, FieldDef, FieldKind, ProtocolBuilder,
    ProtocolDefinition, Slot, TimingMode,
};
pub use error::{Error, Result};
pub use event::ProtocolEvent;
pub use field::FieldValue;
pub use registry::ProtocolRegistry;
