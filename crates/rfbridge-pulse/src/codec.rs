//! Matching pulse trains against protocol definitions and rendering field
//! values back into trains.
//!
//! Decode is deliberately forgiving about the front of a train: receivers
//! wake up mid-transmission, so any pulses before the aligned template are
//! ignored. It is strict about everything after alignment. One pulse
//! outside its window, one bit slot matching neither window, or two slots
//! disagreeing about the same bit all abort the match. A failed match is
//! `None`, never an error; trains that match nothing are everyday noise.

use crate::definition::{BitOrder, FieldDef, FieldKind, ProtocolDefinition, Slot, TimingMode};
use crate::error::{Error, Result};
use crate::event::ProtocolEvent;
use crate::field::FieldValue;
use rfbridge_core::PulseTrain;
use std::collections::BTreeMap;

/// Floor for reported confidence. A match that scrapes every window edge
/// still reports a nonzero score so consumers can rank it.
pub const MIN_CONFIDENCE: f64 = 0.01;

/// Try to decode a train as one protocol.
///
/// Returns `None` when the train does not carry this protocol.
#[must_use]
pub fn decode(definition: &ProtocolDefinition, train: &PulseTrain) -> Option<ProtocolEvent> {
    let template = definition.template();
    if train.len() < template.len() {
        return None;
    }
    // The template is anchored to the end of the train. Anything before
    // the anchor is burn-in from a transmission already in progress.
    let offset = train.len() - template.len();

    let factor = timing_factor(definition, train, offset)?;

    let mut bits: Vec<Option<bool>> = vec![None; definition.bit_length()];
    let mut worst_deviation: f64 = 0.0;

    for (i, slot) in template.iter().enumerate() {
        let observed = f64::from(train.magnitude(offset + i));
        match slot {
            Slot::Sync { range } => {
                // Sync is always judged on the raw duration. Under
                // relative timing it is the reference the factor came
                // from, so scaling it would make it trivially perfect.
                if !range.contains(observed) {
                    return None;
                }
                worst_deviation = worst_deviation.max(range.deviation(observed));
            }
            Slot::Separator { range } | Slot::Footer { range } => {
                let scaled = observed / factor;
                if !range.contains(scaled) {
                    return None;
                }
                worst_deviation = worst_deviation.max(range.deviation(scaled));
            }
            Slot::Bit { bit, zero, one } => {
                let scaled = observed / factor;
                let value = if zero.contains(scaled) {
                    worst_deviation = worst_deviation.max(zero.deviation(scaled));
                    false
                } else if one.contains(scaled) {
                    worst_deviation = worst_deviation.max(one.deviation(scaled));
                    true
                } else {
                    return None;
                };
                match bits[*bit] {
                    None => bits[*bit] = Some(value),
                    Some(previous) if previous != value => return None,
                    Some(_) => {}
                }
            }
        }
    }

    let mut values = BTreeMap::new();
    for field in definition.fields() {
        let raw = assemble(&bits, field, definition.bit_order());
        values.insert(field.name.clone(), field_value(field, raw)?);
    }

    Some(ProtocolEvent {
        protocol: definition.id().to_string(),
        values,
        raw: train.clone(),
        confidence: (1.0 - worst_deviation).max(MIN_CONFIDENCE),
    })
}

/// Render field values as the pulse train a transmitter should replay.
///
/// Every declared field must be supplied and no undeclared name accepted;
/// a silently dropped key would transmit a different command than the
/// caller asked for. Durations are the nominal values of each slot, with
/// alternating sign starting high.
///
/// # Errors
/// Returns `Error::MissingField`, `Error::UnknownField` or
/// `Error::InvalidFieldValue` for a bad value map.
pub fn encode(definition: &ProtocolDefinition, values: &BTreeMap<String, FieldValue>) -> Result<PulseTrain> {
    for name in values.keys() {
        if !definition.has_field(name) {
            return Err(Error::UnknownField {
                protocol: definition.id().to_string(),
                field: name.clone(),
            });
        }
    }

    let mut bits = vec![false; definition.bit_length()];
    for field in definition.fields() {
        let value = values.get(&field.name).ok_or_else(|| Error::MissingField {
            protocol: definition.id().to_string(),
            field: field.name.clone(),
        })?;
        let raw = field_pattern(definition, field, value)?;
        scatter(&mut bits, field, raw, definition.bit_order());
    }

    let durations: Vec<i32> = definition
        .template()
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            let nominal = match slot {
                Slot::Sync { range } | Slot::Separator { range } | Slot::Footer { range } => {
                    range.nominal()
                }
                Slot::Bit { bit, zero, one } => {
                    if bits[*bit] { one.nominal() } else { zero.nominal() }
                }
            };
            let magnitude = nominal as i32;
            if i % 2 == 0 { magnitude } else { -magnitude }
        })
        .collect();

    PulseTrain::new(durations)
        .map_err(|e| Error::invalid_definition(definition.id(), e.to_string()))
}

/// Scale factor applied to observed durations before window checks.
fn timing_factor(definition: &ProtocolDefinition, train: &PulseTrain, offset: usize) -> Option<f64> {
    match definition.timing() {
        TimingMode::Absolute => Some(1.0),
        TimingMode::RelativeToSync => {
            // Guaranteed present by definition validation.
            let (index, range) = definition.first_sync()?;
            let observed = f64::from(train.magnitude(offset + index));
            if !range.contains(observed) {
                return None;
            }
            Some(observed / f64::from(range.nominal()))
        }
    }
}

/// Pack a field's bit range into an integer.
fn assemble(bits: &[Option<bool>], field: &FieldDef, order: BitOrder) -> u64 {
    let mut raw = 0u64;
    for i in 0..field.width {
        let bit = bits[field.offset + i].unwrap_or(false);
        match order {
            BitOrder::MsbFirst => {
                raw = (raw << 1) | u64::from(bit);
            }
            BitOrder::LsbFirst => {
                if bit {
                    raw |= 1 << i;
                }
            }
        }
    }
    raw
}

/// Spread an integer over a field's bit range.
fn scatter(bits: &mut [bool], field: &FieldDef, raw: u64, order: BitOrder) {
    for i in 0..field.width {
        let shift = match order {
            BitOrder::MsbFirst => field.width - 1 - i,
            BitOrder::LsbFirst => i,
        };
        bits[field.offset + i] = (raw >> shift) & 1 == 1;
    }
}

/// Interpret an assembled bit pattern as the field's value.
///
/// Returns `None` for an enum pattern that names no variant; the whole
/// match is abandoned in that case.
fn field_value(field: &FieldDef, raw: u64) -> Option<FieldValue> {
    match &field.kind {
        FieldKind::Unsigned => Some(FieldValue::Number(raw)),
        FieldKind::Boolean => Some(FieldValue::Flag(raw == 1)),
        FieldKind::Enum { variants } => variants
            .iter()
            .find(|v| v.pattern == raw)
            .map(|v| FieldValue::Symbol(v.symbol.clone())),
    }
}

/// Turn a caller-supplied value into the field's bit pattern.
fn field_pattern(definition: &ProtocolDefinition, field: &FieldDef, value: &FieldValue) -> Result<u64> {
    match (&field.kind, value) {
        (FieldKind::Boolean, FieldValue::Flag(v)) => Ok(u64::from(*v)),
        (FieldKind::Unsigned, FieldValue::Number(v)) => {
            let limit = if field.width == 64 {
                u64::MAX
            } else {
                (1u64 << field.width) - 1
            };
            if *v > limit {
                return Err(Error::invalid_value(
                    definition.id(),
                    &field.name,
                    format!("{v} does not fit {} bits", field.width),
                ));
            }
            Ok(*v)
        }
        (FieldKind::Enum { variants }, FieldValue::Symbol(symbol)) => variants
            .iter()
            .find(|v| &v.symbol == symbol)
            .map(|v| v.pattern)
            .ok_or_else(|| {
                Error::invalid_value(
                    definition.id(),
                    &field.name,
                    format!("unknown symbol '{symbol}'"),
                )
            }),
        (_, value) => Err(Error::invalid_value(
            definition.id(),
            &field.name,
            format!("'{value}' has the wrong type for this field"),
        )),
    }
}
