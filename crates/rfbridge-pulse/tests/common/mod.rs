//! Common test utilities for pulse codec integration tests.
//!
//! Provides two realistic protocol fixtures and helpers for mangling
//! trains the way real receivers do:
//!
//! 1. **Fixture builders** (`doorbell`, `switch`) - Definitions modeled on
//!    common 433MHz devices, one relative-timed PWM doorbell and one
//!    absolute-timed 32-bit self-learning switch
//! 2. **Train helpers** (`jitter`, `with_leading_noise`) - Simulate
//!    transmitter clock drift and receiver wake-up garbage
//!
//! The fixtures intentionally use two pulses per bit so the shared-bit
//! agreement rule is exercised by every decode.

use rfbridge_core::PulseTrain;
use rfbridge_pulse::{DurationRange, FieldValue, ProtocolDefinition};
use std::collections::BTreeMap;

/// Eight-bit PWM doorbell with relative timing.
///
/// Template: sync, separator, 8 bits of two inverted PWM pulses each,
/// footer. The single `code` field carries the button identity. The sync
/// window is wide while the bit windows are tight; decoding drifted
/// transmitters depends on the sync-derived scale factor.
pub fn doorbell() -> ProtocolDefinition {
    let sync = DurationRange::new(250, 350, 450).expect("fixture range");
    let short = DurationRange::new(300, 350, 400).expect("fixture range");
    let long = DurationRange::new(900, 1050, 1200).expect("fixture range");
    let gap = DurationRange::new(9300, 10850, 12400).expect("fixture range");

    let mut builder = ProtocolDefinition::builder("doorbell")
        .bits(8)
        .sync(sync)
        .separator(gap);
    for bit in 0..8 {
        builder = builder.bit(bit, short, long).bit(bit, long, short);
    }
    builder
        .footer(gap)
        .field_unsigned("code", 0, 8)
        .relative_timing()
        .build()
        .expect("fixture definition must validate")
}

/// 32-bit self-learning switch with absolute timing.
///
/// Template: sync, 32 bits of two inverted pulses each, footer. Fields
/// follow the usual self-learning layout: 26-bit transmitter id, group
/// flag, state flag, 4-bit unit.
pub fn switch() -> ProtocolDefinition {
    switch_named("switch")
}

/// The `switch` template registered under a different id, for tests that
/// need two protocols sharing identical timings.
pub fn switch_named(id: &str) -> ProtocolDefinition {
    let short = DurationRange::new(270, 320, 370).expect("fixture range");
    let long = DurationRange::new(810, 960, 1110).expect("fixture range");
    let footer = DurationRange::new(8400, 9920, 11400).expect("fixture range");

    let mut builder = ProtocolDefinition::builder(id).bits(32).sync(short);
    for bit in 0..32 {
        builder = builder.bit(bit, short, long).bit(bit, long, short);
    }
    builder
        .footer(footer)
        .field_unsigned("id", 0, 26)
        .field_boolean("all", 26)
        .field_boolean("state", 27)
        .field_unsigned("unit", 28, 4)
        .build()
        .expect("fixture definition must validate")
}

/// Build a value map for the `switch` fixture.
pub fn switch_values(id: u64, all: bool, state: bool, unit: u64) -> BTreeMap<String, FieldValue> {
    let mut values = BTreeMap::new();
    values.insert("id".to_string(), FieldValue::Number(id));
    values.insert("all".to_string(), FieldValue::Flag(all));
    values.insert("state".to_string(), FieldValue::Flag(state));
    values.insert("unit".to_string(), FieldValue::Number(unit));
    values
}

/// Build a value map for the `doorbell` fixture.
pub fn doorbell_values(code: u64) -> BTreeMap<String, FieldValue> {
    let mut values = BTreeMap::new();
    values.insert("code".to_string(), FieldValue::Number(code));
    values
}

/// Scale every duration by `factor`, simulating transmitter clock drift.
///
/// # Panics
///
/// Panics if scaling produces an implausible train.
pub fn jitter(train: &PulseTrain, factor: f64) -> PulseTrain {
    let scaled: Vec<i32> = train
        .durations()
        .iter()
        .map(|&d| (f64::from(d) * factor).round() as i32)
        .collect();
    PulseTrain::new(scaled).expect("Test helper: jittered train out of bounds")
}

/// Prepend garbage pulses, simulating a receiver waking mid-transmission.
///
/// # Panics
///
/// Panics if the combined train is too long to be plausible.
pub fn with_leading_noise(train: &PulseTrain, noise: &[i32]) -> PulseTrain {
    let mut pulses = noise.to_vec();
    pulses.extend_from_slice(train.durations());
    PulseTrain::new(pulses).expect("Test helper: noisy train out of bounds")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_shapes() {
        assert_eq!(doorbell().template().len(), 19);
        assert_eq!(switch().template().len(), 66);
    }

    #[test]
    fn test_jitter_scales() {
        let train = PulseTrain::new(vec![100, -200]).unwrap();
        assert_eq!(jitter(&train, 1.5).durations(), &[150, -300]);
    }

    #[test]
    fn test_with_leading_noise_prepends() {
        let train = PulseTrain::new(vec![100, -200]).unwrap();
        let noisy = with_leading_noise(&train, &[5, -7]);
        assert_eq!(noisy.durations(), &[5, -7, 100, -200]);
    }
}
