//! Protocol catalog: built-in definitions plus JSON loading.
//!
//! The decode engine is protocol-agnostic; which device families exist is
//! data. The tool ships a small built-in set covering the template
//! features (single-pulse bits, PWM pairs, relative timing, enum fields)
//! and merges further definitions from a file given with `--protocols`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rfbridge_pulse::{DurationRange, ProtocolDefinition, ProtocolRegistry};
use tracing::info;

/// Protocol the demo feeder transmits with; always in the built-in set.
pub const DEMO_PROTOCOL: &str = "blinker";

/// Assemble the runtime registry: built-ins plus an optional catalog file.
pub fn registry(extra: Option<&Path>) -> Result<Arc<ProtocolRegistry>> {
    let registry = ProtocolRegistry::default();
    registry
        .register_all(builtin()?)
        .context("built-in catalog is invalid")?;

    if let Some(path) = extra {
        let definitions = load_file(path)?;
        info!(count = definitions.len(), path = %path.display(), "Loaded catalog file");
        registry.register_all(definitions).with_context(|| {
            format!("catalog file {} has invalid definitions", path.display())
        })?;
    }

    Ok(Arc::new(registry))
}

/// Read a JSON array of protocol definitions.
fn load_file(path: &Path) -> Result<Vec<ProtocolDefinition>> {
    let file = File::open(path)
        .with_context(|| format!("cannot open catalog file {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| {
        format!(
            "catalog file {} is not a JSON array of protocol definitions",
            path.display()
        )
    })
}

fn builtin() -> Result<Vec<ProtocolDefinition>> {
    Ok(vec![blinker()?, switch()?, doorbell()?])
}

/// Four-bit beacon, one pulse per bit. The simplest shape in the set and
/// the one the demo feeder uses.
fn blinker() -> rfbridge_pulse::Result<ProtocolDefinition> {
    let zero = DurationRange::with_tolerance(350, 20)?;
    let one = DurationRange::with_tolerance(1050, 20)?;

    let mut builder = ProtocolDefinition::builder("blinker")
        .bits(4)
        .sync(DurationRange::with_tolerance(3000, 20)?);
    for bit in 0..4 {
        builder = builder.bit(bit, zero, one);
    }
    builder
        .footer(DurationRange::with_tolerance(9000, 20)?)
        .field_unsigned("code", 0, 4)
        .build()
}

/// Self-learning socket switch: eight bits, each spread over a PWM pulse
/// pair (short-long is zero, long-short is one).
fn switch() -> rfbridge_pulse::Result<ProtocolDefinition> {
    let short = DurationRange::with_tolerance(280, 25)?;
    let long = DurationRange::with_tolerance(1270, 25)?;

    let mut builder = ProtocolDefinition::builder("switch")
        .bits(8)
        .sync(DurationRange::with_tolerance(2650, 25)?);
    for bit in 0..8 {
        builder = builder.bit(bit, short, long).bit(bit, long, short);
    }
    builder
        .footer(DurationRange::with_tolerance(10_000, 25)?)
        .field_unsigned("id", 0, 5)
        .field_unsigned("unit", 5, 2)
        .field_boolean("state", 7)
        .build()
}

/// Wireless chime with a drifting transmitter clock: timings scale with
/// the observed sync pulse, payload is sent least-significant bit first.
fn doorbell() -> rfbridge_pulse::Result<ProtocolDefinition> {
    let zero = DurationRange::with_tolerance(400, 20)?;
    let one = DurationRange::with_tolerance(800, 20)?;

    let mut builder = ProtocolDefinition::builder("doorbell")
        .bits(8)
        .sync(DurationRange::with_tolerance(5000, 15)?);
    for bit in 0..8 {
        builder = builder.bit(bit, zero, one);
    }
    builder
        .footer(DurationRange::with_tolerance(12_000, 15)?)
        .field_unsigned("id", 0, 6)
        .field_enum("chime", 6, 2, vec![("ding", 0), ("dong", 1), ("both", 2)])
        .lsb_first()
        .relative_timing()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfbridge_pulse::FieldValue;
    use std::collections::BTreeMap;

    #[test]
    fn test_builtins_register() {
        let registry = registry(None).unwrap();

        assert!(registry.get(DEMO_PROTOCOL).is_some());
        assert!(registry.get("switch").is_some());
        assert!(registry.get("doorbell").is_some());
    }

    #[test]
    fn test_demo_protocol_round_trips() {
        let registry = registry(None).unwrap();
        let values = BTreeMap::from([("code".to_string(), FieldValue::Number(11))]);

        let train = registry.encode(DEMO_PROTOCOL, &values).unwrap();
        let events = registry.decode_all(&train);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].protocol, DEMO_PROTOCOL);
        assert_eq!(events[0].values, values);
    }

    #[test]
    fn test_switch_round_trips_through_pwm_pairs() {
        let registry = registry(None).unwrap();
        let values = BTreeMap::from([
            ("id".to_string(), FieldValue::Number(21)),
            ("unit".to_string(), FieldValue::Number(2)),
            ("state".to_string(), FieldValue::Flag(true)),
        ]);

        let train = registry.encode("switch", &values).unwrap();
        let events = registry.decode_all(&train);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].protocol, "switch");
        assert_eq!(events[0].values, values);
    }

    #[test]
    fn test_catalog_file_merges_with_builtins() {
        let garage = ProtocolDefinition::builder("garage")
            .bits(2)
            .sync(DurationRange::with_tolerance(4000, 10).unwrap())
            .bit(
                0,
                DurationRange::with_tolerance(300, 10).unwrap(),
                DurationRange::with_tolerance(900, 10).unwrap(),
            )
            .bit(
                1,
                DurationRange::with_tolerance(300, 10).unwrap(),
                DurationRange::with_tolerance(900, 10).unwrap(),
            )
            .field_unsigned("button", 0, 2)
            .build()
            .unwrap();
        let path = std::env::temp_dir().join(format!(
            "rfbridge-catalog-test-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, serde_json::to_string(&vec![garage]).unwrap()).unwrap();

        let registry = registry(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(registry.get("garage").is_some());
        assert!(registry.get(DEMO_PROTOCOL).is_some());
    }

    #[test]
    fn test_catalog_file_redefining_builtin_rejected() {
        let clash = blinker().unwrap();
        let path = std::env::temp_dir().join(format!(
            "rfbridge-catalog-clash-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, serde_json::to_string(&vec![clash]).unwrap()).unwrap();

        let result = registry(Some(&path));
        std::fs::remove_file(&path).unwrap();

        assert!(result.is_err());
    }

    #[test]
    fn test_missing_catalog_file_reported() {
        let result = registry(Some(Path::new("/nonexistent/catalog.json")));

        assert!(result.is_err());
    }
}
