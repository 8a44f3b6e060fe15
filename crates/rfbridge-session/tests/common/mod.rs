//! Shared fixtures for session integration tests.
//!
//! Tests drive the host side through a real [`Session`] and script the
//! device side by hand on the far end of a [`MockSerial`] pipe, so every
//! byte the session puts on the wire is asserted literally.

use std::collections::BTreeMap;
use std::sync::Arc;

use rfbridge_pulse::{DurationRange, FieldValue, ProtocolDefinition, ProtocolRegistry};
use rfbridge_session::{Session, SessionConfig};
use rfbridge_transport::{MockSerial, MockSerialHandle};

/// A compact four-bit demo protocol: sync, four data pulses, footer.
pub fn blinker() -> ProtocolDefinition {
    blinker_named("blinker")
}

/// The same pulse shape under a different id, for multi-match scenarios.
pub fn blinker_named(id: &str) -> ProtocolDefinition {
    let zero = DurationRange::new(280, 350, 420).expect("Test helper: zero range is valid");
    let one = DurationRange::new(840, 1050, 1260).expect("Test helper: one range is valid");

    let mut builder = ProtocolDefinition::builder(id)
        .bits(4)
        .sync(DurationRange::new(2400, 3000, 3600).expect("Test helper: sync range is valid"));
    for bit in 0..4 {
        builder = builder.bit(bit, zero, one);
    }
    builder
        .footer(DurationRange::new(7200, 9000, 10800).expect("Test helper: footer range is valid"))
        .field_unsigned("code", 0, 4)
        .build()
        .expect("Test helper: blinker definition is valid")
}

/// A registry holding just the blinker protocol.
pub fn registry() -> Arc<ProtocolRegistry> {
    let registry = ProtocolRegistry::default();
    registry
        .register(blinker())
        .expect("Test helper: blinker registers");
    Arc::new(registry)
}

/// Field values carrying a four-bit blinker code.
pub fn code_values(code: u64) -> BTreeMap<String, FieldValue> {
    BTreeMap::from([("code".to_string(), FieldValue::Number(code))])
}

/// Connect a session against a scripted device that answers the reset
/// with the handshake line. Returns the ready session and the device
/// handle for further scripting.
pub async fn connect_ready(registry: Arc<ProtocolRegistry>) -> (Session, MockSerialHandle) {
    let (transport, mut device) = MockSerial::new();

    let (session, device) = tokio::join!(
        Session::connect(transport, registry, SessionConfig::default()),
        async move {
            expect_line(&mut device, "RESET").await;
            device
                .send_line("ready")
                .await
                .expect("Test helper: handshake write succeeds");
            device
        }
    );

    (
        session.expect("Test helper: connect succeeds"),
        device,
    )
}

/// Read one line on the device side and assert its exact text.
pub async fn expect_line(device: &mut MockSerialHandle, expected: &str) {
    let line = device
        .read_line()
        .await
        .expect("Test helper: device read succeeds")
        .expect("Test helper: line arrives before EOF");
    assert_eq!(line, expected);
}

/// Read one line on the device side, assert its prefix, return the line.
pub async fn expect_prefixed(device: &mut MockSerialHandle, prefix: &str) -> String {
    let line = device
        .read_line()
        .await
        .expect("Test helper: device read succeeds")
        .expect("Test helper: line arrives before EOF");
    assert!(
        line.starts_with(prefix),
        "expected a line starting with '{prefix}', got '{line}'"
    );
    line
}

/// Assert the next command line and answer it with a bare `RES OK`.
pub async fn ok_exchange(device: &mut MockSerialHandle, expected: &str) {
    expect_line(device, expected).await;
    device
        .send_line("RES OK")
        .await
        .expect("Test helper: result write succeeds");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blinker_shape() {
        let definition = blinker();
        assert_eq!(definition.template().len(), 6);
        assert_eq!(definition.bit_length(), 4);
        assert!(definition.has_field("code"));
    }

    #[test]
    fn test_blinker_encodes() {
        let registry = registry();
        let train = registry
            .encode("blinker", &code_values(0b1010))
            .expect("four-bit codes encode");
        assert_eq!(train.len(), 6);
    }
}
