//! Integration tests for the session controller.
//!
//! Each test scripts the device side of a [`MockSerial`] pipe by hand:
//! reading the exact command lines the session writes and answering with
//! handshake, result, echo or RF report lines. Timeout scenarios run on
//! the paused Tokio clock.

mod common;

use std::num::NonZeroU8;
use std::sync::Arc;

use rfbridge_core::Pin;
use rfbridge_pulse::{FieldValue, ProtocolRegistry};
use rfbridge_session::{ConnectionState, Error, Session, SessionConfig, TransactionError};
use rfbridge_transport::MockSerial;

/// Connect answers the reset with `ready` and the session reports it.
#[tokio::test]
async fn test_connect_performs_handshake() {
    let (session, _device) = common::connect_ready(common::registry()).await;

    assert!(session.is_ready());
    assert_eq!(session.state(), ConnectionState::Ready);
}

/// A mute device never sends `ready`; connect fails with the handshake
/// timeout instead of hanging.
#[tokio::test(start_paused = true)]
async fn test_connect_times_out_without_handshake() {
    let (transport, mut device) = MockSerial::new();

    let (result, _device) = tokio::join!(
        Session::connect(transport, common::registry(), SessionConfig::default()),
        async move {
            common::expect_line(&mut device, "RESET").await;
            // Keep the handle alive but never answer.
            device
        }
    );

    assert!(matches!(result, Err(Error::HandshakeTimeout { .. })));
}

/// Pin configuration puts the exact `PIN` lines on the wire, in call order.
#[tokio::test]
async fn test_configure_pins() {
    let (session, mut device) = common::connect_ready(common::registry()).await;

    let configurer = session.clone();
    let configure = tokio::spawn(async move {
        configurer
            .configure_receive_pin(Pin::new(2).unwrap())
            .await?;
        configurer
            .configure_transmit_pin(Pin::new(4).unwrap())
            .await
    });

    common::ok_exchange(&mut device, "PIN receive 2").await;
    common::ok_exchange(&mut device, "PIN transmit 4").await;

    configure.await.unwrap().unwrap();
    assert!(session.is_ready());
}

/// `send` with repeat 3 puts exactly three identical transmit commands on
/// the wire, each as its own awaited transaction.
#[tokio::test]
async fn test_send_repeats_transmissions() {
    let registry = common::registry();
    let train = registry.encode("blinker", &common::code_values(0b1010)).unwrap();
    let send_line = format!("SEND {train}");

    let (session, mut device) = common::connect_ready(registry).await;

    let sender = session.clone();
    let send = tokio::spawn(async move {
        sender
            .send("blinker", &common::code_values(0b1010), NonZeroU8::new(3).unwrap())
            .await
    });

    for _ in 0..3 {
        common::ok_exchange(&mut device, &send_line).await;
    }
    send.await.unwrap().unwrap();

    // The next thing on the wire is the ping, not a fourth SEND.
    let pinger = session.clone();
    let ping = tokio::spawn(async move { pinger.ping().await });
    let line = common::expect_prefixed(&mut device, "PING ").await;
    let token = line.strip_prefix("PING ").unwrap().to_string();
    device.send_line(&format!("RES OK {token}")).await.unwrap();
    assert!(ping.await.unwrap().unwrap());
}

/// An encode failure reports synchronously and nothing reaches the wire.
#[tokio::test]
async fn test_send_unknown_protocol_touches_nothing() {
    let (session, mut device) = common::connect_ready(common::registry()).await;

    let error = session
        .send("doorbell", &common::code_values(1), NonZeroU8::new(3).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Encode(_)));

    // First line after the failed send is this ping.
    let pinger = session.clone();
    let ping = tokio::spawn(async move { pinger.ping().await });
    let line = common::expect_prefixed(&mut device, "PING ").await;
    let token = line.strip_prefix("PING ").unwrap().to_string();
    device.send_line(&format!("RES OK {token}")).await.unwrap();
    assert!(ping.await.unwrap().unwrap());
}

/// An error result resolves the transaction with the rejection payload
/// and the session stays usable.
#[tokio::test]
async fn test_rejected_command_reports_payload() {
    let (session, mut device) = common::connect_ready(common::registry()).await;

    let configurer = session.clone();
    let configure =
        tokio::spawn(async move { configurer.configure_receive_pin(Pin::new(9).unwrap()).await });

    common::expect_line(&mut device, "PIN receive 9").await;
    device.send_line("RES ERROR invalid pin").await.unwrap();

    match configure.await.unwrap().unwrap_err() {
        Error::ConfigurationFailed {
            source: TransactionError::Rejected { payload },
            ..
        } => assert_eq!(payload.as_deref(), Some("invalid pin")),
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert!(session.is_ready());
}

/// A command that never gets a result times out without poisoning the
/// session; the next command completes normally.
#[tokio::test(start_paused = true)]
async fn test_response_timeout_leaves_session_usable() {
    let (session, mut device) = common::connect_ready(common::registry()).await;

    let pinger = session.clone();
    let ping = tokio::spawn(async move { pinger.ping().await });

    // Swallow the command; the deadline resolves it.
    common::expect_prefixed(&mut device, "PING ").await;
    let error = ping.await.unwrap().unwrap_err();
    assert!(matches!(
        error,
        Error::PingFailed {
            source: TransactionError::Timeout { .. }
        }
    ));
    assert!(session.is_ready());

    let pinger = session.clone();
    let ping = tokio::spawn(async move { pinger.ping().await });
    let line = common::expect_prefixed(&mut device, "PING ").await;
    let token = line.strip_prefix("PING ").unwrap().to_string();
    device.send_line(&format!("RES OK {token}")).await.unwrap();
    assert!(ping.await.unwrap().unwrap());
}

/// A ping that answers with a foreign payload reports false, not an error.
#[tokio::test]
async fn test_ping_detects_wrong_token() {
    let (session, mut device) = common::connect_ready(common::registry()).await;

    let pinger = session.clone();
    let ping = tokio::spawn(async move { pinger.ping().await });

    common::expect_prefixed(&mut device, "PING ").await;
    device.send_line("RES OK somebody-else").await.unwrap();

    assert!(!ping.await.unwrap().unwrap());
    assert!(session.is_ready());
}

/// RF reports decode against the registry and reach subscribers; noise
/// lines and unmatched trains produce nothing.
#[tokio::test]
async fn test_events_reach_subscribers() {
    let registry = common::registry();
    let train = registry.encode("blinker", &common::code_values(0b0110)).unwrap();

    let (session, mut device) = common::connect_ready(registry).await;
    let mut events = session.subscribe();

    device.send_line("spurious boot banner").await.unwrap();
    device.send_line("RF 100,-200,300").await.unwrap();
    device.send_line(&format!("RF {train}")).await.unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(event.protocol, "blinker");
    assert_eq!(event.values.get("code"), Some(&FieldValue::Number(0b0110)));
    assert_eq!(event.raw, train);
    assert_eq!(event.confidence, 1.0);
}

/// A train matching two registered protocols yields consecutive events
/// in registration order.
#[tokio::test]
async fn test_multi_match_delivers_in_registration_order() {
    let registry = ProtocolRegistry::default();
    registry.register(common::blinker()).unwrap();
    registry.register(common::blinker_named("clone")).unwrap();
    let registry = Arc::new(registry);
    let train = registry.encode("blinker", &common::code_values(0b0011)).unwrap();

    let (session, mut device) = common::connect_ready(registry).await;
    let mut events = session.subscribe();

    device.send_line(&format!("RF {train}")).await.unwrap();

    assert_eq!(events.recv().await.unwrap().protocol, "blinker");
    assert_eq!(events.recv().await.unwrap().protocol, "clone");
}

/// An RF report arriving between a command and its result reaches
/// subscribers without disturbing the transaction.
#[tokio::test]
async fn test_event_between_command_and_result() {
    let registry = common::registry();
    let train = registry.encode("blinker", &common::code_values(0b1111)).unwrap();

    let (session, mut device) = common::connect_ready(registry).await;
    let mut events = session.subscribe();

    let pinger = session.clone();
    let ping = tokio::spawn(async move { pinger.ping().await });

    let line = common::expect_prefixed(&mut device, "PING ").await;
    let token = line.strip_prefix("PING ").unwrap().to_string();
    device.send_line(&format!("RF {train}")).await.unwrap();
    device.send_line(&format!("RES OK {token}")).await.unwrap();

    assert!(ping.await.unwrap().unwrap());
    assert_eq!(events.recv().await.unwrap().protocol, "blinker");
}

/// The firmware's echo of the command is consumed as an acknowledgement,
/// not mistaken for noise or a result.
#[tokio::test]
async fn test_command_echo_is_tolerated() {
    let (session, mut device) = common::connect_ready(common::registry()).await;

    let configurer = session.clone();
    let configure =
        tokio::spawn(async move { configurer.configure_receive_pin(Pin::new(2).unwrap()).await });

    common::expect_line(&mut device, "PIN receive 2").await;
    device.send_line("ECHO PIN receive 2").await.unwrap();
    device.send_line("RES OK").await.unwrap();

    configure.await.unwrap().unwrap();
}

/// Two tasks sending concurrently never interleave their command bytes;
/// every wire line is one complete transmit command.
#[tokio::test]
async fn test_concurrent_sends_serialize() {
    let registry = common::registry();
    let train_a = registry.encode("blinker", &common::code_values(0b0001)).unwrap();
    let train_b = registry.encode("blinker", &common::code_values(0b1110)).unwrap();
    let line_a = format!("SEND {train_a}");
    let line_b = format!("SEND {train_b}");

    let (session, mut device) = common::connect_ready(registry).await;

    let sender = session.clone();
    let send_a = tokio::spawn(async move {
        sender
            .send("blinker", &common::code_values(0b0001), NonZeroU8::new(2).unwrap())
            .await
    });
    let sender = session.clone();
    let send_b = tokio::spawn(async move {
        sender
            .send("blinker", &common::code_values(0b1110), NonZeroU8::new(2).unwrap())
            .await
    });

    let mut seen_a = 0;
    let mut seen_b = 0;
    for _ in 0..4 {
        let line = device.read_line().await.unwrap().unwrap();
        if line == line_a {
            seen_a += 1;
        } else if line == line_b {
            seen_b += 1;
        } else {
            panic!("interleaved or malformed wire line: '{line}'");
        }
        device.send_line("RES OK").await.unwrap();
    }

    assert_eq!(seen_a, 2);
    assert_eq!(seen_b, 2);
    send_a.await.unwrap().unwrap();
    send_b.await.unwrap().unwrap();
}

/// Disconnecting while a transaction is in flight resolves it as
/// cancelled promptly, without waiting out its deadline.
#[tokio::test]
async fn test_disconnect_cancels_pending_transaction() {
    let (session, mut device) = common::connect_ready(common::registry()).await;

    let pinger = session.clone();
    let ping = tokio::spawn(async move { pinger.ping().await });

    // The device saw the command, so the transaction is in flight.
    common::expect_prefixed(&mut device, "PING ").await;
    session.disconnect().await;

    let error = ping.await.unwrap().unwrap_err();
    assert!(matches!(
        error,
        Error::PingFailed {
            source: TransactionError::Cancelled
        }
    ));
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

/// Commands after disconnect fail fast with the state they found.
#[tokio::test]
async fn test_commands_after_disconnect_report_not_ready() {
    let (session, _device) = common::connect_ready(common::registry()).await;

    session.disconnect().await;

    let error = session.ping().await.unwrap_err();
    assert!(matches!(
        error,
        Error::NotReady {
            state: ConnectionState::Disconnected
        }
    ));
}

/// The device dropping the link fails the in-flight transaction and
/// parks the session in the error state.
#[tokio::test]
async fn test_transport_loss_fails_pending_transaction() {
    let (session, mut device) = common::connect_ready(common::registry()).await;

    let pinger = session.clone();
    let ping = tokio::spawn(async move { pinger.ping().await });

    common::expect_prefixed(&mut device, "PING ").await;
    device.close().await.unwrap();

    let error = ping.await.unwrap().unwrap_err();
    assert!(matches!(
        error,
        Error::PingFailed {
            source: TransactionError::Disconnected
        }
    ));

    let mut states = session.state_changes();
    let state = *states.wait_for(|state| state.is_terminal()).await.unwrap();
    assert_eq!(state, ConnectionState::Error);
}

/// State changes are observable through the watch in order.
#[tokio::test]
async fn test_state_changes_are_published() {
    let (session, _device) = common::connect_ready(common::registry()).await;
    let mut states = session.state_changes();

    assert_eq!(*states.borrow(), ConnectionState::Ready);

    session.disconnect().await;
    let state = *states.wait_for(|state| state.is_terminal()).await.unwrap();
    assert_eq!(state, ConnectionState::Disconnected);
}
