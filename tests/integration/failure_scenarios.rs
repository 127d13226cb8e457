//! Startup and broker failures

use std::io::Write;
use std::time::Duration;

use crate::helpers::*;
use assert_matches::assert_matches;
use mirror_bridge::{
    bridge::Bridge,
    config::read_config_file,
    driver::Flow,
    publisher::MemorySink,
};
use rumqttc::{Event, Outgoing, Packet};

#[tokio::test]
async fn test_unreachable_broker_stops_bridge_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = unreachable_broker_config(&dir.path().join("temp"));

    let bridge = Bridge::start(&config);
    let status = bridge.status();

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        bridge.run_until(std::future::pending()),
    )
    .await
    .expect("bridge did not give up on an unreachable broker");

    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("failed to connect to MQTT broker"));
    assert!(!status.borrow().is_connected());
}

#[tokio::test]
async fn test_broker_disconnect_and_reconnect() {
    let sink = MemorySink::new();
    let (mut session, status) = create_session(RecordingExecutor::default(), sink.clone());

    session.handle_event(connack()).await;
    let first = sink.published();
    assert!(status.borrow().is_connected());

    session
        .handle_event(Event::Incoming(Packet::Disconnect))
        .await;
    assert!(!status.borrow().is_connected());

    sink.clear();
    session.handle_event(connack()).await;
    assert!(status.borrow().is_connected());
    assert_eq!(sink.published(), first);
    assert_eq!(sink.subscriptions().len(), 4);

    assert_eq!(
        session
            .handle_event(Event::Outgoing(Outgoing::Disconnect))
            .await,
        Flow::Stop
    );
    assert!(!status.borrow().is_connected());
}

#[test]
fn test_read_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "broker": {{ "host": "broker.local" }}, "device": {{ "id": "bathroom" }} }}"#
    )
    .unwrap();

    let config = read_config_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.broker.host, "broker.local");
    assert_eq!(
        config.topics().availability,
        "homeassistant/switch/bathroom/availability"
    );
}

#[test]
fn test_read_config_file_errors() {
    assert_matches!(read_config_file("/nonexistent/bridge.json"), Err(_));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "broker = \"not json\"").unwrap();
    assert_matches!(read_config_file(file.path().to_str().unwrap()), Err(_));
}
