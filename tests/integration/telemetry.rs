//! Telemetry sampling against the real host, sharing a sink with the session

use std::time::Duration;

use crate::helpers::*;
use mirror_bridge::{
    actors::sampler::SamplerHandle,
    config::TelemetryConfig,
    discovery::SENSOR_INITIAL_STATE,
    monitors::system::SystemTelemetry,
    publisher::MemorySink,
};

fn telemetry_without_thermal_zone(dir: &tempfile::TempDir) -> SystemTelemetry {
    SystemTelemetry::new(&TelemetryConfig {
        interval: 60,
        temperature_path: dir.path().join("missing_temp"),
    })
}

#[tokio::test]
async fn test_sampler_skips_temperature_when_zone_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let sink = MemorySink::new();
    let (mut session, status) = create_session(RecordingExecutor::default(), sink.clone());
    let topics = test_topics();

    let sampler = SamplerHandle::spawn(
        telemetry_without_thermal_zone(&dir),
        sink.clone(),
        topics.clone(),
        status,
        Duration::from_secs(3600),
    );

    session.handle_event(connack()).await;

    let snapshot = sampler.sample_now().await.unwrap();
    assert!(snapshot.cpu_usage.is_some());
    assert!(snapshot.memory_usage.is_some());
    assert!(snapshot.temperature.is_none());

    // Only the initial state from the announcement ever reaches the temperature topic
    let temperature = sink.published_to(&topics.temperature);
    assert_eq!(temperature.len(), 1);
    assert_eq!(temperature[0].payload, SENSOR_INITIAL_STATE);

    let memory = sink.published_to(&topics.memory_usage);
    assert!(memory.len() >= 2);
    assert!(memory.iter().all(|p| p.retain));

    sampler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_initial_sensor_states_precede_telemetry() {
    let dir = tempfile::tempdir().unwrap();
    let sink = MemorySink::new();
    let (mut session, status) = create_session(RecordingExecutor::default(), sink.clone());
    let topics = test_topics();

    let sampler = SamplerHandle::spawn(
        telemetry_without_thermal_zone(&dir),
        sink.clone(),
        topics.clone(),
        status,
        Duration::from_secs(3600),
    );

    session.handle_event(connack()).await;
    sampler.sample_now().await.unwrap();

    for topic in [&topics.cpu_usage, &topics.memory_usage] {
        let states = sink.published_to(topic);
        assert_eq!(states[0].payload, SENSOR_INITIAL_STATE);
        assert!(states.len() >= 2, "no reading published to {topic}");
        assert!(states[1..].iter().all(|p| p.payload.contains('.')));
    }

    sampler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_sample_now_fails_before_connection() {
    let dir = tempfile::tempdir().unwrap();
    let sink = MemorySink::new();
    let (_session, status) = create_session(RecordingExecutor::default(), sink.clone());

    let sampler = SamplerHandle::spawn(
        telemetry_without_thermal_zone(&dir),
        sink.clone(),
        test_topics(),
        status,
        Duration::from_secs(1),
    );

    assert!(sampler.sample_now().await.is_err());
    assert!(sink.published().is_empty());

    sampler.shutdown().await.unwrap();
}
