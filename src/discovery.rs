//! Home Assistant MQTT discovery
//!
//! On every successful connection the announcer republishes, retained, one
//! config payload per switch and sensor so the hub can register them without
//! manual configuration. Sensors additionally get an initial `"0"` state so a
//! new subscriber never sees them as unknown.
//!
//! Payloads are serialized from plain structs; field order is fixed by the
//! struct definitions, so the same descriptor always yields the same bytes.

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::DeviceConfig;
use crate::publisher::MessageSink;
use crate::topics::{PAYLOAD_OFF, PAYLOAD_ON, Topics};

/// Initial state published for every sensor on connect
pub const SENSOR_INITIAL_STATE: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub identifiers: Vec<String>,
    pub name: String,
    pub model: String,
    pub manufacturer: String,
}

impl From<&DeviceConfig> for Device {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            identifiers: vec![config.id.clone()],
            name: config.name.clone(),
            model: config.model.clone(),
            manufacturer: config.manufacturer.clone(),
        }
    }
}

/// Discovery payload of a controllable switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchConfig {
    pub name: String,
    pub command_topic: String,
    /// Absent for fire-and-forget switches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_topic: Option<String>,
    pub availability_topic: String,
    pub payload_on: String,
    pub payload_off: String,
    pub unique_id: String,
    pub device: Device,
}

/// Discovery payload of a telemetry sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorConfig {
    pub name: String,
    pub state_topic: String,
    pub unit_of_measurement: String,
    pub unique_id: String,
    pub device: Device,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
}

/// A retained config message ready to be published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryMessage {
    pub topic: String,
    pub payload: String,
}

#[derive(Debug, Clone)]
pub struct Announcer {
    topics: Topics,
    device: Device,
}

impl Announcer {
    pub fn new(topics: Topics, device: &DeviceConfig) -> Self {
        Self {
            topics,
            device: device.into(),
        }
    }

    fn switch(
        &self,
        name: &str,
        object_id: &str,
        command: &str,
        state: Option<&str>,
    ) -> SwitchConfig {
        SwitchConfig {
            name: name.to_string(),
            command_topic: command.to_string(),
            state_topic: state.map(str::to_string),
            availability_topic: self.topics.availability.clone(),
            payload_on: PAYLOAD_ON.to_string(),
            payload_off: PAYLOAD_OFF.to_string(),
            unique_id: self.topics.unique_id(object_id),
            device: self.device.clone(),
        }
    }

    fn sensor(
        &self,
        name: &str,
        object_id: &str,
        state: &str,
        unit: &str,
        device_class: Option<&str>,
    ) -> SensorConfig {
        SensorConfig {
            name: name.to_string(),
            state_topic: state.to_string(),
            unit_of_measurement: unit.to_string(),
            unique_id: self.topics.unique_id(object_id),
            device: self.device.clone(),
            device_class: device_class.map(str::to_string),
            value_template: None,
        }
    }

    pub fn switches(&self) -> Vec<SwitchConfig> {
        let Topics {
            mirror,
            display,
            firefox,
            reboot,
            ..
        } = &self.topics;

        vec![
            self.switch(
                "Mirror Switch",
                "mirror_switch",
                &mirror.command,
                Some(mirror.state.as_str()),
            ),
            self.switch(
                "Display",
                "display",
                &display.command,
                Some(display.state.as_str()),
            ),
            self.switch(
                "Firefox",
                "firefox",
                &firefox.command,
                Some(firefox.state.as_str()),
            ),
            self.switch("Reboot Pi", "reboot", reboot, None),
        ]
    }

    pub fn sensors(&self) -> Vec<SensorConfig> {
        let Topics {
            cpu_usage,
            memory_usage,
            temperature,
            ..
        } = &self.topics;

        vec![
            self.sensor("CPU Usage", "cpu_usage", cpu_usage, "%", None),
            self.sensor("Memory Usage", "memory_usage", memory_usage, "%", None),
            self.sensor(
                "Temperature",
                "temperature",
                temperature,
                "°C",
                Some("temperature"),
            ),
        ]
    }

    pub fn switch_message(&self, config: &SwitchConfig) -> anyhow::Result<DiscoveryMessage> {
        Ok(DiscoveryMessage {
            topic: self.topics.switch_config(&config.unique_id),
            payload: serde_json::to_string(config).context("failed to serialize switch config")?,
        })
    }

    pub fn sensor_message(&self, config: &SensorConfig) -> anyhow::Result<DiscoveryMessage> {
        Ok(DiscoveryMessage {
            topic: self.topics.sensor_config(&config.unique_id),
            payload: serde_json::to_string(config).context("failed to serialize sensor config")?,
        })
    }

    /// Publish every descriptor, then seed each sensor's state
    #[instrument(skip_all)]
    pub async fn announce<S: MessageSink + ?Sized>(&self, sink: &S) -> anyhow::Result<()> {
        for switch in self.switches() {
            let DiscoveryMessage { topic, payload } = self.switch_message(&switch)?;
            sink.publish(&topic, &payload, true).await?;
        }

        for sensor in self.sensors() {
            let DiscoveryMessage { topic, payload } = self.sensor_message(&sensor)?;
            sink.publish(&topic, &payload, true).await?;
            sink.publish(&sensor.state_topic, SENSOR_INITIAL_STATE, true)
                .await?;
        }

        debug!("announced device {}", self.topics.device_id);
        Ok(())
    }
}
