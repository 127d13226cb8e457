use std::path::PathBuf;
use std::time::Duration;

use rumqttc::{LastWill, MqttOptions, QoS};
use tracing::trace;

use crate::topics::Topics;
use crate::util::{get_password, get_username};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub broker: BrokerConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    /// Root of every discovery, command and state topic
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,

    #[serde(default)]
    pub scripts: ScriptsConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Keep-alive in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,
    /// Capacity of the outgoing request queue shared by all publishers
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
    /// Seconds between reconnect attempts after a network error
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: u64,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DeviceConfig {
    /// Used as MQTT client id, topic segment and discovery identifier
    #[serde(default = "default_device_id")]
    pub id: String,
    #[serde(default = "default_device_name")]
    pub name: String,
    #[serde(default = "default_device_model")]
    pub model: String,
    #[serde(default = "default_device_manufacturer")]
    pub manufacturer: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: default_device_id(),
            name: default_device_name(),
            model: default_device_model(),
            manufacturer: default_device_manufacturer(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ScriptsConfig {
    #[serde(default = "default_scripts_dir")]
    pub dir: PathBuf,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            dir: default_scripts_dir(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TelemetryConfig {
    /// Sampling period in seconds
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Thermal zone pseudo-file reporting millidegrees Celsius
    #[serde(default = "default_temperature_path")]
    pub temperature_path: PathBuf,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            temperature_path: default_temperature_path(),
        }
    }
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    60
}

fn default_request_capacity() -> usize {
    100
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_device_id() -> String {
    String::from("smart_mirror")
}

fn default_device_name() -> String {
    String::from("Smart Mirror")
}

fn default_device_model() -> String {
    String::from("Raspberry Pi Smart Mirror")
}

fn default_device_manufacturer() -> String {
    String::from("Mirroracle Innovations Ltd.")
}

fn default_discovery_prefix() -> String {
    String::from("homeassistant")
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("/home/pi/scripts")
}

fn default_interval() -> u64 {
    60
}

fn default_temperature_path() -> PathBuf {
    PathBuf::from("/sys/class/thermal/thermal_zone0/temp")
}

impl Config {
    pub fn topics(&self) -> Topics {
        Topics::new(&self.discovery_prefix, &self.device.id)
    }

    /// Connection options for the broker. The last will marks the device
    /// offline when the connection drops without a clean disconnect.
    pub fn mqtt_options(&self) -> MqttOptions {
        let BrokerConfig {
            host,
            port,
            username,
            password,
            keep_alive,
            ..
        } = &self.broker;

        let mut options = MqttOptions::new(self.device.id.clone(), host.clone(), *port);
        options.set_keep_alive(Duration::from_secs(*keep_alive));

        if let Some(username) = username {
            options.set_credentials(username.clone(), password.clone().unwrap_or_default());
        }

        options.set_last_will(LastWill::new(
            self.topics().availability,
            crate::topics::PAYLOAD_OFFLINE,
            QoS::AtMostOnce,
            true,
        ));

        options
    }

    /// Credentials from the environment take precedence over the file.
    fn apply_env(mut self) -> Self {
        if let Some(username) = get_username() {
            self.broker.username = Some(username);
        }
        if let Some(password) = get_password() {
            self.broker.password = Some(password);
        }
        self
    }

    fn validate(self) -> anyhow::Result<Self> {
        if self.telemetry.interval == 0 {
            anyhow::bail!("telemetry interval must be at least one second");
        }
        if self.broker.keep_alive < 5 {
            anyhow::bail!("keep alive must be at least 5 seconds");
        }
        // Subscriptions and the announcement are queued in one go on connect
        if self.broker.request_capacity < 16 {
            anyhow::bail!("request capacity must be at least 16");
        }
        if self.device.id.is_empty() {
            anyhow::bail!("device id must not be empty");
        }
        Ok(self)
    }
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str::<Config>(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .and_then(Config::validate)
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    parse_config(&file_content)
        .map(Config::apply_env)
        .inspect(|config| trace!("loaded config for device {}", config.device.id))
}
