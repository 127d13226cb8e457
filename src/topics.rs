//! Topic layout for a single device
//!
//! All topics are derived once from the discovery prefix and the device id and
//! never change afterwards.

pub const PAYLOAD_ON: &str = "ON";
pub const PAYLOAD_OFF: &str = "OFF";
pub const PAYLOAD_ONLINE: &str = "online";
pub const PAYLOAD_OFFLINE: &str = "offline";

/// Command/state pair of a controllable switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTopics {
    pub command: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub prefix: String,
    pub device_id: String,

    pub mirror: SwitchTopics,
    pub display: SwitchTopics,
    pub firefox: SwitchTopics,
    /// Reboot is fire-and-forget and has no state topic
    pub reboot: String,

    pub availability: String,

    pub cpu_usage: String,
    pub memory_usage: String,
    pub temperature: String,
}

impl Topics {
    pub fn new(prefix: &str, device_id: &str) -> Self {
        let switch = format!("{prefix}/switch/{device_id}");
        let sensor = format!("{prefix}/sensor/{device_id}");

        let pair = |name: &str| SwitchTopics {
            command: format!("{switch}/{name}/set"),
            state: format!("{switch}/{name}/state"),
        };

        Self {
            prefix: prefix.to_string(),
            device_id: device_id.to_string(),
            mirror: SwitchTopics {
                command: format!("{switch}/set"),
                state: format!("{switch}/state"),
            },
            display: pair("display"),
            firefox: pair("firefox"),
            reboot: format!("{switch}/reboot/set"),
            availability: format!("{switch}/availability"),
            cpu_usage: format!("{sensor}/cpu_usage/state"),
            memory_usage: format!("{sensor}/memory_usage/state"),
            temperature: format!("{sensor}/temperature/state"),
        }
    }

    /// Every topic the bridge subscribes to
    pub fn command_topics(&self) -> [&str; 4] {
        [
            self.mirror.command.as_str(),
            self.display.command.as_str(),
            self.firefox.command.as_str(),
            self.reboot.as_str(),
        ]
    }

    pub fn switch_config(&self, unique_id: &str) -> String {
        format!("{}/switch/{unique_id}/config", self.prefix)
    }

    pub fn sensor_config(&self, unique_id: &str) -> String {
        format!("{}/sensor/{unique_id}/config", self.prefix)
    }

    /// Unique id of an entity, namespaced by the device id
    pub fn unique_id(&self, object_id: &str) -> String {
        format!("{}_{object_id}", self.device_id)
    }
}
