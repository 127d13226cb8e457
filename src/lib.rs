pub mod actions;
pub mod actors;
pub mod bridge;
pub mod config;
pub mod discovery;
pub mod driver;
pub mod monitors;
pub mod publisher;
pub mod router;
pub mod topics;
pub mod util;

use chrono::{DateTime, Utc};

/// One telemetry reading; `None` marks a value unavailable for this tick
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    /// Average CPU usage in percent
    pub cpu_usage: Option<f32>,

    /// Used memory in percent of total
    pub memory_usage: Option<f32>,

    /// Degrees Celsius
    pub temperature: Option<f32>,

    pub sampled_at: DateTime<Utc>,
}
