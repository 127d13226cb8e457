use std::io;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::{trace, warn};

use super::TelemetrySource;
use super::thermal::ThermalZone;
use crate::TelemetrySnapshot;
use crate::config::TelemetryConfig;

/// Window over which CPU usage is averaged
const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Telemetry of the local machine
pub struct SystemTelemetry {
    system: System,
    thermal: ThermalZone,
    cpu_window: Duration,
}

impl SystemTelemetry {
    pub fn new(config: &TelemetryConfig) -> Self {
        let refresh = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());

        Self {
            system: System::new_with_specifics(refresh),
            thermal: ThermalZone::new(&config.temperature_path),
            cpu_window: CPU_SAMPLE_WINDOW.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    async fn cpu_usage(&mut self) -> Option<f32> {
        self.system.refresh_cpu_usage();
        tokio::time::sleep(self.cpu_window).await;
        self.system.refresh_cpu_usage();

        Some(self.system.global_cpu_usage()).filter(|usage| usage.is_finite())
    }

    fn memory_usage(&mut self) -> Option<f32> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return None;
        }

        Some(self.system.used_memory() as f32 / total as f32 * 100.0)
    }

    async fn temperature(&self) -> Option<f32> {
        match self.thermal.read_celsius().await {
            Ok(temperature) => Some(temperature),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("temperature file {} not found", self.thermal.path().display());
                None
            }
            Err(e) => {
                warn!(
                    "failed to read temperature from {}: {e}",
                    self.thermal.path().display()
                );
                None
            }
        }
    }
}

#[async_trait]
impl TelemetrySource for SystemTelemetry {
    async fn sample(&mut self) -> TelemetrySnapshot {
        let cpu_usage = self.cpu_usage().await;
        let memory_usage = self.memory_usage();
        let temperature = self.temperature().await;

        trace!("cpu {cpu_usage:?}, memory {memory_usage:?}, temperature {temperature:?}");

        TelemetrySnapshot {
            cpu_usage,
            memory_usage,
            temperature,
            sampled_at: Utc::now(),
        }
    }
}
