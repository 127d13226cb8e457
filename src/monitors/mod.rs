//! Sources of device telemetry

pub mod system;
pub mod thermal;

use async_trait::async_trait;

use crate::TelemetrySnapshot;

/// Something that can take a telemetry reading
///
/// Unavailable values are reported as `None` in the snapshot; a source never
/// fails as a whole.
#[async_trait]
pub trait TelemetrySource: Send {
    async fn sample(&mut self) -> TelemetrySnapshot;
}
