use std::io;
use std::path::{Path, PathBuf};

/// Linux thermal zone pseudo-file reporting millidegrees Celsius
#[derive(Debug, Clone)]
pub struct ThermalZone {
    path: PathBuf,
}

impl ThermalZone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current temperature in degrees Celsius
    pub async fn read_celsius(&self) -> io::Result<f32> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        parse_millidegrees(&raw)
    }
}

pub fn parse_millidegrees(raw: &str) -> io::Result<f32> {
    raw.trim()
        .parse::<i64>()
        .map(|millidegrees| millidegrees as f32 / 1000.0)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
