//! Message types shared between the driver, the session and the sampler

use rumqttc::{ConnectionError, Event};
use tokio::sync::oneshot;

use crate::TelemetrySnapshot;

/// Broker connection state as seen by the session
///
/// Published on a watch channel. Flips to `Connected` only after the
/// announcement for the current connection has been queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// Commands that can be sent to a SamplerActor
#[derive(Debug)]
pub enum SamplerCommand {
    /// Sample and publish immediately, bypassing the ticker
    SampleNow {
        respond_to: oneshot::Sender<anyhow::Result<TelemetrySnapshot>>,
    },

    /// Stop sampling and exit
    Shutdown,
}

/// Input of the session task, in the order the event loop produced it
#[derive(Debug)]
pub enum SessionEvent {
    /// An event returned by a successful poll
    Broker(Event),

    /// A poll failed; the event loop dials again on the next poll
    ConnectionLost(ConnectionError),
}
