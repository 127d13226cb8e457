//! SamplerActor - Periodically publishes device telemetry
//!
//! ## Message Flow
//!
//! ```text
//! first Connected → Timer tick → sample source → retained publish per available metric
//!                       ↑
//!                       └─── Commands (SampleNow, Shutdown)
//! ```
//!
//! The actor holds off until the session reports the first connection, so the
//! announcer's initial sensor states are always queued before any reading.
//! Ticks that fall while the connection is down are skipped.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, instrument, trace, warn};

use crate::TelemetrySnapshot;
use crate::monitors::TelemetrySource;
use crate::publisher::MessageSink;
use crate::topics::Topics;

use super::messages::{ConnectionStatus, SamplerCommand};

pub struct SamplerActor<T, S> {
    source: T,
    sink: S,
    topics: Topics,
    command_rx: mpsc::Receiver<SamplerCommand>,
    status: watch::Receiver<ConnectionStatus>,
    interval_duration: Duration,
}

impl<T, S> SamplerActor<T, S>
where
    T: TelemetrySource,
    S: MessageSink,
{
    pub fn new(
        source: T,
        sink: S,
        topics: Topics,
        command_rx: mpsc::Receiver<SamplerCommand>,
        status: watch::Receiver<ConnectionStatus>,
        interval_duration: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            topics,
            command_rx,
            status,
            interval_duration,
        }
    }

    /// Run until a Shutdown command arrives or the command channel closes
    #[instrument(skip_all)]
    pub async fn run(mut self) {
        debug!("starting sampler actor");

        if !self.wait_until_connected().await {
            debug!("sampler actor stopped before first connection");
            return;
        }

        let mut ticker = interval(self.interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.is_connected() {
                        trace!("skipping tick while disconnected");
                    } else if let Err(e) = self.sample_and_publish().await {
                        error!("failed to publish telemetry: {:#}", e);
                    }
                }

                command = self.command_rx.recv() => {
                    if !self.handle_command(command).await {
                        break;
                    }
                }
            }
        }

        debug!("sampler actor stopped");
    }

    fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    /// Returns `false` if the actor should stop before ever sampling
    async fn wait_until_connected(&mut self) -> bool {
        loop {
            if self.status.borrow_and_update().is_connected() {
                return true;
            }

            tokio::select! {
                changed = self.status.changed() => {
                    if changed.is_err() {
                        warn!("connection status channel closed");
                        return false;
                    }
                }

                command = self.command_rx.recv() => {
                    if !self.handle_command(command).await {
                        return false;
                    }
                }
            }
        }
    }

    /// Returns `false` once the actor should stop
    async fn handle_command(&mut self, command: Option<SamplerCommand>) -> bool {
        match command {
            Some(SamplerCommand::SampleNow { respond_to }) => {
                debug!("received SampleNow command");
                let result = if self.is_connected() {
                    self.sample_and_publish().await
                } else {
                    Err(anyhow::anyhow!("not connected to the broker"))
                };
                let _ = respond_to.send(result);
                true
            }
            Some(SamplerCommand::Shutdown) => {
                debug!("received shutdown command");
                false
            }
            None => {
                warn!("command channel closed, shutting down");
                false
            }
        }
    }

    async fn sample_and_publish(&mut self) -> Result<TelemetrySnapshot> {
        let snapshot = self.source.sample().await;

        for (topic, value) in readings(&self.topics, &snapshot) {
            self.sink.publish(topic, &value, true).await?;
        }

        trace!("published telemetry sampled at {}", snapshot.sampled_at);
        Ok(snapshot)
    }
}

/// Topic and text value of every available metric in a snapshot
pub fn readings<'a>(topics: &'a Topics, snapshot: &TelemetrySnapshot) -> Vec<(&'a str, String)> {
    let TelemetrySnapshot {
        cpu_usage,
        memory_usage,
        temperature,
        ..
    } = snapshot;

    let mut readings = Vec::with_capacity(3);

    if let Some(cpu) = cpu_usage {
        readings.push((topics.cpu_usage.as_str(), format!("{cpu:.1}")));
    }
    if let Some(memory) = memory_usage {
        readings.push((topics.memory_usage.as_str(), format!("{memory:.1}")));
    }
    if let Some(temperature) = temperature {
        readings.push((topics.temperature.as_str(), temperature.to_string()));
    }

    readings
}

/// Handle for controlling a SamplerActor
pub struct SamplerHandle {
    sender: mpsc::Sender<SamplerCommand>,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// Spawn a new sampler actor
    pub fn spawn<T, S>(
        source: T,
        sink: S,
        topics: Topics,
        status: watch::Receiver<ConnectionStatus>,
        interval_duration: Duration,
    ) -> Self
    where
        T: TelemetrySource + 'static,
        S: MessageSink + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SamplerActor::new(source, sink, topics, cmd_rx, status, interval_duration);

        let task = tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            task,
        }
    }

    /// Sample and publish immediately
    ///
    /// Fails while the bridge is not connected.
    pub async fn sample_now(&self) -> Result<TelemetrySnapshot> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SamplerCommand::SampleNow { respond_to: tx })
            .await
            .context("failed to send SampleNow command")?;

        rx.await.context("failed to receive response")?
    }

    /// Stop the sampler and wait for the actor to exit
    ///
    /// A sample in progress is published before this returns.
    pub async fn shutdown(self) -> Result<()> {
        if self.sender.send(SamplerCommand::Shutdown).await.is_err() {
            debug!("sampler actor already stopped");
        }
        self.task.await.context("sampler actor panicked")
    }
}
