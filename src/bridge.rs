//! Wiring of the driver, the dispatcher and the sampler for one device

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use rumqttc::AsyncClient;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::actions::ScriptExecutor;
use crate::actors::messages::ConnectionStatus;
use crate::actors::sampler::SamplerHandle;
use crate::config::Config;
use crate::discovery::Announcer;
use crate::driver::{ConnectionDriver, Session};
use crate::monitors::system::SystemTelemetry;
use crate::publisher::MessageSink;
use crate::router::{CommandDispatcher, TopicRouter};
use crate::topics::{PAYLOAD_OFFLINE, Topics};

/// Upper bound for flushing the offline state and the disconnect
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Bridge {
    client: AsyncClient,
    topics: Topics,
    sampler: SamplerHandle,
    driver: JoinHandle<anyhow::Result<()>>,
    status: watch::Receiver<ConnectionStatus>,
}

impl Bridge {
    /// Spawn the connection driver and the telemetry sampler
    pub fn start(config: &Config) -> Self {
        let topics = config.topics();
        let (client, event_loop) =
            AsyncClient::new(config.mqtt_options(), config.broker.request_capacity);
        let (status_tx, status) = watch::channel(ConnectionStatus::default());

        let dispatcher = CommandDispatcher::new(
            TopicRouter::new(topics.clone()),
            ScriptExecutor::new(&config.scripts.dir),
            client.clone(),
        );
        let session = Session::new(
            topics.clone(),
            Announcer::new(topics.clone(), &config.device),
            dispatcher,
            client.clone(),
            status_tx,
        );
        let driver = ConnectionDriver::new(
            event_loop,
            session,
            Duration::from_secs(config.broker.reconnect_delay),
        );

        info!(
            "connecting to {}:{} as {}",
            config.broker.host, config.broker.port, config.device.id
        );
        let driver = tokio::spawn(driver.run());

        let sampler = SamplerHandle::spawn(
            SystemTelemetry::new(&config.telemetry),
            client.clone(),
            topics.clone(),
            status.clone(),
            Duration::from_secs(config.telemetry.interval),
        );

        Self {
            client,
            topics,
            sampler,
            driver,
            status,
        }
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Run until `shutdown` resolves, then disconnect cleanly
    ///
    /// Returns early with the driver's result if the driver stops on its own.
    pub async fn run_until<F>(mut self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let finished = tokio::select! {
            result = &mut self.driver => Some(result),
            _ = shutdown => None,
        };

        if let Some(result) = finished {
            if let Err(e) = self.sampler.shutdown().await {
                debug!("{e:#}");
            }
            return result.context("connection driver panicked")?;
        }

        info!("disconnecting from MQTT broker");
        self.shutdown().await
    }

    async fn shutdown(mut self) -> anyhow::Result<()> {
        if let Err(e) = self.sampler.shutdown().await {
            warn!("{e:#}");
        }

        let client = &self.client;
        let availability = &self.topics.availability;
        let driver = &mut self.driver;
        let disconnect = async move {
            let offline = MessageSink::publish(client, availability, PAYLOAD_OFFLINE, true);
            if let Err(e) = offline.await {
                error!("{e:#}");
            }
            client
                .disconnect()
                .await
                .context("failed to disconnect from MQTT broker")?;
            driver.await.context("connection driver panicked")?
        };

        let result = tokio::time::timeout(SHUTDOWN_TIMEOUT, disconnect).await;
        match result {
            Ok(result) => result,
            Err(_) => {
                warn!("broker did not take the disconnect in time, dropping the connection");
                self.driver.abort();
                Ok(())
            }
        }
    }
}
