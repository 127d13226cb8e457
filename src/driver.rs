//! Connection driver
//!
//! The driver owns the rumqttc `EventLoop` and does nothing but poll it. Every
//! event is forwarded, in order, to a `Session` running on its own task. The
//! session handles commands one at a time; a slow script holds back later
//! commands but never the event loop, which keeps draining the request queue
//! the session and the sampler publish into.
//!
//! Reconnecting is left to rumqttc, which dials again on the next `poll` after
//! an error. Every successful ConnAck resubscribes and re-announces.

use std::time::Duration;

use anyhow::Context;
use rumqttc::{ConnAck, ConnectReturnCode, ConnectionError, Event, EventLoop, Outgoing, Packet};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::actions::ActionExecutor;
use crate::actors::messages::{ConnectionStatus, SessionEvent};
use crate::discovery::Announcer;
use crate::publisher::MessageSink;
use crate::router::CommandDispatcher;
use crate::topics::{PAYLOAD_ONLINE, Topics};

/// Whether the session should keep handling events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Reaction to broker events for one device
pub struct Session<E, S> {
    topics: Topics,
    announcer: Announcer,
    dispatcher: CommandDispatcher<E, S>,
    sink: S,
    status: watch::Sender<ConnectionStatus>,
}

impl<E, S> Session<E, S>
where
    E: ActionExecutor,
    S: MessageSink,
{
    pub fn new(
        topics: Topics,
        announcer: Announcer,
        dispatcher: CommandDispatcher<E, S>,
        sink: S,
        status: watch::Sender<ConnectionStatus>,
    ) -> Self {
        Self {
            topics,
            announcer,
            dispatcher,
            sink,
            status,
        }
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Handle events until a manual disconnect or until the driver goes away
    #[instrument(skip_all)]
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Broker(event) => {
                    if self.handle_event(event).await == Flow::Stop {
                        break;
                    }
                }
                SessionEvent::ConnectionLost(err) => self.handle_error(&err),
            }
        }

        debug!("session stopped");
    }

    pub async fn handle_event(&mut self, event: Event) -> Flow {
        match event {
            Event::Incoming(Packet::ConnAck(ConnAck {
                code: ConnectReturnCode::Success,
                session_present,
            })) => {
                info!("connected to MQTT broker (session present: {session_present})");
                self.on_connect().await;
            }
            Event::Incoming(Packet::Publish(publish)) => {
                self.dispatcher
                    .dispatch(&publish.topic, &publish.payload)
                    .await;
            }
            Event::Incoming(Packet::Disconnect) => {
                info!("disconnected by MQTT broker");
                self.set_status(ConnectionStatus::Disconnected);
            }
            Event::Outgoing(Outgoing::Disconnect) => {
                info!("disconnected from MQTT broker");
                self.set_status(ConnectionStatus::Disconnected);
                return Flow::Stop;
            }
            other => trace!("{other:?}"),
        }

        Flow::Continue
    }

    pub fn handle_error(&mut self, err: &ConnectionError) {
        match err {
            ConnectionError::ConnectionRefused(code) => {
                error!("failed to connect to MQTT broker with return code {code:?}");
            }
            err => warn!("disconnected from MQTT broker: {err}"),
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    #[instrument(skip_all)]
    async fn on_connect(&mut self) {
        for topic in self.topics.command_topics() {
            if let Err(e) = self.sink.subscribe(topic).await {
                error!("{e:#}");
            }
        }

        if let Err(e) = self
            .sink
            .publish(&self.topics.availability, PAYLOAD_ONLINE, true)
            .await
        {
            error!("{e:#}");
        }

        if let Err(e) = self.announcer.announce(&self.sink).await {
            error!("failed to announce device: {e:#}");
        }

        self.set_status(ConnectionStatus::Connected);
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            debug!("connection status {previous:?} -> {status:?}");
        }
    }
}

/// Aborts the session task when the driver is dropped before it finished
struct SessionTask(JoinHandle<()>);

impl Drop for SessionTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct ConnectionDriver<E, S> {
    event_loop: EventLoop,
    session: Session<E, S>,
    reconnect_delay: Duration,
}

impl<E, S> ConnectionDriver<E, S>
where
    E: ActionExecutor + 'static,
    S: MessageSink + 'static,
{
    pub fn new(event_loop: EventLoop, session: Session<E, S>, reconnect_delay: Duration) -> Self {
        Self {
            event_loop,
            session,
            reconnect_delay,
        }
    }

    /// Poll until a manual disconnect or until every client handle is dropped
    ///
    /// Fails only if the broker cannot be reached on the very first attempt.
    /// On a clean stop the session is given the chance to handle every event
    /// forwarded so far.
    #[instrument(skip_all)]
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            mut event_loop,
            session,
            reconnect_delay,
        } = self;

        let (events, events_rx) = mpsc::unbounded_channel();
        let mut session = SessionTask(tokio::spawn(session.run(events_rx)));

        let mut reached_broker = false;

        loop {
            match event_loop.poll().await {
                Ok(event) => {
                    if matches!(event, Event::Incoming(Packet::ConnAck(_))) {
                        reached_broker = true;
                    }
                    let stop = matches!(event, Event::Outgoing(Outgoing::Disconnect));
                    forward(&events, SessionEvent::Broker(event));
                    if stop {
                        break;
                    }
                }
                Err(ConnectionError::RequestsDone) => {
                    debug!("all client handles dropped");
                    break;
                }
                Err(err) => {
                    if matches!(err, ConnectionError::ConnectionRefused(_)) {
                        reached_broker = true;
                    }
                    if !reached_broker {
                        return Err(err).context("failed to connect to MQTT broker");
                    }
                    forward(&events, SessionEvent::ConnectionLost(err));
                    tokio::time::sleep(reconnect_delay).await;
                }
            }
        }

        drop(events);
        (&mut session.0).await.context("session task panicked")?;

        debug!("connection driver stopped");
        Ok(())
    }
}

fn forward(events: &mpsc::UnboundedSender<SessionEvent>, event: SessionEvent) {
    if events.send(event).is_err() {
        warn!("session is gone, dropping broker event");
    }
}
