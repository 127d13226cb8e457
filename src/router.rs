//! Command routing
//!
//! ```text
//! (topic, payload) → TopicRouter::route → Action → ActionExecutor
//!                                                      │ Ok
//!                                                      ▼
//!                                    retained "ON"/"OFF" on the state topic
//! ```
//!
//! Matching is exact on both topic and payload. Anything that does not match
//! is dropped without a reply.

use tracing::{debug, error, instrument, trace};

use crate::actions::{Action, ActionExecutor};
use crate::publisher::MessageSink;
use crate::topics::{PAYLOAD_OFF, PAYLOAD_ON, SwitchTopics, Topics};

/// Where a command leads: the action to run and the state to report afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub action: Action,
    pub state: Option<StateUpdate>,
}

/// Retained state published once the action succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateUpdate {
    pub topic: String,
    pub payload: &'static str,
}

#[derive(Debug, Clone)]
pub struct TopicRouter {
    topics: Topics,
}

impl TopicRouter {
    pub fn new(topics: Topics) -> Self {
        Self { topics }
    }

    pub fn route(&self, topic: &str, payload: &str) -> Option<Route> {
        let Topics {
            mirror,
            display,
            firefox,
            reboot,
            ..
        } = &self.topics;

        if reboot == topic {
            return Some(Route {
                action: Action::Reboot,
                state: None,
            });
        }

        let switches = [
            (mirror, Action::MirrorOn, Action::MirrorOff),
            (display, Action::DisplayOn, Action::DisplayOff),
            (firefox, Action::StartFirefox, Action::KillFirefox),
        ];

        let (switch, on, off) = switches
            .into_iter()
            .find(|(switch, _, _)| switch.command == topic)?;

        match payload {
            PAYLOAD_ON => Some(switch_route(switch, on, PAYLOAD_ON)),
            PAYLOAD_OFF => Some(switch_route(switch, off, PAYLOAD_OFF)),
            _ => None,
        }
    }
}

fn switch_route(switch: &SwitchTopics, action: Action, payload: &'static str) -> Route {
    Route {
        action,
        state: Some(StateUpdate {
            topic: switch.state.clone(),
            payload,
        }),
    }
}

/// What happened to an inbound command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No route for this topic/payload combination
    Ignored,

    /// The action failed; no state was published
    Failed(Action),

    /// The action succeeded
    Executed {
        action: Action,
        state_published: bool,
    },
}

/// Routes commands, runs their action and reports the resulting state
pub struct CommandDispatcher<E, S> {
    router: TopicRouter,
    executor: E,
    sink: S,
}

impl<E, S> CommandDispatcher<E, S>
where
    E: ActionExecutor,
    S: MessageSink,
{
    pub fn new(router: TopicRouter, executor: E, sink: S) -> Self {
        Self {
            router,
            executor,
            sink,
        }
    }

    #[instrument(skip(self, payload))]
    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        let Ok(payload) = std::str::from_utf8(payload) else {
            trace!("ignoring non-utf8 payload");
            return DispatchOutcome::Ignored;
        };

        debug!("received message {payload:?}");

        let Some(Route { action, state }) = self.router.route(topic, payload) else {
            trace!("no route for {payload:?}");
            return DispatchOutcome::Ignored;
        };

        if let Err(e) = self.executor.execute(action).await {
            error!("error executing action ({action}): {e}");
            return DispatchOutcome::Failed(action);
        }

        let Some(StateUpdate { topic, payload }) = state else {
            return DispatchOutcome::Executed {
                action,
                state_published: false,
            };
        };

        let state_published = match self.sink.publish(&topic, payload, true).await {
            Ok(()) => true,
            Err(e) => {
                error!("failed to publish state: {e:#}");
                false
            }
        };

        DispatchOutcome::Executed {
            action,
            state_published,
        }
    }
}
