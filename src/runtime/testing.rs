//! Mock transports for testing
//!
//! These mocks let the runtime be driven end to end without a network.

use crate::a2a::{AgentTransport, EventStream, SendTaskParams, StreamEvent, TransportError};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Mutex;

/// What one scripted subscription produces
#[derive(Debug, Clone)]
pub enum Script {
    /// Opening the stream fails
    Refuse(TransportError),
    /// Yield these items, then end (or hang open when `hold_open` is set)
    Items {
        items: Vec<Result<StreamEvent, TransportError>>,
        hold_open: bool,
    },
}

impl Script {
    pub fn events(events: Vec<StreamEvent>) -> Self {
        Script::Items {
            items: events.into_iter().map(Ok).collect(),
            hold_open: false,
        }
    }

    /// Yield `events` and then never end
    pub fn pending(events: Vec<StreamEvent>) -> Self {
        Script::Items {
            items: events.into_iter().map(Ok).collect(),
            hold_open: true,
        }
    }
}

/// Transport that replays queued scripts, one per `open_stream` call
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    /// Every request opened, in order
    pub requests: Mutex<Vec<(String, SendTaskParams)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn recorded_requests(&self) -> Vec<(String, SendTaskParams)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentTransport for ScriptedTransport {
    async fn open_stream(
        &self,
        endpoint: &str,
        params: &SendTaskParams,
    ) -> Result<EventStream, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((endpoint.to_string(), params.clone()));
        let script = self.scripts.lock().unwrap().pop_front();

        match script {
            None => Err(TransportError::network("No mock script queued")),
            Some(Script::Refuse(error)) => Err(error),
            Some(Script::Items { items, hold_open }) => {
                let replay = stream::iter(items);
                if hold_open {
                    Ok(Box::pin(replay.chain(stream::pending())))
                } else {
                    Ok(Box::pin(replay))
                }
            }
        }
    }
}
