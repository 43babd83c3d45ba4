//! Session lifecycle and open subscriptions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// An agent the client can talk to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTarget {
    pub name: String,
    pub endpoint: String,
}

/// A conversation with one agent target.
///
/// `generation` increases with every session started by a coordinator; stream
/// deliveries carry it so stale ones can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub session_id: String,
    pub target: AgentTarget,
    pub generation: u64,
}

/// Owns the active session and the cancellation handles of its subscriptions
#[derive(Debug, Default)]
pub struct SessionCoordinator {
    active: Option<Session>,
    next_generation: u64,
    subscriptions: HashMap<String, CancellationToken>,
}

impl SessionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh session, ending any current one
    pub fn start_session(&mut self, target: AgentTarget) -> &Session {
        self.end_session();
        self.next_generation += 1;

        let session = Session {
            session_id: uuid::Uuid::new_v4().to_string(),
            target,
            generation: self.next_generation,
        };
        tracing::info!(
            session_id = %session.session_id,
            target = %session.target.name,
            generation = session.generation,
            "Session started"
        );
        self.active.insert(session)
    }

    /// Cancel every open subscription and forget the session
    pub fn end_session(&mut self) {
        self.cancel_subscriptions();
        if let Some(session) = self.active.take() {
            tracing::info!(session_id = %session.session_id, "Session ended");
        }
    }

    pub fn active(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    /// Whether a delivery tagged with `generation` belongs to the active session
    pub fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|session| session.generation == generation)
    }

    pub fn register_subscription(&mut self, message_id: &str, token: CancellationToken) {
        if let Some(previous) = self.subscriptions.insert(message_id.to_string(), token) {
            previous.cancel();
        }
    }

    /// Fire every open subscription's token. Returns how many were open.
    pub fn cancel_subscriptions(&mut self) -> usize {
        let count = self.subscriptions.len();
        for (message_id, token) in self.subscriptions.drain() {
            tracing::debug!(message_id = %message_id, "Cancelling subscription");
            token.cancel();
        }
        count
    }

    pub fn release_subscription(&mut self, message_id: &str) {
        self.subscriptions.remove(message_id);
    }

    #[cfg(test)]
    pub fn open_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }
}
