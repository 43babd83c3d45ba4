//! HTTP API for the conversation client

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::{AgentTarget, RuntimeHandle};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: RuntimeHandle,
    pub agents: Arc<Vec<AgentTarget>>,
}

impl AppState {
    pub fn new(runtime: RuntimeHandle, agents: Vec<AgentTarget>) -> Self {
        Self {
            runtime,
            agents: Arc::new(agents),
        }
    }

    pub fn agent(&self, name: &str) -> Option<&AgentTarget> {
        self.agents.iter().find(|agent| agent.name == name)
    }
}
