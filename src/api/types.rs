//! API request and response types

use crate::conversation::FormValues;
use crate::runtime::{AgentTarget, Session};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request to start a session with a configured agent
#[derive(Debug, Deserialize)]
pub struct SelectAgentRequest {
    pub agent: String,
}

/// Request to send a prompt
#[derive(Debug, Deserialize)]
pub struct TurnRequestBody {
    pub text: String,
}

/// Values filled into an agent's form
#[derive(Debug, Deserialize)]
pub struct FormSubmission {
    #[serde(default)]
    pub values: FormValues,
}

/// Response with the configured agents
#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentTarget>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: Session,
}

/// Response for an accepted turn
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub user_message_id: String,
    pub agent_message_id: String,
}

/// Response for cancel action
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: Vec<String>,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Per-field messages for rejected forms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            fields: None,
        }
    }

    #[must_use]
    pub fn with_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.fields = Some(fields);
        self
    }
}
