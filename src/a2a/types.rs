//! Wire types for the A2A task stream

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC method used to open a streaming task
pub const SEND_SUBSCRIBE_METHOD: &str = "tasks/sendSubscribe";

/// Output modes advertised on every request
pub const ACCEPTED_OUTPUT_MODES: [&str; 2] = ["text", "data"];

// ============================================================================
// Inbound
// ============================================================================

/// One decoded frame of the task stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(default)]
    pub result: Option<TaskUpdate>,
}

#[cfg(test)] // Builders for tests and mocks
impl StreamEvent {
    pub fn new(result: TaskUpdate) -> Self {
        Self {
            result: Some(result),
        }
    }
}

/// Status and/or artifact update for a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub artifact: Option<Artifact>,
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

#[cfg(test)]
impl TaskUpdate {
    pub fn status(state: TaskState, parts: Vec<Part>) -> Self {
        Self {
            status: Some(TaskStatus {
                state,
                message: (!parts.is_empty()).then_some(StatusMessage { parts }),
            }),
            ..Self::default()
        }
    }

    pub fn artifact(parts: Vec<Part>, append: bool, last_chunk: bool) -> Self {
        Self {
            artifact: Some(Artifact {
                parts,
                append,
                last_chunk,
            }),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_final(mut self) -> Self {
        self.is_final = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(default)]
    pub message: Option<StatusMessage>,
}

/// Task lifecycle state as reported by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Canceled,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// States after which the agent sends nothing more for this turn
    pub fn ends_turn(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::InputRequired | TaskState::Canceled | TaskState::Failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Output content of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default)]
    pub append: bool,
    #[serde(default, rename = "lastChunk")]
    pub last_chunk: bool,
}

/// A single content part.
///
/// Data payloads stay raw here; the classifier decodes them into
/// [`crate::conversation::DataPayload`] so that one bad payload does not
/// poison the rest of the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        #[serde(default)]
        text: String,
    },
    Data {
        #[serde(default)]
        data: Value,
    },
    #[serde(other)]
    Unknown,
}

impl Part {
    pub fn text(s: impl Into<String>) -> Self {
        Part::Text { text: s.into() }
    }

    #[cfg(test)]
    pub fn data(value: Value) -> Self {
        Part::Data { data: value }
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// Parameters of a `tasks/sendSubscribe` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTaskParams {
    pub id: String,
    pub session_id: String,
    pub accepted_output_modes: Vec<String>,
    pub message: OutboundMessage,
}

impl SendTaskParams {
    pub fn user_text(id: impl Into<String>, session_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            accepted_output_modes: ACCEPTED_OUTPUT_MODES.iter().map(ToString::to_string).collect(),
            message: OutboundMessage {
                role: "user".to_string(),
                parts: vec![Part::text(text)],
            },
        }
    }

    /// Text the user sent with this request
    pub fn text(&self) -> String {
        self.message
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub role: String,
    pub parts: Vec<Part>,
}

/// JSON-RPC request envelope
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a, P> {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: &'static str,
    pub params: &'a P,
}

impl<'a, P> JsonRpcRequest<'a, P> {
    pub fn new(method: &'static str, params: &'a P) -> Self {
        Self {
            jsonrpc: "2.0",
            id: uuid::Uuid::new_v4().to_string(),
            method,
            params,
        }
    }
}

/// JSON-RPC response frame as carried in each SSE `data:` line
#[derive(Debug, Deserialize)]
pub struct JsonRpcFrame {
    #[serde(default)]
    pub result: Option<TaskUpdate>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_update_decodes() {
        let frame: JsonRpcFrame = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "result": {
                "id": "task-1",
                "status": {
                    "state": "working",
                    "message": { "role": "agent", "parts": [{ "type": "text", "text": "hmm" }] }
                },
                "final": false
            }
        }))
        .unwrap();

        let update = frame.result.unwrap();
        let status = update.status.unwrap();
        assert_eq!(status.state, TaskState::Working);
        assert_eq!(status.message.unwrap().parts, vec![Part::text("hmm")]);
        assert!(!update.is_final);
    }

    #[test]
    fn test_artifact_flags_default_false() {
        let update: TaskUpdate = serde_json::from_value(json!({
            "artifact": { "parts": [{ "type": "text", "text": "Hi" }] }
        }))
        .unwrap();

        let artifact = update.artifact.unwrap();
        assert!(!artifact.append);
        assert!(!artifact.last_chunk);
    }

    #[test]
    fn test_unknown_tags_are_tolerated() {
        let update: TaskUpdate = serde_json::from_value(json!({
            "status": {
                "state": "paused-for-lunch",
                "message": { "parts": [{ "type": "file", "file": { "uri": "x" } }] }
            }
        }))
        .unwrap();

        let status = update.status.unwrap();
        assert_eq!(status.state, TaskState::Unknown);
        assert_eq!(status.message.unwrap().parts, vec![Part::Unknown]);
    }

    #[test]
    fn test_outbound_payload_shape() {
        let params = SendTaskParams::user_text("req-1", "sess-1", "hello");
        let value = serde_json::to_value(JsonRpcRequest::new(SEND_SUBSCRIBE_METHOD, &params)).unwrap();

        assert_eq!(value["method"], "tasks/sendSubscribe");
        assert_eq!(value["params"]["id"], "req-1");
        assert_eq!(value["params"]["sessionId"], "sess-1");
        assert_eq!(value["params"]["acceptedOutputModes"], json!(["text", "data"]));
        assert_eq!(
            value["params"]["message"],
            json!({ "role": "user", "parts": [{ "type": "text", "text": "hello" }] })
        );
    }
}
