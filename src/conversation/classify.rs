//! Pure event classification
//!
//! Maps one stream event to the ordered list of store effects it implies.
//! No I/O and no access to current state: the same event always yields the
//! same effects.

use super::effect::Effect;
use super::form::FormSpec;
use super::research::{lenient_optional_string, ResearchItem};
use crate::a2a::{Artifact, Part, StreamEvent, TaskState, TaskStatus};
use serde::Deserialize;
use serde_json::Value;

/// Joins the `display` fields of a tool payload into one status line.
/// Used for prompt and form turns alike, so each tool reads on its own line.
const STATUS_SEPARATOR: &str = "\n";

/// Entry of a `tool_calls` payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolCallSummary {
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub display: Option<String>,
}

/// Decoded payload of a data part
#[derive(Debug, Clone, PartialEq)]
pub enum DataPayload {
    ToolCalls(Vec<ToolCallSummary>),
    /// One `display` per entry, in order, and every entry that decoded
    ToolResult {
        displays: Vec<Option<String>>,
        items: Vec<ResearchItem>,
    },
    Form(FormSpec),
    Unknown,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedPayload {
    ToolCalls {
        #[serde(default)]
        data: Vec<ToolCallSummary>,
    },
    ToolResult {
        #[serde(default)]
        data: Vec<Value>,
    },
    Form(FormSpec),
}

impl DataPayload {
    /// Decode a raw data part; anything unrecognised or malformed is `Unknown`
    pub fn from_value(value: &Value) -> Self {
        match TaggedPayload::deserialize(value) {
            Ok(TaggedPayload::ToolCalls { data }) => DataPayload::ToolCalls(data),
            Ok(TaggedPayload::ToolResult { data }) => {
                let displays: Vec<_> = data.iter().map(display_of).collect();
                let items: Vec<_> = data
                    .into_iter()
                    .enumerate()
                    .filter_map(|(position, entry)| match serde_json::from_value::<ResearchItem>(entry) {
                        Ok(item) => Some(item),
                        Err(e) => {
                            tracing::debug!(position, error = %e, "Dropping undecodable tool result entry");
                            None
                        }
                    })
                    .collect();
                DataPayload::ToolResult { displays, items }
            }
            Ok(TaggedPayload::Form(spec)) => DataPayload::Form(spec),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unrecognised data part");
                DataPayload::Unknown
            }
        }
    }
}

/// Classify one event for the agent message it feeds
pub fn classify(message_id: &str, event: &StreamEvent) -> Vec<Effect> {
    let Some(update) = &event.result else {
        return Vec::new();
    };

    let mut effects = Vec::new();

    if let Some(status) = &update.status {
        classify_status(message_id, status, &mut effects);
    }

    if let Some(artifact) = &update.artifact {
        classify_artifact(message_id, artifact, &mut effects);
    }

    let status_ends_turn = update
        .status
        .as_ref()
        .is_some_and(|status| status.state.ends_turn());

    if (update.is_final || status_ends_turn)
        && !matches!(effects.last(), Some(Effect::Terminate { .. }))
    {
        effects.push(Effect::terminate(message_id));
    }

    effects
}

fn classify_status(message_id: &str, status: &TaskStatus, effects: &mut Vec<Effect>) {
    if status.state != TaskState::Working {
        return;
    }
    let Some(message) = &status.message else {
        return;
    };

    for part in &message.parts {
        match part {
            Part::Text { text } if !text.is_empty() => {
                effects.push(Effect::append_thinking(message_id, text.as_str()));
            }
            Part::Data { data } => match DataPayload::from_value(data) {
                DataPayload::ToolCalls(calls) => {
                    let line = join_display(calls.iter().map(|c| c.display.as_deref()));
                    effects.push(Effect::append_status(message_id, line));
                }
                DataPayload::ToolResult { displays, items } => {
                    let line = join_display(displays.iter().map(Option::as_deref));
                    if !items.is_empty() {
                        effects.push(Effect::RecordResearch {
                            message_id: message_id.to_string(),
                            items,
                        });
                    }
                    effects.push(Effect::append_status(message_id, line));
                }
                DataPayload::Form(_) | DataPayload::Unknown => {}
            },
            Part::Text { .. } | Part::Unknown => {}
        }
    }
}

fn classify_artifact(message_id: &str, artifact: &Artifact, effects: &mut Vec<Effect>) {
    for part in &artifact.parts {
        match part {
            Part::Text { text } if !text.is_empty() => {
                effects.push(Effect::update_text(message_id, text.as_str(), artifact.append));
            }
            Part::Data { data } => {
                if let DataPayload::Form(form) = DataPayload::from_value(data) {
                    effects.push(Effect::AttachForm {
                        message_id: message_id.to_string(),
                        form,
                    });
                }
            }
            Part::Text { .. } | Part::Unknown => {}
        }
    }

    if artifact.last_chunk {
        effects.push(Effect::terminate(message_id));
    }
}

fn display_of(entry: &Value) -> Option<String> {
    match entry.get("display")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn join_display<'a>(displays: impl Iterator<Item = Option<&'a str>>) -> String {
    displays
        .map(Option::unwrap_or_default)
        .collect::<Vec<_>>()
        .join(STATUS_SEPARATOR)
}
