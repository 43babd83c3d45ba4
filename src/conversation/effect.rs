//! Effects produced by classifying stream events

use super::form::FormSpec;
use super::research::ResearchItem;

/// One state mutation for the conversation store
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a fragment to the message's thinking trace
    AppendThinking { message_id: String, text: String },

    /// Append a tool call / tool result line to the status trace
    AppendStatus { message_id: String, text: String },

    /// Add tool results to the message's research items
    RecordResearch {
        message_id: String,
        items: Vec<ResearchItem>,
    },

    /// Replace the message text, or extend it when `append` is set
    UpdateText {
        message_id: String,
        text: String,
        append: bool,
    },

    /// Attach a form and end the turn pending user input
    AttachForm { message_id: String, form: FormSpec },

    /// End streaming for the message
    Terminate { message_id: String },

    /// Transport failure; replaces the text with the error and ends streaming
    Fail { message_id: String, error: String },
}

impl Effect {
    pub fn append_thinking(message_id: &str, text: impl Into<String>) -> Self {
        Effect::AppendThinking {
            message_id: message_id.to_string(),
            text: text.into(),
        }
    }

    pub fn append_status(message_id: &str, text: impl Into<String>) -> Self {
        Effect::AppendStatus {
            message_id: message_id.to_string(),
            text: text.into(),
        }
    }

    pub fn update_text(message_id: &str, text: impl Into<String>, append: bool) -> Self {
        Effect::UpdateText {
            message_id: message_id.to_string(),
            text: text.into(),
            append,
        }
    }

    pub fn terminate(message_id: &str) -> Self {
        Effect::Terminate {
            message_id: message_id.to_string(),
        }
    }

    pub fn fail(message_id: &str, error: impl Into<String>) -> Self {
        Effect::Fail {
            message_id: message_id.to_string(),
            error: error.into(),
        }
    }

    /// Message this effect targets
    pub fn message_id(&self) -> &str {
        match self {
            Effect::AppendThinking { message_id, .. }
            | Effect::AppendStatus { message_id, .. }
            | Effect::RecordResearch { message_id, .. }
            | Effect::UpdateText { message_id, .. }
            | Effect::AttachForm { message_id, .. }
            | Effect::Terminate { message_id }
            | Effect::Fail { message_id, .. } => message_id,
        }
    }

    /// Whether applying this effect ends streaming
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Effect::AttachForm { .. } | Effect::Terminate { .. } | Effect::Fail { .. }
        )
    }
}
