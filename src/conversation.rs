//! Conversation state: event classification, effects, and the message store
//!
//! Stream events are classified into [`Effect`]s by a pure function; the
//! store applies them. Derived views (the citation index) are rebuilt from
//! the store, never edited directly.

mod classify;
mod effect;
pub mod form;
pub mod research;
mod store;

#[cfg(test)]
mod proptests;

pub use classify::classify;
#[allow(unused_imports)] // Public API re-exports
pub use classify::{DataPayload, ToolCallSummary};
pub use effect::Effect;
#[allow(unused_imports)]
pub use form::FormSpec;
pub use form::{FormValidationError, FormValues};
#[allow(unused_imports)]
pub use research::Snippet;
pub use research::{Citation, ReferenceIndex, ResearchItem};
pub use store::{BatchOutcome, ConversationStore, Message, Role};
