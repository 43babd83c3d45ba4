//! Server-Sent Events support

use crate::runtime::{ConversationSnapshot, ConversationUpdate};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream, starting with a full snapshot
pub fn sse_stream(
    init: ConversationSnapshot,
    broadcast_rx: tokio::sync::broadcast::Receiver<ConversationUpdate>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move {
        Ok(to_sse_event("init", json!({ "type": "init", "snapshot": init })))
    });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(update) => Some(Ok(update_to_axum(update))),
        Err(e) => {
            tracing::warn!(error = %e, "SSE client lagged; skipping updates");
            None
        }
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn update_to_axum(update: ConversationUpdate) -> Event {
    match update {
        ConversationUpdate::Reset { snapshot } => to_sse_event(
            "reset",
            json!({ "type": "reset", "snapshot": snapshot }),
        ),
        ConversationUpdate::Message { message } => to_sse_event(
            "message",
            json!({ "type": "message", "message": message }),
        ),
        ConversationUpdate::References { references } => to_sse_event(
            "references",
            json!({ "type": "references", "references": references }),
        ),
        ConversationUpdate::TurnDone { message_id } => to_sse_event(
            "turn_done",
            json!({ "type": "turn_done", "message_id": message_id }),
        ),
        ConversationUpdate::Error { message } => to_sse_event(
            "error",
            json!({ "type": "error", "message": message }),
        ),
    }
}

fn to_sse_event(event_type: &str, data: serde_json::Value) -> Event {
    Event::default().event(event_type).data(data.to_string())
}

