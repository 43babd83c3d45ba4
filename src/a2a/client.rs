//! HTTP/SSE transport for A2A agents

use super::types::{JsonRpcFrame, JsonRpcRequest, SendTaskParams, StreamEvent, SEND_SUBSCRIBE_METHOD};
use super::{AgentTransport, EventStream, TransportError};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::time::Duration;

/// Opens `tasks/sendSubscribe` streams over HTTP
pub struct A2aHttpClient {
    client: Client,
}

impl A2aHttpClient {
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AgentTransport for A2aHttpClient {
    async fn open_stream(
        &self,
        endpoint: &str,
        params: &SendTaskParams,
    ) -> Result<EventStream, TransportError> {
        let body = JsonRpcRequest::new(SEND_SUBSCRIBE_METHOD, params);

        let response = self
            .client
            .post(endpoint)
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let events = response
            .bytes_stream()
            .eventsource()
            .filter_map(|frame| async move {
                match frame {
                    Ok(event) => decode_frame(&event.data),
                    Err(e) => Some(Err(TransportError::network(e.to_string()))),
                }
            });

        Ok(Box::pin(events))
    }
}

/// Decode one SSE `data:` payload.
///
/// Blank and undecodable frames yield `None`; a JSON-RPC error member is a
/// transport error.
fn decode_frame(data: &str) -> Option<Result<StreamEvent, TransportError>> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<JsonRpcFrame>(trimmed) {
        Ok(JsonRpcFrame {
            error: Some(err), ..
        }) => Some(Err(TransportError::protocol(format!(
            "{} (code {})",
            err.message, err.code
        )))),
        Ok(JsonRpcFrame { result, .. }) => Some(Ok(StreamEvent { result })),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping undecodable stream frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::{TaskState, TransportErrorKind};

    #[test]
    fn test_decode_result_frame() {
        let event = decode_frame(
            r#"{"jsonrpc":"2.0","id":"x","result":{"status":{"state":"completed"},"final":true}}"#,
        )
        .unwrap()
        .unwrap();

        let update = event.result.unwrap();
        assert!(update.is_final);
        assert_eq!(update.status.unwrap().state, TaskState::Completed);
    }

    #[test]
    fn test_decode_error_frame() {
        let err = decode_frame(r#"{"jsonrpc":"2.0","id":"x","error":{"code":-32001,"message":"Task not found"}}"#)
            .unwrap()
            .unwrap_err();

        assert_eq!(err.kind, TransportErrorKind::Protocol);
        assert!(err.message.contains("Task not found"));
    }

    #[test]
    fn test_garbage_and_blank_frames_are_skipped() {
        assert!(decode_frame("   ").is_none());
        assert!(decode_frame("not json at all").is_none());
    }
}
