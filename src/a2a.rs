//! Agent transport abstraction
//!
//! Opens the incremental event stream for one task request. The runtime only
//! sees [`AgentTransport`]; the HTTP client is one implementation of it.

mod client;
mod error;
mod types;

pub use client::A2aHttpClient;
pub use error::TransportError;
#[allow(unused_imports)] // Public API re-exports
pub use error::TransportErrorKind;
pub use types::*;

use async_trait::async_trait;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;
use std::sync::Arc;

/// Events of one subscription. An `Err` item ends the subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, TransportError>> + Send>>;

/// Opens event subscriptions against an agent endpoint
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn open_stream(
        &self,
        endpoint: &str,
        params: &SendTaskParams,
    ) -> Result<EventStream, TransportError>;
}

#[async_trait]
impl<T: AgentTransport + ?Sized> AgentTransport for Arc<T> {
    async fn open_stream(
        &self,
        endpoint: &str,
        params: &SendTaskParams,
    ) -> Result<EventStream, TransportError> {
        (**self).open_stream(endpoint, params).await
    }
}

/// Logging wrapper for transports
pub struct LoggingTransport {
    inner: Arc<dyn AgentTransport>,
}

impl LoggingTransport {
    pub fn new(inner: Arc<dyn AgentTransport>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl AgentTransport for LoggingTransport {
    async fn open_stream(
        &self,
        endpoint: &str,
        params: &SendTaskParams,
    ) -> Result<EventStream, TransportError> {
        let start = std::time::Instant::now();
        let result = self.inner.open_stream(endpoint, params).await;
        let duration = start.elapsed();

        match result {
            Ok(stream) => {
                tracing::info!(
                    endpoint = %endpoint,
                    request_id = %params.id,
                    duration_ms = %duration.as_millis(),
                    "Task stream opened"
                );
                let request_id = params.id.clone();
                let mut frames: u64 = 0;
                Ok(Box::pin(stream.inspect(move |item| {
                    frames += 1;
                    if let Err(e) = item {
                        tracing::error!(
                            request_id = %request_id,
                            frames,
                            kind = %e.kind,
                            error = %e.message,
                            "Task stream failed"
                        );
                    }
                })))
            }
            Err(e) => {
                tracing::error!(
                    endpoint = %endpoint,
                    request_id = %params.id,
                    duration_ms = %duration.as_millis(),
                    kind = %e.kind,
                    error = %e.message,
                    "Task stream could not be opened"
                );
                Err(e)
            }
        }
    }
}
