//! Conversation runtime executor

use super::aggregator::{StreamAggregator, TurnError, TurnRequest};
use super::{
    Command, ConversationSnapshot, ConversationUpdate, Delivery, MessageView, RuntimeHandle,
    TurnAccepted,
};
use crate::a2a::AgentTransport;
use crate::conversation::BatchOutcome;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

const COMMAND_BUFFER: usize = 64;
const BROADCAST_BUFFER: usize = 256;

/// Owns the aggregator and serialises every command and stream delivery
pub struct ConversationRuntime<T>
where
    T: AgentTransport + 'static,
{
    aggregator: StreamAggregator,
    transport: Arc<T>,
    command_rx: mpsc::Receiver<Command>,
    /// Handed to subscription tasks; weak so the loop ends once every handle is gone
    command_tx: mpsc::WeakSender<Command>,
    broadcast_tx: broadcast::Sender<ConversationUpdate>,
}

impl<T> ConversationRuntime<T>
where
    T: AgentTransport + 'static,
{
    /// Spawn the runtime task and return a handle to it
    pub fn start(transport: T) -> RuntimeHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_BUFFER);

        let runtime = Self {
            aggregator: StreamAggregator::new(),
            transport: Arc::new(transport),
            command_rx,
            command_tx: command_tx.downgrade(),
            broadcast_tx: broadcast_tx.clone(),
        };
        tokio::spawn(runtime.run());

        RuntimeHandle {
            command_tx,
            broadcast_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Starting conversation runtime");

        while let Some(command) = self.command_rx.recv().await {
            self.process_command(command);
        }

        self.aggregator.end_session();
        tracing::info!("Conversation runtime stopped");
    }

    fn process_command(&mut self, command: Command) {
        match command {
            Command::SelectTarget { target, reply } => {
                let session = self.aggregator.select_target(target).clone();
                self.broadcast_reset();
                let _ = reply.send(session);
            }

            Command::EndSession { reply } => {
                self.aggregator.end_session();
                self.broadcast_reset();
                let _ = reply.send(());
            }

            Command::SubmitPrompt { prompt, reply } => {
                let result = self
                    .ensure_idle()
                    .and_then(|()| self.aggregator.submit_user_turn(&prompt));
                let _ = reply.send(self.start_turn(result));
            }

            Command::SubmitForm {
                message_id,
                values,
                reply,
            } => {
                let result = self
                    .ensure_idle()
                    .and_then(|()| self.aggregator.submit_form_turn(&message_id, values));
                let _ = reply.send(self.start_turn(result));
            }

            Command::Cancel { reply } => {
                let closed = self.aggregator.cancel();
                self.broadcast_closed(&closed);
                let _ = reply.send(closed);
            }

            Command::Snapshot { reply } => {
                let _ = reply.send(ConversationSnapshot::capture(&self.aggregator));
            }

            Command::Deliver {
                generation,
                message_id,
                delivery,
            } => self.process_delivery(generation, &message_id, delivery),
        }
    }

    fn ensure_idle(&self) -> Result<(), TurnError> {
        if self.aggregator.is_streaming() {
            Err(TurnError::TurnInProgress)
        } else {
            Ok(())
        }
    }

    fn start_turn(
        &mut self,
        result: Result<TurnRequest, TurnError>,
    ) -> Result<TurnAccepted, TurnError> {
        let turn = result.inspect_err(|e| tracing::info!(error = %e, "Turn rejected"))?;

        self.broadcast_message(&turn.user_message_id);
        self.broadcast_message(&turn.message_id);

        let accepted = TurnAccepted {
            user_message_id: turn.user_message_id.clone(),
            agent_message_id: turn.message_id.clone(),
        };
        self.spawn_subscription(turn);
        Ok(accepted)
    }

    /// Open the stream for `turn` in a background task.
    ///
    /// The task forwards every item as a `Deliver` command and stops at the
    /// end of the stream, after an error, or when its token fires.
    fn spawn_subscription(&mut self, turn: TurnRequest) {
        let Some(command_tx) = self.command_tx.upgrade() else {
            return;
        };
        let cancel_token = CancellationToken::new();
        self.aggregator
            .track_subscription(&turn.message_id, cancel_token.clone());
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            let TurnRequest {
                generation,
                message_id,
                endpoint,
                params,
                ..
            } = turn;
            let deliver = |delivery| Command::Deliver {
                generation,
                message_id: message_id.clone(),
                delivery,
            };

            let opened = tokio::select! {
                biased;
                () = cancel_token.cancelled() => {
                    tracing::debug!(message_id = %message_id, "Subscription cancelled before open");
                    return;
                }
                result = transport.open_stream(&endpoint, &params) => result,
            };

            let mut stream = match opened {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = command_tx.send(deliver(Delivery::Error(e))).await;
                    return;
                }
            };

            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel_token.cancelled() => {
                        tracing::debug!(message_id = %message_id, "Subscription cancelled");
                        return;
                    }
                    item = stream.next() => item,
                };

                let (delivery, last) = match next {
                    Some(Ok(event)) => (Delivery::Event(event), false),
                    Some(Err(e)) => (Delivery::Error(e), true),
                    None => (Delivery::Closed, true),
                };
                if command_tx.send(deliver(delivery)).await.is_err() || last {
                    return;
                }
            }
        });
    }

    fn process_delivery(&mut self, generation: u64, message_id: &str, delivery: Delivery) {
        match delivery {
            Delivery::Event(event) => {
                let Some(outcome) = self.aggregator.handle_event(generation, message_id, &event)
                else {
                    return;
                };
                self.broadcast_outcome(message_id, &outcome);
            }

            Delivery::Error(error) => {
                if !self.aggregator.handle_transport_error(generation, message_id, &error) {
                    return;
                }
                self.broadcast_message(message_id);
                if let Some(message) = self.aggregator.error() {
                    let _ = self.broadcast_tx.send(ConversationUpdate::Error {
                        message: message.to_string(),
                    });
                }
                self.broadcast_closed(&[message_id.to_string()]);
            }

            Delivery::Closed => {
                if self.aggregator.handle_stream_closed(generation, message_id) {
                    self.broadcast_message(message_id);
                    self.broadcast_closed(&[message_id.to_string()]);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Broadcasts
    // ------------------------------------------------------------------

    fn broadcast_outcome(&self, message_id: &str, outcome: &BatchOutcome) {
        if outcome.dropped > 0 {
            tracing::debug!(
                message_id = %message_id,
                dropped = outcome.dropped,
                "Event arrived after the message closed"
            );
        }
        if outcome.applied == 0 {
            return;
        }
        if outcome.research_changed {
            let _ = self.broadcast_tx.send(ConversationUpdate::References {
                references: self.aggregator.index().clone(),
            });
        }
        self.broadcast_message(message_id);
        for closed in &outcome.closed {
            let _ = self.broadcast_tx.send(ConversationUpdate::TurnDone {
                message_id: closed.clone(),
            });
        }
    }

    fn broadcast_message(&self, message_id: &str) {
        if let Some(message) = self.aggregator.store().message(message_id) {
            let _ = self.broadcast_tx.send(ConversationUpdate::Message {
                message: MessageView::build(&self.aggregator, message),
            });
        }
    }

    /// Send the final state of each closed message, then its `TurnDone`
    fn broadcast_closed(&self, message_ids: &[String]) {
        for message_id in message_ids {
            self.broadcast_message(message_id);
            let _ = self.broadcast_tx.send(ConversationUpdate::TurnDone {
                message_id: message_id.clone(),
            });
        }
    }

    fn broadcast_reset(&self) {
        let _ = self.broadcast_tx.send(ConversationUpdate::Reset {
            snapshot: ConversationSnapshot::capture(&self.aggregator),
        });
    }
}
