//! Drives one backend stream into one outward byte stream.
//!
//! A [`StreamRelay`] is the single consumer of a [`GenerationStream`]: every
//! chunk is written to the client as soon as it arrives, the running text is
//! tracked in the [`StreamSession`] and handed to the [`ResponseSink`]. The
//! relay always ends with a persistence attempt followed by closing the writer,
//! whatever the terminal state.

use super::constants::GENERATION_ERROR_MESSAGE;
use super::storage::ResponseSink;
use super::writer::{FragmentWriter, WriterClosed};
use crate::generation::{BackendError, GenerationChunk, GenerationStream};
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Streaming,
    Completed,
    Canceled,
    Failed,
}

/// Per-request state. Never shared between requests.
#[derive(Debug)]
pub struct StreamSession {
    prompt_id: i32,
    cancel: CancellationToken,
    accumulator: String,
    state: RelayState,
}

impl StreamSession {
    pub fn new(prompt_id: i32, cancel: CancellationToken) -> Self {
        Self {
            prompt_id,
            cancel,
            accumulator: String::new(),
            state: RelayState::Idle,
        }
    }

    fn transition(&mut self, next: RelayState) {
        debug!(
            "Prompt {} stream: {:?} -> {:?}",
            self.prompt_id, self.state, next
        );
        self.state = next;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub state: RelayState,
    /// Last accumulated text, as handed to the sink
    pub text: String,
    /// Fragments delivered to the writer, sentinel excluded
    pub fragments: usize,
    /// Whether the final persistence write succeeded
    pub persisted: bool,
}

enum RelayEvent {
    Cancelled,
    Disconnected,
    Next(Option<Result<GenerationChunk, BackendError>>),
}

enum Delivery {
    Written,
    Cancelled,
    Closed,
}

/// Writes one fragment unless the session is cancelled first. A client that
/// stops reading leaves `write` pending on a full buffer, and cancellation
/// must still get through.
async fn deliver<W>(cancel: &CancellationToken, writer: &mut W, bytes: Bytes) -> Delivery
where
    W: FragmentWriter + ?Sized,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Delivery::Cancelled,
        written = writer.write(bytes) => match written {
            Ok(()) => Delivery::Written,
            Err(WriterClosed) => Delivery::Closed,
        },
    }
}

pub struct StreamRelay {
    sink: Arc<dyn ResponseSink>,
    persist_every_fragment: bool,
}

impl StreamRelay {
    pub fn new(sink: Arc<dyn ResponseSink>, persist_every_fragment: bool) -> Self {
        Self {
            sink,
            persist_every_fragment,
        }
    }

    pub async fn run<W>(
        &self,
        mut session: StreamSession,
        mut stream: GenerationStream,
        writer: &mut W,
    ) -> RelayOutcome
    where
        W: FragmentWriter + ?Sized,
    {
        session.transition(RelayState::Streaming);
        let mut fragments = 0usize;

        let terminal = loop {
            let event = tokio::select! {
                biased;
                _ = session.cancel.cancelled() => RelayEvent::Cancelled,
                _ = writer.closed() => RelayEvent::Disconnected,
                next = stream.next() => RelayEvent::Next(next),
            };

            match event {
                RelayEvent::Cancelled => break RelayState::Canceled,
                RelayEvent::Disconnected => {
                    debug!("Client disconnected from prompt {}", session.prompt_id);
                    session.cancel.cancel();
                    break RelayState::Canceled;
                }
                RelayEvent::Next(None) => {
                    // a paced source ends quietly once it sees the flag
                    if session.cancel.is_cancelled() {
                        break RelayState::Canceled;
                    }
                    break RelayState::Completed;
                }
                RelayEvent::Next(Some(Ok(chunk))) => {
                    if session.cancel.is_cancelled() {
                        break RelayState::Canceled;
                    }

                    if !chunk.text.is_empty() {
                        trace!(
                            "Prompt {} fragment {}: {} bytes",
                            session.prompt_id,
                            fragments + 1,
                            chunk.text.len()
                        );
                        match deliver(&session.cancel, writer, Bytes::from(chunk.text)).await {
                            Delivery::Written => fragments += 1,
                            Delivery::Cancelled => {
                                debug!("Prompt {} cancelled mid-write", session.prompt_id);
                                break RelayState::Canceled;
                            }
                            Delivery::Closed => {
                                debug!("Client stream for prompt {} went away", session.prompt_id);
                                session.cancel.cancel();
                                break RelayState::Canceled;
                            }
                        }
                    }

                    session.accumulator = chunk.cumulative;

                    if self.persist_every_fragment {
                        self.persist(&session).await;
                    }
                }
                RelayEvent::Next(Some(Err(e))) => {
                    error!("Generation failed for prompt {}: {}", session.prompt_id, e);
                    let marker = Bytes::from_static(GENERATION_ERROR_MESSAGE.as_bytes());
                    if !matches!(
                        deliver(&session.cancel, writer, marker).await,
                        Delivery::Written
                    ) {
                        warn!(
                            "Could not deliver error marker for prompt {}",
                            session.prompt_id
                        );
                    }
                    break RelayState::Failed;
                }
            }
        };

        // stop upstream work before the final save
        drop(stream);
        session.transition(terminal);

        let persisted = self.persist(&session).await;
        writer.close().await;

        RelayOutcome {
            state: session.state,
            text: session.accumulator,
            fragments,
            persisted,
        }
    }

    async fn persist(&self, session: &StreamSession) -> bool {
        match self
            .sink
            .update_response(session.prompt_id, &session.accumulator)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed to persist response for prompt {}: {:?}",
                    session.prompt_id, e
                );
                false
            }
        }
    }
}
