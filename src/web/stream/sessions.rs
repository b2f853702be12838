//! Registry of prompts that currently have a stream running in this process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Default)]
pub struct ActiveStreams {
    streams: Mutex<HashMap<i32, CancellationToken>>,
}

impl ActiveStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `prompt_id` for a new stream. Returns `None` while another stream
    /// for the same prompt is still running.
    pub fn register(self: &Arc<Self>, prompt_id: i32) -> Option<StreamGuard> {
        let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        if streams.contains_key(&prompt_id) {
            return None;
        }

        let cancel = CancellationToken::new();
        streams.insert(prompt_id, cancel.clone());
        debug!("Registered stream for prompt {}", prompt_id);

        Some(StreamGuard {
            registry: Arc::clone(self),
            prompt_id,
            cancel,
        })
    }

    /// Raise the cancellation flag of a running stream. `false` if none runs.
    pub fn cancel(&self, prompt_id: i32) -> bool {
        let streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        match streams.get(&prompt_id) {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, prompt_id: i32) -> bool {
        self.streams
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&prompt_id)
    }

    fn release(&self, prompt_id: i32) {
        self.streams
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&prompt_id);
        debug!("Released stream for prompt {}", prompt_id);
    }
}

/// Held by the relay task; frees the prompt when dropped.
pub struct StreamGuard {
    registry: Arc<ActiveStreams>,
    prompt_id: i32,
    cancel: CancellationToken,
}

impl StreamGuard {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.registry.release(self.prompt_id);
    }
}
