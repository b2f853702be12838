//! Persistence of streamed response text

use crate::db::{DBConnection, DBError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

/// Store keyed by prompt id that receives the accumulated response text
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn update_response(&self, prompt_id: i32, text: &str) -> Result<(), DBError>;
}

/// Writes through to the `prompts.response` column
pub struct PromptResponseSink {
    db: Arc<dyn DBConnection + Send + Sync>,
}

impl PromptResponseSink {
    pub fn new(db: Arc<dyn DBConnection + Send + Sync>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResponseSink for PromptResponseSink {
    async fn update_response(&self, prompt_id: i32, text: &str) -> Result<(), DBError> {
        trace!("Persisting {} bytes for prompt {}", text.len(), prompt_id);
        let db = self.db.clone();
        let text = text.to_string();
        // diesel calls block, keep them off the runtime workers
        tokio::task::spawn_blocking(move || db.update_prompt_response(prompt_id, &text))
            .await
            .map_err(|e| DBError::TaskError(e.to_string()))?
    }
}
