//! OpenAI-compatible chat completions backend (`stream: true`).

use super::backend::{accumulate, GenerationStream, ModelBackend};
use super::error::{check_status, BackendError};
use super::sse::SseFrameBuffer;
use super::STREAM_CHUNK_TIMEOUT_SECS;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com";

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
    model: String,
}

impl OpenAiBackend {
    pub fn new(client: Client, config: OpenAiConfig, model: impl Into<String>) -> Self {
        Self {
            client,
            config,
            model: model.into(),
        }
    }
}

impl ModelBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn generate(&self, prompt: &str, _cancel: CancellationToken) -> GenerationStream {
        accumulate(openai_deltas(
            self.client.clone(),
            self.config.clone(),
            self.model.clone(),
            prompt.to_string(),
        ))
    }
}

/// Outcome of parsing one completion frame
#[derive(Debug, PartialEq, Eq)]
pub enum CompletionFrame {
    Delta(String),
    Empty,
    Done,
}

fn openai_deltas(
    client: Client,
    config: OpenAiConfig,
    model: String,
    prompt: String,
) -> impl Stream<Item = Result<String, BackendError>> + Send + 'static {
    async_stream::try_stream! {
        let url = format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/'));
        debug!("Sending chat completion request for model {}", model);

        let res = client
            .post(&url)
            .bearer_auth(&config.api_key)
            .json(&json!({
                "model": model,
                "messages": [{ "role": "user", "content": prompt }],
                "stream": true
            }))
            .send()
            .await?;

        let res = check_status(res, "Chat completion").await?;
        let mut body = res.bytes_stream();
        let mut frames = SseFrameBuffer::new();
        let mut done = false;

        'read: loop {
            let next = timeout(Duration::from_secs(STREAM_CHUNK_TIMEOUT_SECS), body.next())
                .await
                .map_err(|_| BackendError::Timeout(STREAM_CHUNK_TIMEOUT_SECS))?;

            let Some(bytes) = next else {
                break;
            };
            frames.push(&bytes?);

            while let Some(data) = frames.next_data() {
                match parse_completion_frame(&data)? {
                    CompletionFrame::Delta(text) => {
                        yield text;
                    }
                    CompletionFrame::Empty => {}
                    CompletionFrame::Done => {
                        done = true;
                        break 'read;
                    }
                }
            }
        }

        // body ended without [DONE]: the last frame may lack its blank line
        if !done {
            if let Some(data) = frames.finish() {
                if let CompletionFrame::Delta(text) = parse_completion_frame(&data)? {
                    yield text;
                }
            }
        }
        trace!("Chat completion stream finished");
    }
}

pub fn parse_completion_frame(data: &str) -> Result<CompletionFrame, BackendError> {
    if data.trim() == DONE_SENTINEL {
        return Ok(CompletionFrame::Done);
    }

    let json: Value =
        serde_json::from_str(data).map_err(|e| BackendError::Malformed(e.to_string()))?;

    if let Some(err) = json.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(BackendError::Provider(message));
    }

    match json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
    {
        Some(content) if !content.is_empty() => Ok(CompletionFrame::Delta(content.to_string())),
        _ => Ok(CompletionFrame::Empty),
    }
}
