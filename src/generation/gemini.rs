//! Google Gemini backend over the Generative Language streaming API.

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

pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-pro";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(client: Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }
}

impl ModelBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn generate(&self, prompt: &str, _cancel: CancellationToken) -> GenerationStream {
        accumulate(gemini_deltas(
            self.client.clone(),
            self.config.clone(),
            prompt.to_string(),
        ))
    }
}

fn gemini_deltas(
    client: Client,
    config: GeminiConfig,
    prompt: String,
) -> impl Stream<Item = Result<String, BackendError>> + Send + 'static {
    async_stream::try_stream! {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        debug!("Sending Gemini streaming request for model {}", config.model);

        let res = client
            .post(&url)
            .header("x-goog-api-key", &config.api_key)
            .json(&json!({
                "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await?;

        let res = check_status(res, "Gemini").await?;
        let mut body = res.bytes_stream();
        let mut frames = SseFrameBuffer::new();

        loop {
            let next = timeout(Duration::from_secs(STREAM_CHUNK_TIMEOUT_SECS), body.next())
                .await
                .map_err(|_| BackendError::Timeout(STREAM_CHUNK_TIMEOUT_SECS))?;

            let Some(bytes) = next else {
                break;
            };
            frames.push(&bytes?);

            while let Some(data) = frames.next_data() {
                if let Some(text) = parse_gemini_frame(&data)? {
                    yield text;
                }
            }
        }

        if let Some(data) = frames.finish() {
            if let Some(text) = parse_gemini_frame(&data)? {
                yield text;
            }
        }
        trace!("Gemini stream finished");
    }
}

/// Text carried by one `streamGenerateContent` frame, `None` when the frame
/// holds no text (for example a trailing usage-only frame).
pub fn parse_gemini_frame(data: &str) -> Result<Option<String>, BackendError> {
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

    if let Some(reason) = json
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Err(BackendError::Provider(format!("Prompt blocked: {}", reason)));
    }

    let text: String = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_stub;
    use axum::http::StatusCode;

    async fn backend_for(status: StatusCode, body: &'static str) -> GeminiBackend {
        let base_url = serve_stub(status, body).await;
        GeminiBackend::new(
            Client::new(),
            GeminiConfig {
                api_key: "test-key".to_string(),
                base_url,
                model: GEMINI_DEFAULT_MODEL.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_generate_streams_text_frames() {
        let backend = backend_for(
            StatusCode::OK,
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hello\"}]}}]}\r\n\r\n\
             data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\" world\"}]}}]}\r\n\r\n\
             data: {\"candidates\":[{\"content\":{\"parts\":[]},\"finishReason\":\"STOP\"}]}",
        )
        .await;

        let chunks: Vec<_> = backend
            .generate("hi", CancellationToken::new())
            .collect()
            .await;
        let chunks: Vec<_> = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].cumulative, "Hello world");
    }

    #[tokio::test]
    async fn test_generate_reports_error_status() {
        let backend = backend_for(StatusCode::TOO_MANY_REQUESTS, "quota exceeded").await;

        let chunks: Vec<_> = backend
            .generate("hi", CancellationToken::new())
            .collect()
            .await;
        assert_eq!(chunks.len(), 1);
        assert!(matches!(
            &chunks[0],
            Err(BackendError::Status { status: 429, body }) if body == "quota exceeded"
        ));
    }

    #[tokio::test]
    async fn test_generate_stops_at_provider_error_frame() {
        let backend = backend_for(
            StatusCode::OK,
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Par\"}]}}]}\n\n\
             data: {\"error\":{\"code\":500,\"message\":\"Internal error\"}}\n\n\
             data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"tial\"}]}}]}\n\n",
        )
        .await;

        let chunks: Vec<_> = backend
            .generate("hi", CancellationToken::new())
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap().text, "Par");
        assert!(matches!(&chunks[1], Err(BackendError::Provider(m)) if m == "Internal error"));
    }

    #[test]
    fn test_parse_text_parts() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"Hello"},{"text":" there"}],"role":"model"}}]}"#;
        assert_eq!(
            parse_gemini_frame(data).unwrap().as_deref(),
            Some("Hello there")
        );
    }

    #[test]
    fn test_parse_frame_without_text() {
        let data = r#"{"candidates":[{"content":{"parts":[]},"finishReason":"STOP"}],"usageMetadata":{"totalTokenCount":12}}"#;
        assert_eq!(parse_gemini_frame(data).unwrap(), None);
    }

    #[test]
    fn test_parse_error_object() {
        let data = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = parse_gemini_frame(data).unwrap_err();
        assert!(matches!(err, BackendError::Provider(m) if m == "Resource has been exhausted"));
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let data = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert!(matches!(
            parse_gemini_frame(data),
            Err(BackendError::Provider(m)) if m.contains("SAFETY")
        ));
    }

    #[test]
    fn test_parse_malformed_json() {
        assert!(matches!(
            parse_gemini_frame("{not json"),
            Err(BackendError::Malformed(_))
        ));
    }
}
