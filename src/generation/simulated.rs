use super::backend::{accumulate, GenerationStream, ModelBackend};
use super::chunk_source::{chunk_stream, ChunkOptions};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Canned markdown reply streamed by the simulated backend
pub const SIMULATED_RESPONSE: &str = r#"# Simulated Response

This reply was produced by the built-in simulated model. It streams a fixed
markdown document so the chat interface can be exercised without an API key.

## What you can try

- Star this response and find it again on the starred page
- Switch to another model in the selector and ask again
- Press stop while the text is still arriving

## Notes

Each fragment is sent as soon as it is produced, and the full text is saved
with the prompt once the stream ends.
"#;

/// Streams a fixed body through the chunk source, ignoring the prompt
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    body: String,
    options: ChunkOptions,
}

impl SimulatedBackend {
    pub fn new(body: impl Into<String>, options: ChunkOptions) -> Self {
        Self {
            body: body.into(),
            options,
        }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(SIMULATED_RESPONSE, ChunkOptions::default())
    }
}

impl ModelBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn generate(&self, _prompt: &str, cancel: CancellationToken) -> GenerationStream {
        accumulate(chunk_stream(self.body.clone(), self.options, cancel).map(Ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_chunks_carry_running_total() {
        let backend = SimulatedBackend::new("ABCDEFGHIJ", ChunkOptions::new(Duration::ZERO, 3));
        let chunks: Vec<_> = backend
            .generate("ignored", CancellationToken::new())
            .map(|c| c.expect("simulated backend never fails"))
            .collect()
            .await;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let totals: Vec<&str> = chunks.iter().map(|c| c.cumulative.as_str()).collect();
        assert_eq!(texts, vec!["ABC", "DEF", "GHI", "J"]);
        assert_eq!(totals, vec!["ABC", "ABCDEF", "ABCDEFGHI", "ABCDEFGHIJ"]);
    }

    #[tokio::test]
    async fn test_each_call_starts_over() {
        let backend = SimulatedBackend::new("xyz", ChunkOptions::new(Duration::ZERO, 2));
        for _ in 0..2 {
            let last = backend
                .generate("p", CancellationToken::new())
                .collect::<Vec<_>>()
                .await
                .pop();
            assert!(matches!(last, Some(Ok(c)) if c.cumulative == "xyz"));
        }
    }

    #[tokio::test]
    async fn test_default_body_is_canned_response() {
        let backend = SimulatedBackend {
            options: ChunkOptions::new(Duration::ZERO, 64),
            ..SimulatedBackend::default()
        };
        let last = backend
            .generate("hi", CancellationToken::new())
            .collect::<Vec<_>>()
            .await
            .pop();
        assert!(matches!(last, Some(Ok(c)) if c.cumulative == SIMULATED_RESPONSE));
    }
}
