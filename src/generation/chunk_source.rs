//! Time-paced chunking of a fixed text body.
//!
//! Produces the fragments a simulated model "generates": consecutive slices of
//! the body, `chunk_size` characters each, separated by a fixed delay.

use futures::Stream;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub const DEFAULT_DELAY_MS: u64 = 100;
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Pacing parameters for a chunk source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub delay: Duration,
    pub chunk_size: usize,
}

impl ChunkOptions {
    /// A chunk size of zero is clamped to one.
    pub fn new(delay: Duration, chunk_size: usize) -> Self {
        Self {
            delay,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DELAY_MS), DEFAULT_CHUNK_SIZE)
    }
}

/// Byte offset just past the first `n` characters of `text`
fn char_boundary(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Lazily splits `body` into fragments of at most `options.chunk_size`
/// characters.
///
/// The delay is only awaited between two fragments, so the first fragment is
/// produced immediately and the stream ends as soon as the last one is taken.
/// `cancel` is polled before every fragment; once set, the rest of the body is
/// never produced.
pub fn chunk_stream(
    body: String,
    options: ChunkOptions,
    cancel: CancellationToken,
) -> impl Stream<Item = String> + Send + 'static {
    async_stream::stream! {
        let chunk_size = options.chunk_size.max(1);
        let mut offset = 0usize;
        let mut produced = 0usize;

        while offset < body.len() {
            if produced > 0 && !options.delay.is_zero() {
                tokio::time::sleep(options.delay).await;
            }

            if cancel.is_cancelled() {
                trace!("Chunk source cancelled after {} fragments", produced);
                break;
            }

            let rest = &body[offset..];
            let end = char_boundary(rest, chunk_size);
            let fragment = rest[..end].to_string();
            offset += end;
            produced += 1;

            yield fragment;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect(body: &str, chunk_size: usize) -> Vec<String> {
        chunk_stream(
            body.to_string(),
            ChunkOptions::new(Duration::ZERO, chunk_size),
            CancellationToken::new(),
        )
        .collect()
        .await
    }

    #[tokio::test]
    async fn test_splits_into_expected_fragments() {
        let fragments = collect("ABCDEFGHIJ", 3).await;
        assert_eq!(fragments, vec!["ABC", "DEF", "GHI", "J"]);
    }

    #[tokio::test]
    async fn test_even_division_keeps_full_last_fragment() {
        let fragments = collect("ABCDEF", 3).await;
        assert_eq!(fragments, vec!["ABC", "DEF"]);
    }

    #[tokio::test]
    async fn test_empty_body_yields_nothing() {
        assert!(collect("", 4).await.is_empty());
    }

    #[tokio::test]
    async fn test_concatenation_reproduces_body() {
        let body = "Streaming # heading\n- item one\n- item two\nwith ünïcödé and 漢字 text";
        for chunk_size in 1..=17 {
            let fragments = collect(body, chunk_size).await;
            assert_eq!(fragments.concat(), body);

            let chars = body.chars().count();
            assert_eq!(fragments.len(), chars.div_ceil(chunk_size));
            assert!(fragments
                .iter()
                .all(|f| f.chars().count() <= chunk_size && !f.is_empty()));
        }
    }

    #[tokio::test]
    async fn test_zero_chunk_size_is_clamped() {
        let options = ChunkOptions::new(Duration::ZERO, 0);
        assert_eq!(options.chunk_size, 1);
        let fragments: Vec<String> =
            chunk_stream("abc".to_string(), options, CancellationToken::new())
                .collect()
                .await;
        assert_eq!(fragments, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_fragment() {
        let cancel = CancellationToken::new();
        let mut stream = Box::pin(chunk_stream(
            "ABCDEFGHIJKLMNO".to_string(),
            ChunkOptions::new(Duration::ZERO, 3),
            cancel.clone(),
        ));

        assert_eq!(stream.next().await.as_deref(), Some("ABC"));
        assert_eq!(stream.next().await.as_deref(), Some("DEF"));
        cancel.cancel();
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_yields_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let fragments: Vec<String> = chunk_stream(
            "ABCDEF".to_string(),
            ChunkOptions::new(Duration::ZERO, 2),
            cancel,
        )
        .collect()
        .await;
        assert!(fragments.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_fragments() {
        let delay = Duration::from_millis(100);
        let start = tokio::time::Instant::now();
        let mut stream = Box::pin(chunk_stream(
            "ABCDEFGHI".to_string(),
            ChunkOptions::new(delay, 3),
            CancellationToken::new(),
        ));

        assert_eq!(stream.next().await.as_deref(), Some("ABC"));
        assert!(start.elapsed() < delay);

        assert_eq!(stream.next().await.as_deref(), Some("DEF"));
        assert_eq!(stream.next().await.as_deref(), Some("GHI"));
        let after_last = start.elapsed();
        assert!(after_last >= delay * 2 && after_last < delay * 3);

        // No trailing sleep once the body is exhausted
        assert_eq!(stream.next().await, None);
        assert_eq!(start.elapsed(), after_last);
    }
}
