//! The contract every generation backend satisfies.

use super::error::BackendError;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

/// One increment of generated text.
///
/// `cumulative` is the concatenation of every `text` yielded so far by the same
/// `generate` call, this one included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationChunk {
    pub text: String,
    pub cumulative: String,
}

/// Lazy, finite, single-pass sequence of chunks. An `Err` item is terminal.
pub type GenerationStream = BoxStream<'static, Result<GenerationChunk, BackendError>>;

pub trait ModelBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Start generating a response for `prompt`.
    ///
    /// Nothing happens until the returned stream is polled. Backends that pace
    /// themselves may poll `cancel` between chunks; network backends stop when
    /// the stream is dropped.
    fn generate(&self, prompt: &str, cancel: CancellationToken) -> GenerationStream;
}

/// Turns a stream of raw deltas into [`GenerationChunk`]s carrying the running
/// total.
///
/// The first error ends the sequence: it is forwarded and nothing is polled
/// from `deltas` afterwards.
pub fn accumulate<S>(deltas: S) -> GenerationStream
where
    S: Stream<Item = Result<String, BackendError>> + Send + 'static,
{
    deltas
        .scan((String::new(), false), |(cumulative, failed), item| {
            if *failed {
                return futures::future::ready(None);
            }
            let next = match item {
                Ok(text) => {
                    cumulative.push_str(&text);
                    Ok(GenerationChunk {
                        text,
                        cumulative: cumulative.clone(),
                    })
                }
                Err(e) => {
                    *failed = true;
                    Err(e)
                }
            };
            futures::future::ready(Some(next))
        })
        .boxed()
}
