//! Interchangeable text generation backends
//!
//! Every backend yields a lazy stream of [`GenerationChunk`]s; the
//! [`BackendSelector`] picks one per request from the prompt's model name.

pub mod backend;
pub mod chunk_source;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod selector;
pub mod simulated;
pub mod sse;

/// Per-read timeout for upstream provider streams
pub const STREAM_CHUNK_TIMEOUT_SECS: u64 = 120;

pub use backend::{GenerationChunk, GenerationStream, ModelBackend};
pub use chunk_source::ChunkOptions;
pub use error::BackendError;
pub use selector::{BackendSelector, BackendSettings, SimulatedConfig};
