//! Streaming a prompt's response from a generation backend to the client

pub mod constants;
mod handlers;
pub mod relay;
pub mod sessions;
pub mod storage;
pub mod writer;

pub use handlers::router;
pub use sessions::ActiveStreams;
