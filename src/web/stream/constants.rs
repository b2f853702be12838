//! Constants shared by the prompt streaming routes

/// Terminal fragment written in place of a backend error
pub const GENERATION_ERROR_MESSAGE: &str = "Error generating response";

/// Fragments buffered between the relay task and the HTTP body
pub const CLIENT_CHANNEL_BUFFER: usize = 32;

/// Response headers for the raw fragment stream
pub const CONTENT_TYPE_EVENT_STREAM: &str = "text/event-stream";
pub const CACHE_CONTROL_NO_CACHE: &str = "no-cache";
pub const CONNECTION_KEEP_ALIVE: &str = "keep-alive";
