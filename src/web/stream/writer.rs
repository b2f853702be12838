//! Outward side of a stream: raw bytes pushed toward the HTTP response body.

use async_trait::async_trait;
use bytes::Bytes;
use std::convert::Infallible;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("client stream is closed")]
pub struct WriterClosed;

#[async_trait]
pub trait FragmentWriter: Send + Sync {
    /// Queue one fragment. Fails once the reader is gone or `close` was called.
    async fn write(&mut self, bytes: Bytes) -> Result<(), WriterClosed>;

    /// Resolves when the reading side has gone away.
    async fn closed(&self);

    /// End the stream. Fragments already queued are still delivered.
    async fn close(&mut self);
}

/// Writer backed by a bounded channel whose receiver feeds an axum `Body`
pub struct ChannelWriter {
    tx: Option<mpsc::Sender<Result<Bytes, Infallible>>>,
}

impl ChannelWriter {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Result<Bytes, Infallible>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx: Some(tx) }, rx)
    }
}

#[async_trait]
impl FragmentWriter for ChannelWriter {
    async fn write(&mut self, bytes: Bytes) -> Result<(), WriterClosed> {
        match &self.tx {
            Some(tx) => tx.send(Ok(bytes)).await.map_err(|_| WriterClosed),
            None => Err(WriterClosed),
        }
    }

    async fn closed(&self) {
        if let Some(tx) = &self.tx {
            tx.closed().await;
        }
    }

    async fn close(&mut self) {
        self.tx.take();
    }
}
