use std::convert::Infallible;

use appads_core::{LookupResult, RunState};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// The consumer of a stream went away.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("stream consumer disconnected")]
pub struct SinkClosed;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    Closed(#[from] SinkClosed),

    #[error("failed to serialize stream frame: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to encode csv row: {0}")]
    Csv(#[from] csv::Error),
}

impl EmitError {
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

/// Destination for encoded body frames. Each call is one flushed frame.
#[async_trait]
pub trait ChunkSink: Send {
    async fn send_chunk(&mut self, chunk: String) -> Result<(), SinkClosed>;
}

/// Bounded channel feeding an HTTP response body. A full channel suspends
/// the sender; a dropped receiver reports [`SinkClosed`].
#[async_trait]
impl ChunkSink for mpsc::Sender<Result<String, Infallible>> {
    async fn send_chunk(&mut self, chunk: String) -> Result<(), SinkClosed> {
        self.send(Ok(chunk)).await.map_err(|_| SinkClosed)
    }
}

#[async_trait]
impl ChunkSink for Vec<String> {
    async fn send_chunk(&mut self, chunk: String) -> Result<(), SinkClosed> {
        self.push(chunk);
        Ok(())
    }
}

/// A document format that lookup results are written into as they arrive.
#[async_trait]
pub trait ResultSink: Send {
    /// Writes the document preamble.
    async fn open(&mut self) -> Result<(), EmitError>;

    async fn accept(&mut self, result: &LookupResult) -> Result<(), EmitError>;

    /// Keep-alive while lookups are in flight. Formats without a
    /// comment syntax ignore it.
    async fn heartbeat(&mut self) -> Result<(), EmitError>;

    /// Writes the closing totals.
    async fn close(&mut self, state: &RunState) -> Result<(), EmitError>;

    /// Appends an in-band error marker and ends the document without totals.
    async fn abort(&mut self, message: &str) -> Result<(), EmitError>;
}
