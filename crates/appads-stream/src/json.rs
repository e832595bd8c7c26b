//! Incrementally written JSON result document.

use std::time::Instant;

use appads_core::{LookupResult, RunState};
use async_trait::async_trait;
use chrono::Utc;

use crate::frame::{
    object_fields, StreamHeader, StreamInterruption, StreamTrailer, HEARTBEAT,
};
use crate::sink::{ChunkSink, EmitError, ResultSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Open,
    Closed,
}

/// Writes `{"success":true,...,"results":[` up front, one frame per result,
/// heartbeat tokens between records and the totals trailer at the end.
#[derive(Debug)]
pub struct JsonStreamEmitter<S> {
    sink: S,
    debug_mode: bool,
    phase: Phase,
    records: usize,
    started: Instant,
}

impl<S: ChunkSink> JsonStreamEmitter<S> {
    pub fn new(sink: S, debug_mode: bool) -> Self {
        Self {
            sink,
            debug_mode,
            phase: Phase::Idle,
            records: 0,
            started: Instant::now(),
        }
    }

    /// Number of result records written so far.
    pub fn records(&self) -> usize {
        self.records
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    async fn write(&mut self, chunk: String) -> Result<(), EmitError> {
        self.sink.send_chunk(chunk).await.map_err(EmitError::from)
    }

    fn separator(&self) -> &'static str {
        if self.records == 0 {
            ""
        } else {
            ","
        }
    }
}

#[async_trait]
impl<S: ChunkSink> ResultSink for JsonStreamEmitter<S> {
    async fn open(&mut self) -> Result<(), EmitError> {
        if self.phase != Phase::Idle {
            return Ok(());
        }
        let header = StreamHeader::new(self.debug_mode);
        let preamble = format!("{{{},\"results\":[", object_fields(&header)?);
        self.started = Instant::now();
        self.phase = Phase::Open;
        self.write(preamble).await
    }

    async fn accept(&mut self, result: &LookupResult) -> Result<(), EmitError> {
        if self.phase == Phase::Idle {
            self.open().await?;
        }
        if self.phase == Phase::Closed {
            tracing::warn!(identifier = %result.identifier, "result emitted after stream closed");
            return Ok(());
        }
        let record = serde_json::to_string(result)?;
        let frame = format!("{}{record}", self.separator());
        self.write(frame).await?;
        self.records += 1;
        Ok(())
    }

    async fn heartbeat(&mut self) -> Result<(), EmitError> {
        if self.phase != Phase::Open {
            return Ok(());
        }
        tracing::debug!(records = self.records, "stream heartbeat");
        self.write(HEARTBEAT.to_owned()).await
    }

    async fn close(&mut self, state: &RunState) -> Result<(), EmitError> {
        if self.phase == Phase::Idle {
            self.open().await?;
        }
        if self.phase == Phase::Closed {
            return Ok(());
        }
        let trailer = StreamTrailer::from_run(state, self.started.elapsed());
        let frame = format!("],{}}}", object_fields(&trailer)?);
        self.phase = Phase::Closed;
        self.write(frame).await
    }

    async fn abort(&mut self, message: &str) -> Result<(), EmitError> {
        if self.phase == Phase::Idle {
            self.open().await?;
        }
        if self.phase == Phase::Closed {
            return Ok(());
        }
        let marker = StreamInterruption {
            stream_error: message.to_owned(),
            timestamp: Utc::now(),
        };
        let frame = format!("{}{}", self.separator(), serde_json::to_string(&marker)?);
        self.phase = Phase::Closed;
        self.write(frame).await
    }
}

#[cfg(test)]
mod tests {
    use appads_core::{Declaration, DeclarationStatus, StoreType};

    use super::*;
    use crate::sink::SinkClosed;

    fn resolved(id: &str) -> LookupResult {
        LookupResult::resolved(
            id,
            StoreType::GooglePlay,
            "example.com",
            Declaration {
                url: Some("https://example.com/app-ads.txt".into()),
                status: DeclarationStatus::Found {
                    text: "appnexus.com, 1, DIRECT\n# \"quoted\" }{".into(),
                },
            },
            None,
        )
    }

    #[tokio::test]
    async fn document_is_valid_json_once_heartbeats_are_removed() {
        let mut emitter = JsonStreamEmitter::new(Vec::<String>::new(), false);
        emitter.open().await.unwrap();
        emitter.heartbeat().await.unwrap();
        emitter.accept(&resolved("com.a")).await.unwrap();
        emitter.heartbeat().await.unwrap();
        emitter
            .accept(&LookupResult::failed("com.b", "network error"))
            .await
            .unwrap();

        let mut state = RunState::new(2);
        state.processed = 2;
        state.success = 1;
        state.error = 1;
        state.with_declaration = 1;
        emitter.close(&state).await.unwrap();

        let body = emitter.into_inner().concat().replace(HEARTBEAT, "");
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["debugMode"], false);
        assert_eq!(value["results"].as_array().unwrap().len(), 2);
        assert_eq!(value["results"][1]["error"], "network error");
        assert_eq!(value["totalProcessed"], 2);
        assert_eq!(value["successCount"], 1);
        assert_eq!(value["errorCount"], 1);
        assert_eq!(value["appsWithDeclaration"], 1);
        assert!(value["processingTime"].as_str().unwrap().ends_with("ms"));
    }

    #[tokio::test]
    async fn each_write_is_one_frame() {
        let mut emitter = JsonStreamEmitter::new(Vec::<String>::new(), true);
        emitter.accept(&resolved("com.a")).await.unwrap();
        emitter.accept(&resolved("com.b")).await.unwrap();
        let frames = emitter.into_inner();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].ends_with("\"results\":["));
        assert!(frames[1].starts_with('{'));
        assert!(frames[2].starts_with(",{"));
    }

    #[tokio::test]
    async fn heartbeat_before_open_writes_nothing() {
        let mut emitter = JsonStreamEmitter::new(Vec::<String>::new(), false);
        emitter.heartbeat().await.unwrap();
        assert!(emitter.into_inner().is_empty());
    }

    #[tokio::test]
    async fn abort_appends_marker_without_trailer() {
        let mut emitter = JsonStreamEmitter::new(Vec::<String>::new(), false);
        emitter.accept(&resolved("com.a")).await.unwrap();
        emitter.abort("resolver unavailable").await.unwrap();
        emitter.close(&RunState::new(1)).await.unwrap();

        let frames = emitter.into_inner();
        let last = frames.last().unwrap();
        assert!(last.starts_with(",{\"streamError\":\"resolver unavailable\""));
        assert!(!frames.concat().contains("totalProcessed"));
    }

    struct ClosedSink;

    #[async_trait]
    impl ChunkSink for ClosedSink {
        async fn send_chunk(&mut self, _chunk: String) -> Result<(), SinkClosed> {
            Err(SinkClosed)
        }
    }

    #[tokio::test]
    async fn closed_sink_is_reported() {
        let mut emitter = JsonStreamEmitter::new(ClosedSink, false);
        let err = emitter.accept(&resolved("com.a")).await.unwrap_err();
        assert!(err.is_closed());
    }
}
