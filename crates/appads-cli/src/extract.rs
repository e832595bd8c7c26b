//! `extract`: stream results from the server, print them as JSON lines and
//! show throttled progress on stderr.
//!
//! A worker task owns the scanner and the response body; the presentation
//! side only sees [`WorkerMessage`]s.

use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use appads_core::{LookupResult, RunState};
use appads_stream::{
    scan_stream, ProgressAggregator, ProgressListener, ProgressUpdate, ScanError, ScanEvent,
    StreamRecord, StreamTrailer,
};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::{ExtractClient, STREAM_PATH};
use crate::input::RequestArgs;

const WORKER_BUFFER: usize = 64;

#[derive(Debug)]
pub(crate) enum WorkerMessage {
    Result(Box<LookupResult>),
    /// A record that could not be decoded; the stream continues.
    Malformed(String),
    /// Totals trailer; the document is complete.
    Finished(StreamTrailer),
    /// The document ended without totals.
    Interrupted(String),
}

/// Scans `body` on its own task, forwarding one message per event.
pub(crate) fn spawn_worker<S, B, E>(body: S) -> (mpsc::Receiver<WorkerMessage>, JoinHandle<()>)
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel(WORKER_BUFFER);
    let handle = tokio::spawn(async move {
        let mut events = std::pin::pin!(scan_stream::<_, _, _, StreamRecord>(body));
        while let Some(event) = events.next().await {
            let message = match event {
                Ok(ScanEvent::Record(StreamRecord::Result(result))) => {
                    WorkerMessage::Result(Box::new(result))
                }
                Ok(ScanEvent::Record(StreamRecord::Interrupted(marker))) => {
                    WorkerMessage::Interrupted(marker.stream_error)
                }
                Ok(ScanEvent::Finished(trailer)) => WorkerMessage::Finished(trailer),
                Err(err @ (ScanError::MalformedRecord { .. } | ScanError::UnexpectedByte { .. })) => {
                    WorkerMessage::Malformed(err.to_string())
                }
                Err(err) => WorkerMessage::Interrupted(err.to_string()),
            };
            if tx.send(message).await.is_err() {
                break;
            }
        }
    });
    (rx, handle)
}

#[derive(Debug, Clone)]
pub(crate) struct ExtractSummary {
    pub state: RunState,
    pub trailer: Option<StreamTrailer>,
    pub malformed: usize,
    pub interruption: Option<String>,
}

impl ExtractSummary {
    /// Complete when the trailer arrived and agrees with what was received.
    pub(crate) fn is_complete(&self) -> bool {
        self.interruption.is_none()
            && self
                .trailer
                .as_ref()
                .is_some_and(|t| t.reconciles() && t.total_processed == self.state.processed)
    }
}

/// Writes each first-seen result as one JSON line and feeds the progress
/// aggregator until the worker hangs up.
pub(crate) async fn present<W, L>(
    mut messages: mpsc::Receiver<WorkerMessage>,
    expected: usize,
    out: &mut W,
    listener: L,
) -> anyhow::Result<ExtractSummary>
where
    W: Write,
    L: ProgressListener,
{
    let mut progress = ProgressAggregator::new(expected, listener);
    let mut trailer = None;
    let mut malformed = 0;
    let mut interruption: Option<String> = None;

    while let Some(message) = messages.recv().await {
        match message {
            WorkerMessage::Result(result) => {
                if progress.record(&result) {
                    serde_json::to_writer(&mut *out, &*result)?;
                    out.write_all(b"\n")?;
                } else {
                    tracing::debug!(identifier = %result.identifier, "duplicate result ignored");
                }
            }
            WorkerMessage::Malformed(reason) => {
                tracing::warn!(%reason, "skipping undecodable record");
                malformed += 1;
            }
            WorkerMessage::Finished(totals) => {
                progress.complete();
                trailer = Some(totals);
            }
            WorkerMessage::Interrupted(reason) => {
                interruption.get_or_insert(reason);
            }
        }
    }
    out.flush()?;

    Ok(ExtractSummary {
        state: *progress.state(),
        trailer,
        malformed,
        interruption,
    })
}

fn print_progress(update: &ProgressUpdate) {
    let s = &update.state;
    eprintln!(
        "[{:>3}%] {}/{} processed, {} ok, {} failed, {} matched",
        update.percent, s.processed, s.total_expected, s.success, s.error, s.matched
    );
}

pub(crate) async fn run_extract(args: &RequestArgs, output: Option<&Path>) -> anyhow::Result<()> {
    let prepared = args.prepare()?;
    let client = ExtractClient::new(&args.server)?;
    let response = client.open(STREAM_PATH, &prepared.body).await?;
    let (messages, worker) = spawn_worker(response.bytes_stream());

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    };

    let summary = present(messages, prepared.expected, &mut out, print_progress).await?;
    worker.await.context("stream worker failed")?;
    report(&summary)
}

fn report(summary: &ExtractSummary) -> anyhow::Result<()> {
    let s = &summary.state;
    eprintln!(
        "{} results: {} ok, {} failed, {} matched, {} with app-ads.txt",
        s.processed, s.success, s.error, s.matched, s.with_declaration
    );
    if let Some(trailer) = &summary.trailer {
        eprintln!("server processing time: {}", trailer.processing_time);
    }
    if summary.malformed > 0 {
        eprintln!("{} records could not be decoded", summary.malformed);
    }

    if summary.is_complete() {
        return Ok(());
    }
    match (&summary.interruption, &summary.trailer) {
        (Some(reason), _) => anyhow::bail!("stream incomplete: {reason}"),
        (None, Some(trailer)) => anyhow::bail!(
            "stream totals disagree: server reported {} results, received {}",
            trailer.total_processed,
            s.processed
        ),
        (None, None) => anyhow::bail!("stream ended without totals"),
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
