//! `export`: download the CSV stream to a file.

use std::path::Path;

use anyhow::Context;
use appads_stream::STREAM_ERROR_PREFIX;
use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;

use crate::client::{ExtractClient, CSV_PATH};
use crate::input::RequestArgs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExportSummary {
    pub bytes: u64,
    /// Data rows, excluding the header.
    pub rows: usize,
    /// Message of a trailing `# stream error:` line.
    pub stream_error: Option<String>,
}

/// Remembers the last complete line of a byte stream.
#[derive(Debug, Default)]
struct LastLine {
    current: Vec<u8>,
    last: Vec<u8>,
}

impl LastLine {
    fn push(&mut self, mut chunk: &[u8]) {
        while let Some(pos) = chunk.iter().position(|b| *b == b'\n') {
            self.current.extend_from_slice(&chunk[..pos]);
            self.last = std::mem::take(&mut self.current);
            chunk = &chunk[pos + 1..];
        }
        self.current.extend_from_slice(chunk);
    }

    fn finish(self) -> String {
        let line = if self.current.is_empty() {
            self.last
        } else {
            self.current
        };
        String::from_utf8_lossy(&line).trim_end_matches('\r').to_owned()
    }
}

/// Streams `body` into `path`, then counts the rows written.
pub(crate) async fn download<S, B, E>(body: S, path: &Path) -> anyhow::Result<ExportSummary>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut tail = LastLine::default();
    let mut bytes = 0u64;

    let mut body = std::pin::pin!(body);
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context("download interrupted")?;
        let chunk = chunk.as_ref();
        file.write_all(chunk).await?;
        tail.push(chunk);
        bytes += chunk.len() as u64;
    }
    file.flush().await?;

    let stream_error = tail
        .finish()
        .strip_prefix(STREAM_ERROR_PREFIX)
        .map(ToOwned::to_owned);

    Ok(ExportSummary {
        bytes,
        rows: count_rows(path)?,
        stream_error,
    })
}

fn count_rows(path: &Path) -> anyhow::Result<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .from_path(path)
        .with_context(|| format!("failed to reopen {}", path.display()))?;
    let mut rows = 0;
    for record in reader.records() {
        record.with_context(|| format!("{} is not valid csv", path.display()))?;
        rows += 1;
    }
    Ok(rows)
}

pub(crate) async fn run_export(args: &RequestArgs, output: &Path) -> anyhow::Result<()> {
    let prepared = args.prepare()?;
    let client = ExtractClient::new(&args.server)?;
    let response = client.open(CSV_PATH, &prepared.body).await?;

    let summary = download(response.bytes_stream(), output).await?;
    eprintln!(
        "wrote {} rows ({} bytes) to {}",
        summary.rows,
        summary.bytes,
        output.display()
    );

    if let Some(message) = summary.stream_error {
        anyhow::bail!("export incomplete, server reported: {message}");
    }
    if summary.rows != prepared.expected {
        tracing::warn!(
            rows = summary.rows,
            expected = prepared.expected,
            "row count differs from identifier count"
        );
    }
    Ok(())
}
