//! CSV rendering of lookup results, streamed one row per frame.

use appads_core::{LookupResult, RunState};
use async_trait::async_trait;
use csv::{QuoteStyle, Writer, WriterBuilder};

use crate::sink::{ChunkSink, EmitError, ResultSink};

pub const CSV_HEADERS: [&str; 10] = [
    "Bundle ID",
    "Store",
    "Domain",
    "Has Declaration",
    "Declaration URL",
    "Advanced Search Results",
    "Match Count",
    "Matching Lines",
    "Success",
    "Error",
];

/// Maximum items packed into one multi-valued cell.
pub const MAX_CELL_ITEMS: usize = 5;

const CELL_JOINER: &str = " | ";

/// Prefix of the final line written when the export fails mid-stream.
pub const STREAM_ERROR_PREFIX: &str = "# stream error: ";

/// Joins up to [`MAX_CELL_ITEMS`] items with `" | "`, noting how many were left out.
#[must_use]
pub fn pack_cell<S: AsRef<str>>(items: &[S]) -> String {
    let shown: Vec<&str> = items
        .iter()
        .take(MAX_CELL_ITEMS)
        .map(AsRef::as_ref)
        .collect();
    let mut cell = shown.join(CELL_JOINER);
    if items.len() > MAX_CELL_ITEMS {
        cell.push_str(&format!(" (+{} more)", items.len() - MAX_CELL_ITEMS));
    }
    cell
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Column values for one result, in [`CSV_HEADERS`] order.
#[must_use]
pub fn result_row(result: &LookupResult) -> [String; 10] {
    let declaration = result.declaration();
    let (terms, match_count, lines) = match result.match_info() {
        Some(info) => {
            let terms: Vec<&str> = info.term_results.iter().map(|t| t.term.as_str()).collect();
            let lines: Vec<&str> = info
                .matching_lines()
                .into_iter()
                .map(|l| l.content.as_str())
                .collect();
            (pack_cell(&terms), info.count.to_string(), pack_cell(&lines))
        }
        None => (String::new(), String::new(), String::new()),
    };

    [
        result.identifier.clone(),
        result
            .store_type()
            .map(|s| s.label().to_owned())
            .unwrap_or_default(),
        result.domain().unwrap_or_default().to_owned(),
        yes_no(result.has_declaration()).to_owned(),
        declaration
            .and_then(|d| d.url.clone())
            .unwrap_or_default(),
        terms,
        match_count,
        lines,
        yes_no(result.is_success()).to_owned(),
        result.error().unwrap_or_default().to_owned(),
    ]
}

/// Writes the header row on open and one row per result. Quoting is applied
/// only when a field contains a comma, a quote or a line break.
pub struct CsvStreamEmitter<S> {
    sink: S,
    writer: Writer<Vec<u8>>,
    opened: bool,
    closed: bool,
}

impl<S: ChunkSink> CsvStreamEmitter<S> {
    fn new_writer() -> Writer<Vec<u8>> {
        WriterBuilder::new()
            .quote_style(QuoteStyle::Necessary)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new())
    }

    pub fn new(sink: S) -> Self {
        let writer = Self::new_writer();
        Self {
            sink,
            writer,
            opened: false,
            closed: false,
        }
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    async fn write_row<I, T>(&mut self, fields: I) -> Result<(), EmitError>
    where
        I: IntoIterator<Item = T> + Send,
        T: AsRef<[u8]> + Send,
    {
        self.writer.write_record(fields)?;
        self.writer.flush().map_err(csv::Error::from)?;
        let bytes = std::mem::replace(&mut self.writer, Self::new_writer())
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        let row = String::from_utf8_lossy(&bytes).into_owned();
        self.sink.send_chunk(row).await?;
        Ok(())
    }
}

#[async_trait]
impl<S: ChunkSink> ResultSink for CsvStreamEmitter<S> {
    async fn open(&mut self) -> Result<(), EmitError> {
        if self.opened {
            return Ok(());
        }
        self.opened = true;
        self.write_row(CSV_HEADERS).await
    }

    async fn accept(&mut self, result: &LookupResult) -> Result<(), EmitError> {
        self.open().await?;
        if self.closed {
            return Ok(());
        }
        self.write_row(result_row(result)).await
    }

    async fn heartbeat(&mut self) -> Result<(), EmitError> {
        Ok(())
    }

    async fn close(&mut self, state: &RunState) -> Result<(), EmitError> {
        self.open().await?;
        self.closed = true;
        tracing::debug!(rows = state.processed, "csv export complete");
        Ok(())
    }

    async fn abort(&mut self, message: &str) -> Result<(), EmitError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let line = format!("{STREAM_ERROR_PREFIX}{}\n", message.replace(['\r', '\n'], " "));
        self.sink.send_chunk(line).await?;
        Ok(())
    }
}
