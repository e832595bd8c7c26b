//! Incremental record scanner for the streamed JSON document.
//!
//! Chunks arrive with arbitrary boundaries: inside strings, inside escape
//! sequences, inside multi-byte UTF-8 sequences. Scanning works on bytes, and
//! every structural token of the framing grammar is ASCII, so a split code
//! point is carried in the buffer until the record it belongs to closes.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::frame::{StreamHeader, StreamTrailer};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("record {index} could not be decoded: {source}")]
    MalformedRecord {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected byte {byte:#04x} at offset {offset} between records")]
    UnexpectedByte { byte: u8, offset: usize },

    #[error("stream truncated: {0}")]
    Truncated(&'static str),

    #[error("stream header could not be decoded: {0}")]
    InvalidHeader(#[source] serde_json::Error),

    #[error("stream trailer could not be decoded: {0}")]
    InvalidTrailer(#[source] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Header fields, up to the opening `[` of the results array.
    Preamble,
    /// Between records inside the results array.
    Elements,
    /// Inside a record (`depth > 0`).
    Record,
    /// Saw `/`, expecting `*`.
    CommentOpen,
    /// Inside `/* ... */`.
    Comment,
    /// Saw `*` inside a comment, `/` closes it.
    CommentClose,
    /// After the closing `]`.
    Trailer,
}

/// Reconstructs complete records from arbitrarily chunked input.
///
/// Feed chunks with [`RecordScanner::push`]; each call returns a lazy
/// iterator over the records that became complete. State (buffer, cursor,
/// string/escape flags, brace depth, phase) persists across calls.
#[derive(Debug)]
pub struct RecordScanner<T> {
    buf: Vec<u8>,
    pos: usize,
    /// Bytes discarded from the front of `buf` so far.
    consumed: usize,
    phase: Phase,
    in_string: bool,
    escaped: bool,
    depth: usize,
    record_start: usize,
    records: usize,
    heartbeats: usize,
    preamble: Vec<u8>,
    trailer: Vec<u8>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Default for RecordScanner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecordScanner<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            consumed: 0,
            phase: Phase::Preamble,
            in_string: false,
            escaped: false,
            depth: 0,
            record_start: 0,
            records: 0,
            heartbeats: 0,
            preamble: Vec::new(),
            trailer: Vec::new(),
            _record: PhantomData,
        }
    }

    /// Records yielded so far, including ones that failed to decode.
    #[must_use]
    pub fn records_seen(&self) -> usize {
        self.records
    }

    #[must_use]
    pub fn heartbeats_seen(&self) -> usize {
        self.heartbeats
    }

    /// Bytes held for a record that has not closed yet.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Header fields, once the results array has opened.
    #[must_use]
    pub fn header(&self) -> Option<Result<StreamHeader, ScanError>> {
        if self.phase == Phase::Preamble {
            return None;
        }
        let text = String::from_utf8_lossy(&self.preamble);
        let trimmed = text.trim_end();
        let fields = trimmed
            .strip_suffix("\"results\":")
            .unwrap_or(trimmed)
            .trim_end()
            .trim_end_matches(',');
        Some(serde_json::from_str(&format!("{fields}}}")).map_err(ScanError::InvalidHeader))
    }

    /// Validates that the document ended cleanly and returns its totals.
    ///
    /// # Errors
    ///
    /// [`ScanError::Truncated`] when the results array never opened or
    /// closed, a record was left partial, or the trailer is missing;
    /// [`ScanError::InvalidTrailer`] when the trailer does not decode.
    pub fn finish(&self) -> Result<StreamTrailer, ScanError> {
        match self.phase {
            Phase::Preamble => Err(ScanError::Truncated("results array never opened")),
            Phase::Record => Err(ScanError::Truncated("partial record at end of input")),
            Phase::CommentOpen | Phase::Comment | Phase::CommentClose => {
                Err(ScanError::Truncated("unterminated heartbeat at end of input"))
            }
            Phase::Elements => Err(ScanError::Truncated("results array not closed")),
            Phase::Trailer => {
                let text = String::from_utf8_lossy(&self.trailer);
                let fields = text.trim().trim_start_matches(',').trim_start();
                if fields.is_empty() {
                    return Err(ScanError::Truncated("missing trailer"));
                }
                serde_json::from_str(&format!("{{{fields}")).map_err(ScanError::InvalidTrailer)
            }
        }
    }

    /// Drops bytes before the cursor, or before the open record.
    fn compact(&mut self) {
        let keep_from = if self.phase == Phase::Record {
            self.record_start
        } else {
            self.pos
        };
        if keep_from > 0 {
            self.buf.drain(..keep_from);
            self.consumed += keep_from;
            self.pos -= keep_from;
            self.record_start = self.record_start.saturating_sub(keep_from);
        }
    }

    fn offset(&self) -> usize {
        self.consumed + self.pos
    }
}

impl<T: DeserializeOwned> RecordScanner<T> {
    /// Appends a chunk and returns the records it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Records<'_, T> {
        self.buf.extend_from_slice(chunk);
        Records { scanner: self }
    }

    fn next_record(&mut self) -> Option<Result<T, ScanError>> {
        while self.pos < self.buf.len() {
            let byte = self.buf[self.pos];
            self.pos += 1;

            match self.phase {
                Phase::Preamble => {
                    if byte == b'[' && !self.in_string {
                        self.phase = Phase::Elements;
                        continue;
                    }
                    self.track_string(byte);
                    self.preamble.push(byte);
                }
                Phase::Elements => match byte {
                    b'{' => {
                        self.phase = Phase::Record;
                        self.depth = 1;
                        self.record_start = self.pos - 1;
                    }
                    b'/' => self.phase = Phase::CommentOpen,
                    b']' => self.phase = Phase::Trailer,
                    b',' | b' ' | b'\t' | b'\r' | b'\n' => {}
                    other => {
                        return Some(Err(ScanError::UnexpectedByte {
                            byte: other,
                            offset: self.offset() - 1,
                        }))
                    }
                },
                Phase::CommentOpen => {
                    if byte == b'*' {
                        self.phase = Phase::Comment;
                    } else {
                        self.phase = Phase::Elements;
                        return Some(Err(ScanError::UnexpectedByte {
                            byte,
                            offset: self.offset() - 1,
                        }));
                    }
                }
                Phase::Comment => {
                    if byte == b'*' {
                        self.phase = Phase::CommentClose;
                    }
                }
                Phase::CommentClose => match byte {
                    b'/' => {
                        self.heartbeats += 1;
                        self.phase = Phase::Elements;
                    }
                    b'*' => {}
                    _ => self.phase = Phase::Comment,
                },
                Phase::Record => {
                    if let Some(result) = self.advance_record(byte) {
                        return Some(result);
                    }
                }
                Phase::Trailer => self.trailer.push(byte),
            }
        }

        self.compact();
        None
    }

    fn advance_record(&mut self, byte: u8) -> Option<Result<T, ScanError>> {
        if self.in_string {
            self.track_string(byte);
            return None;
        }
        match byte {
            b'"' => self.in_string = true,
            b'{' => self.depth += 1,
            b'}' => {
                self.depth -= 1;
                if self.depth == 0 {
                    return Some(self.take_record());
                }
            }
            _ => {}
        }
        None
    }

    fn take_record(&mut self) -> Result<T, ScanError> {
        let index = self.records;
        self.records += 1;
        self.phase = Phase::Elements;

        let parsed = serde_json::from_slice(&self.buf[self.record_start..self.pos]);
        self.buf.drain(..self.pos);
        self.consumed += self.pos;
        self.pos = 0;
        self.record_start = 0;

        parsed.map_err(|source| {
            tracing::warn!(index, error = %source, "dropping undecodable record");
            ScanError::MalformedRecord { index, source }
        })
    }
}

impl<T> RecordScanner<T> {
    fn track_string(&mut self, byte: u8) {
        if self.escaped {
            self.escaped = false;
        } else if self.in_string {
            match byte {
                b'\\' => self.escaped = true,
                b'"' => self.in_string = false,
                _ => {}
            }
        } else if byte == b'"' {
            self.in_string = true;
        }
    }
}

/// Lazy iterator over the records completed by one [`RecordScanner::push`].
///
/// Dropping it early is fine: unread records stay buffered and are yielded
/// by the next push.
pub struct Records<'a, T> {
    scanner: &'a mut RecordScanner<T>,
}

impl<T: DeserializeOwned> Iterator for Records<'_, T> {
    type Item = Result<T, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scanner.next_record()
    }
}

/// One item of [`scan_stream`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent<T> {
    Record(T),
    /// Input ended cleanly; carries the document totals.
    Finished(StreamTrailer),
}

struct ScanState<S, T> {
    input: Pin<Box<S>>,
    scanner: RecordScanner<T>,
    pending: VecDeque<Result<T, ScanError>>,
    done: bool,
}

/// Adapts a stream of byte chunks into a stream of records.
///
/// The final item is either [`ScanEvent::Finished`] or the error that
/// explains why the document is incomplete.
pub fn scan_stream<S, B, E, T>(input: S) -> impl Stream<Item = Result<ScanEvent<T>, ScanError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
    T: DeserializeOwned,
{
    let state = ScanState {
        input: Box::pin(input),
        scanner: RecordScanner::new(),
        pending: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item.map(ScanEvent::Record), st));
            }
            if st.done {
                return None;
            }
            match st.input.next().await {
                Some(Ok(chunk)) => {
                    let completed: Vec<_> = st.scanner.push(chunk.as_ref()).collect();
                    st.pending.extend(completed);
                }
                Some(Err(err)) => {
                    st.done = true;
                    return Some((Err(ScanError::Transport(Box::new(err))), st));
                }
                None => {
                    st.done = true;
                    let outcome = st.scanner.finish().map(ScanEvent::Finished);
                    return Some((outcome, st));
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "scanner_test.rs"]
mod tests;
