//! Wire framing of the streamed JSON document.
//!
//! ```text
//! document  := preamble "[" elements "]" trailer
//! elements  := (record | heartbeat | separator | whitespace)*
//! record    := "{" ... "}"
//! heartbeat := "/*" ... "*/"
//! separator := ","
//! ```
//!
//! The preamble carries the [`StreamHeader`] fields followed by
//! `"results":`; the trailer carries the [`StreamTrailer`] fields and the
//! closing brace. A document interrupted mid-stream ends with a
//! [`StreamInterruption`] record and no trailer.

use std::time::Duration;

use appads_core::{LookupResult, RunState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Keep-alive token written between records.
pub const HEARTBEAT: &str = "/* heartbeat */";

/// Fields written before the results array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamHeader {
    pub success: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub debug_mode: bool,
}

impl StreamHeader {
    #[must_use]
    pub fn new(debug_mode: bool) -> Self {
        Self {
            success: true,
            timestamp: Utc::now(),
            debug_mode,
        }
    }
}

/// Aggregate totals written after the results array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamTrailer {
    pub total_processed: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub apps_with_declaration: usize,
    /// Elapsed wall time rendered as `"<ms>ms"`.
    pub processing_time: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_timestamp: DateTime<Utc>,
}

impl StreamTrailer {
    #[must_use]
    pub fn from_run(state: &RunState, elapsed: Duration) -> Self {
        Self {
            total_processed: state.processed,
            success_count: state.success,
            error_count: state.error,
            apps_with_declaration: state.with_declaration,
            processing_time: format!("{}ms", elapsed.as_millis()),
            end_timestamp: Utc::now(),
        }
    }

    /// `totalProcessed == successCount + errorCount`.
    #[must_use]
    pub fn reconciles(&self) -> bool {
        self.total_processed == self.success_count + self.error_count
    }
}

/// In-band marker appended when a stream fails after bytes were sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInterruption {
    pub stream_error: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// One element of the results array as seen by a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamRecord {
    Interrupted(StreamInterruption),
    Result(LookupResult),
}

/// Serializes `value` and strips the enclosing braces, leaving a bare
/// field list that can be spliced into the open document object.
pub(crate) fn object_fields<V: Serialize>(value: &V) -> Result<String, serde_json::Error> {
    let text = serde_json::to_string(value)?;
    Ok(text
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .unwrap_or(&text)
        .to_owned())
}
