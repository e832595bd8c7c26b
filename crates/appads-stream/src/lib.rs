//! Streaming result documents: the emitters that write them incrementally
//! and the scanner and progress aggregator that consume them.

pub mod csv_export;
pub mod frame;
pub mod json;
pub mod progress;
pub mod scanner;
pub mod sink;

pub use csv_export::{pack_cell, result_row, CsvStreamEmitter, CSV_HEADERS, STREAM_ERROR_PREFIX};
pub use frame::{
    StreamHeader, StreamInterruption, StreamRecord, StreamTrailer, HEARTBEAT,
};
pub use json::JsonStreamEmitter;
pub use progress::{ProgressAggregator, ProgressListener, ProgressUpdate, MILESTONES};
pub use scanner::{scan_stream, RecordScanner, Records, ScanError, ScanEvent};
pub use sink::{ChunkSink, EmitError, ResultSink, SinkClosed};
