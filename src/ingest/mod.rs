//! Batched, cancellable ingestion of delimited building footprint exports.

mod ingestor;
mod row;

pub use ingestor::{BufferIngestor, CancelToken, FileIngestor, IngestStats, Ingestor, Progress};
pub use row::{CsvSource, RawRow, RowSource, RowsSource};
