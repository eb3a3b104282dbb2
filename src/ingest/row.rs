use std::{io::Read, sync::Arc};

use csv::{ErrorKind, ReaderBuilder, StringRecord};

use crate::error::IngestionError;

/// One data row keyed by the header's column names.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl RawRow {
    pub fn new(columns: Arc<[String]>, values: Vec<String>) -> Self {
        Self { columns, values }
    }

    /// Build a standalone row from `(column, value)` pairs.
    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        let (columns, values): (Vec<String>, Vec<String>) = pairs.into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self { columns: columns.into(), values }
    }

    /// Value of `column`, or `None` if the column is absent or the cell is blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        let i = self.columns.iter().position(|c| c == column)?;
        self.values.get(i).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter().map(String::as_str))
    }
}

/// A pull-based stream of rows.
pub trait RowSource {
    /// Next row, `None` at end of input. An error is fatal to the run.
    fn next_row(&mut self) -> Option<Result<RawRow, IngestionError>>;

    /// Header column names, when known before the first row.
    fn columns(&self) -> Option<&[String]> { None }
}

/// Delimited text with a header row. Quoted fields may span lines.
pub struct CsvSource<R: Read> {
    reader: csv::Reader<R>,
    columns: Arc<[String]>,
    record: StringRecord,
}

impl<R: Read> CsvSource<R> {
    pub fn new(input: R, delimiter: u8) -> Result<Self, IngestionError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(input);

        let headers = reader.headers().map_err(map_csv_error)?;
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(IngestionError::MissingHeader);
        }
        let columns: Arc<[String]> = headers.iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        Ok(Self { reader, columns, record: StringRecord::new() })
    }
}

impl<R: Read> RowSource for CsvSource<R> {
    fn next_row(&mut self) -> Option<Result<RawRow, IngestionError>> {
        match self.reader.read_record(&mut self.record) {
            Ok(true) => {
                let values = self.record.iter().map(String::from).collect();
                Some(Ok(RawRow::new(self.columns.clone(), values)))
            }
            Ok(false) => None,
            Err(e) => Some(Err(map_csv_error(e))),
        }
    }

    fn columns(&self) -> Option<&[String]> { Some(&self.columns) }
}

fn map_csv_error(e: csv::Error) -> IngestionError {
    if let ErrorKind::UnequalLengths { pos, expected_len, len } = e.kind() {
        return IngestionError::RaggedRow {
            line: pos.as_ref().map_or(0, |p| p.line()),
            expected: *expected_len,
            found: *len,
        };
    }
    IngestionError::Csv(e)
}

/// Rows already in memory, e.g. from a parsed upload or a test fixture.
pub struct RowsSource<I> {
    rows: I,
}

impl<I: Iterator<Item = RawRow>> RowsSource<I> {
    pub fn new(rows: impl IntoIterator<IntoIter = I>) -> Self {
        Self { rows: rows.into_iter() }
    }
}

impl<I: Iterator<Item = RawRow>> RowSource for RowsSource<I> {
    fn next_row(&mut self) -> Option<Result<RawRow, IngestionError>> {
        self.rows.next().map(Ok)
    }
}
