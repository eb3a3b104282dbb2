use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, Cursor, Read},
    path::Path,
    sync::{Arc, atomic::{AtomicBool, Ordering}},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::{
    config::{ConfidenceScale, IngestConfig},
    error::{IngestionError, RowValidationError},
    geom::parse_polygon,
    store::RecordSet,
    types::BuildingRecord,
};
use super::{CsvSource, RawRow, RowSource};

/// Row counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    /// Data rows consumed, accepted or not.
    pub rows: u64,
    pub accepted: u64,
    /// Skipped rows by reason.
    pub skipped: BTreeMap<&'static str, u64>,
}

impl IngestStats {
    pub fn skipped_total(&self) -> u64 { self.skipped.values().sum() }
}

/// Progress reported after each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub rows_read: u64,
    pub accepted: u64,
    pub skipped: u64,
    pub estimated_rows: u64,
    /// Below 100 until the run completes, then exactly 100. Never decreases.
    pub percent: u8,
    pub done: bool,
}

/// Cooperative cancellation, checked between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) { self.0.store(true, Ordering::Relaxed) }

    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    Done,
    Failed,
}

/// Turns a row stream into validated records, one batch per [`Ingestor::step`].
///
/// Rows that fail validation are counted and skipped; read errors end the run.
pub struct Ingestor<S> {
    source: S,
    config: IngestConfig,
    confidence_scale: ConfidenceScale,
    started_at: DateTime<Utc>,
    estimated_rows: u64,
    batch_size: usize,
    /// Accepted records, one shared chunk per batch.
    chunks: Vec<Arc<[BuildingRecord]>>,
    stats: IngestStats,
    source_sha256: Option<String>,
    cancel: Option<CancelToken>,
    last_percent: u8,
    state: State,
}

/// Ingestor over an in-memory document.
pub type BufferIngestor = Ingestor<CsvSource<Cursor<Vec<u8>>>>;

/// Ingestor streaming from a file.
pub type FileIngestor = Ingestor<CsvSource<BufReader<File>>>;

impl BufferIngestor {
    pub fn from_text(text: &str, config: IngestConfig) -> Result<Self, IngestionError> {
        Self::from_bytes(text.as_bytes().to_vec(), config)
    }

    /// Ingest a whole document held in memory, fingerprinting it first.
    pub fn from_bytes(bytes: Vec<u8>, config: IngestConfig) -> Result<Self, IngestionError> {
        config.validate()?;
        let estimated = estimate_rows(&bytes);
        let digest = hex::encode(Sha256::digest(&bytes));
        let source = CsvSource::new(Cursor::new(bytes), config.delimiter_byte())?;
        Ok(Ingestor::new(source, estimated, config)?.with_source_sha256(digest))
    }
}

impl FileIngestor {
    /// Fingerprint and count lines in one pass, then stream rows in a second.
    pub fn from_path(path: &Path, config: IngestConfig) -> Result<Self, IngestionError> {
        config.validate()?;
        let (digest, estimated) = scan_file(path)?;
        let file = File::open(path)?;
        let source = CsvSource::new(BufReader::new(file), config.delimiter_byte())?;
        info!(path = %path.display(), estimated_rows = estimated, "[ingest] opened input");
        Ok(Ingestor::new(source, estimated, config)?.with_source_sha256(digest))
    }
}

impl<S: RowSource> Ingestor<S> {
    /// Fails if `config` does not validate.
    pub fn new(source: S, estimated_rows: u64, config: IngestConfig) -> Result<Self, IngestionError> {
        config.validate()?;
        let batch_size = config.batch_size_for(estimated_rows as usize);
        if let Some(columns) = source.columns() {
            for required in [&config.columns.id, &config.columns.geometry] {
                if !columns.iter().any(|c| c == required) {
                    warn!(column = %required, "[ingest] required column missing from header, every row will be skipped");
                }
            }
        }
        debug!(estimated_rows, batch_size, "[ingest] starting run");

        Ok(Self {
            source,
            confidence_scale: config.confidence_scale,
            config,
            started_at: Utc::now(),
            estimated_rows,
            batch_size,
            chunks: Vec::new(),
            stats: IngestStats::default(),
            source_sha256: None,
            cancel: None,
            last_percent: 0,
            state: State::Running,
        })
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_source_sha256(mut self, digest: String) -> Self {
        self.source_sha256 = Some(digest);
        self
    }

    /// Fallback detection timestamp for rows without one.
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    #[inline] pub fn stats(&self) -> &IngestStats { &self.stats }

    #[inline] pub fn batch_size(&self) -> usize { self.batch_size }

    #[inline] pub fn is_done(&self) -> bool { self.state == State::Done }

    /// Process one batch. Returns `Ok(None)` once the final progress has been reported.
    pub fn step(&mut self) -> Result<Option<Progress>, IngestionError> {
        match self.state {
            State::Done => return Ok(None),
            State::Failed => return Err(IngestionError::Aborted),
            State::Running => {}
        }

        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            self.state = State::Failed;
            warn!(rows = self.stats.rows, "[ingest] cancelled");
            return Err(IngestionError::Cancelled { rows: self.stats.rows });
        }

        let mut batch = Vec::with_capacity(self.batch_size.min(4096));
        let mut failure = None;
        while batch.len() < self.batch_size && !self.limit_reached() {
            match self.source.next_row() {
                None => {
                    self.state = State::Done;
                    break;
                }
                Some(Err(e)) => {
                    failure = Some(e);
                    break;
                }
                Some(Ok(row)) => batch.push(row),
            }
        }
        self.resolve_confidence_scale(&batch);

        let mut accepted = Vec::new();
        for row in batch {
            if self.limit_reached() {
                break;
            }
            let ordinal = self.stats.rows;
            self.stats.rows += 1;
            match self.build_record(&row, ordinal) {
                Ok(record) => {
                    accepted.push(record);
                    self.stats.accepted += 1;
                }
                Err(e) => {
                    debug!(row = ordinal, reason = e.reason(), "[ingest] skipping row: {e}");
                    *self.stats.skipped.entry(e.reason()).or_default() += 1;
                }
            }
        }
        if !accepted.is_empty() {
            self.chunks.push(accepted.into());
        }
        if let Some(e) = failure {
            self.state = State::Failed;
            warn!(rows = self.stats.rows, "[ingest] input unreadable: {e}");
            return Err(e);
        }
        if self.limit_reached() {
            self.state = State::Done;
        }

        let progress = self.progress();
        if progress.done {
            info!(
                rows = self.stats.rows,
                accepted = self.stats.accepted,
                skipped = self.stats.skipped_total(),
                "[ingest] finished"
            );
        } else {
            debug!(rows = progress.rows_read, percent = progress.percent, "[ingest] batch done");
        }
        Ok(Some(progress))
    }

    /// Everything accepted so far. Shares record chunks with the ingestor instead of copying them.
    pub fn snapshot(&self) -> RecordSet {
        RecordSet::new(self.chunks.clone(), self.stats.clone(), self.source_sha256.clone())
    }

    /// Run the remaining batches and return the completed set.
    pub fn finish(mut self) -> Result<RecordSet, IngestionError> {
        while self.step()?.is_some() {}
        Ok(RecordSet::new(self.chunks, self.stats, self.source_sha256))
    }

    /// Pin an `Auto` scale on the first batch that carries any confidence values.
    fn resolve_confidence_scale(&mut self, batch: &[RawRow]) {
        if self.confidence_scale != ConfidenceScale::Auto {
            return;
        }
        let column = &self.config.columns.confidence;
        let sample: Vec<f64> = batch.iter().filter_map(|row| row.get(column)).filter_map(parse_number).collect();
        if sample.is_empty() {
            return;
        }
        self.confidence_scale = ConfidenceScale::Auto.resolve(sample);
        debug!(scale = ?self.confidence_scale, "[ingest] confidence scale resolved");
    }

    fn limit_reached(&self) -> bool {
        self.config.row_limit.is_some_and(|limit| self.stats.accepted >= limit as u64)
    }

    fn progress(&mut self) -> Progress {
        let percent = if self.state == State::Done {
            100
        } else {
            let estimated = self.estimated_rows.max(1);
            (self.stats.rows.saturating_mul(100) / estimated).min(99) as u8
        };
        self.last_percent = self.last_percent.max(percent);
        Progress {
            rows_read: self.stats.rows,
            accepted: self.stats.accepted,
            skipped: self.stats.skipped_total(),
            estimated_rows: self.estimated_rows,
            percent: self.last_percent,
            done: self.state == State::Done,
        }
    }

    fn build_record(&self, row: &RawRow, ordinal: u64) -> Result<BuildingRecord, RowValidationError> {
        let columns = &self.config.columns;
        let key = row.get(&columns.id)
            .ok_or_else(|| RowValidationError::MissingIdentifier(columns.id.clone()))?;
        let wkt = row.get(&columns.geometry)
            .ok_or_else(|| RowValidationError::MissingGeometry(columns.geometry.clone()))?;
        let polygon = parse_polygon(wkt, &self.config.bounds)?;

        let area = row.get(&columns.area).and_then(parse_number).unwrap_or(0.0);
        let confidence = row.get(&columns.confidence)
            .and_then(parse_number)
            .map_or(0.0, |c| self.confidence_scale.normalize(c));
        let detected_at = row.get(&columns.detected_at)
            .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
            .map_or(self.started_at, |d| d.with_timezone(&Utc));
        let attributes = row.iter()
            .filter(|(name, _)| !columns.is_core(name))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let id = format!("{}-{ordinal}", key.trim());
        Ok(BuildingRecord::new(id, polygon, area, confidence, detected_at).with_attributes(attributes))
    }
}

impl<S: RowSource> Iterator for Ingestor<S> {
    type Item = Result<Progress, IngestionError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Err(IngestionError::Aborted) => None,
            other => other.transpose(),
        }
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Data rows in `bytes`, estimated as line count minus the header.
pub(crate) fn estimate_rows(bytes: &[u8]) -> u64 {
    let newlines = bytes.iter().filter(|&&b| b == b'\n').count() as u64;
    let lines = newlines + u64::from(bytes.last().is_some_and(|&b| b != b'\n'));
    lines.saturating_sub(1)
}

fn scan_file(path: &Path) -> Result<(String, u64), IngestionError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1 << 16];
    let mut newlines = 0u64;
    let mut last = None;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        newlines += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64;
        last = Some(buf[n - 1]);
    }
    let lines = newlines + u64::from(last.is_some_and(|b| b != b'\n'));
    Ok((hex::encode(hasher.finalize()), lines.saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{error::ConfigError, ingest::RowsSource, types::{Classification, FilterCriteria}};

    const SQUARE: &str = "\"POLYGON((11.0 10.0, 11.001 10.0, 11.001 10.001, 11.0 10.001))\"";

    fn csv(rows: &[&str]) -> String {
        let mut text = String::from("full_plus_code,area_in_meters,confidence,geometry\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    #[test]
    fn accepts_and_skips() {
        let text = csv(&[
            &format!("6FX8+2C,300,0.9,{SQUARE}"),
            &format!(",120,0.9,{SQUARE}"),
            "6FX8+3D,120,0.9,",
            "6FX8+4E,120,0.9,\"LINESTRING(11 10, 11.5 10)\"",
            "6FX8+5F,120,0.9,\"POLYGON((11 10, 50 50, 60 60))\"",
            &format!("6FX8+6G,30,0.85,{SQUARE}"),
        ]);
        let set = Ingestor::from_text(&text, IngestConfig::default()).unwrap().finish().unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set[0].id(), "6FX8+2C-0");
        assert_eq!(set[1].id(), "6FX8+6G-5");
        assert_eq!(set[1].classification(), Classification::Mixed);
        assert_eq!(set[1].confidence(), 0.85);

        let stats = set.stats();
        assert_eq!(stats.rows, 6);
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.skipped["missing_identifier"], 1);
        assert_eq!(stats.skipped["missing_geometry"], 1);
        assert_eq!(stats.skipped["malformed_geometry"], 1);
        assert_eq!(stats.skipped["too_few_points"], 1);
        assert_eq!(stats.skipped_total(), 4);
        assert!(set.source_sha256().is_some_and(|d| d.len() == 64));
    }

    #[test]
    fn missing_numbers_default_to_zero() {
        let text = csv(&[&format!("A,,abc,{SQUARE}"), &format!("B,-5,0.5,{SQUARE}")]);
        let set = Ingestor::from_text(&text, IngestConfig::default()).unwrap().finish().unwrap();
        let a = &set[0];
        assert_eq!(a.area_square_meters(), 0.0);
        assert_eq!(a.confidence(), 0.0);
        assert_eq!(a.estimated_value(), 0.0);
        assert_eq!(a.classification(), Classification::Mixed);
        assert_eq!(set[1].area_square_meters(), 0.0);
    }

    #[test]
    fn passthrough_columns_and_detection_time() {
        let text = "full_plus_code,geometry,detected_at,tile\n\
            A,\"POLYGON((11 10, 11.5 10, 11.5 10.5))\",2023-05-01T12:00:00Z,t7\n\
            B,\"POLYGON((11 10, 11.5 10, 11.5 10.5))\",yesterday,t8\n";
        let started = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let set = Ingestor::from_text(text, IngestConfig::default()).unwrap()
            .with_started_at(started)
            .finish().unwrap();
        let (a, b) = (&set[0], &set[1]);
        assert_eq!(a.detected_at(), Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap());
        assert_eq!(b.detected_at(), started);
        assert_eq!(a.attributes().get("tile").map(String::as_str), Some("t7"));
        assert!(!a.attributes().contains_key("geometry"));
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_100() {
        let rows: Vec<String> = (0..25).map(|i| format!("P{i},100,0.5,{SQUARE}")).collect();
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let config = IngestConfig { batch_size: Some(10), ..IngestConfig::default() };
        let progress: Vec<Progress> = Ingestor::from_text(&csv(&refs), config).unwrap()
            .collect::<Result<_, _>>().unwrap();

        assert_eq!(progress.len(), 3);
        assert_eq!(progress[0].percent, 40);
        assert_eq!(progress[1].percent, 80);
        assert!(progress.windows(2).all(|w| w[0].percent <= w[1].percent));
        let last = progress.last().unwrap();
        assert!(last.done);
        assert_eq!(last.percent, 100);
        assert_eq!(last.accepted, 25);
    }

    #[test]
    fn empty_body_completes_immediately() {
        let mut ingestor = Ingestor::from_text(&csv(&[]), IngestConfig::default()).unwrap();
        let progress = ingestor.step().unwrap().unwrap();
        assert!(progress.done);
        assert_eq!(progress.percent, 100);
        assert!(ingestor.step().unwrap().is_none());
        assert!(ingestor.finish().unwrap().is_empty());
    }

    #[test]
    fn row_limit_stops_early() {
        let rows: Vec<String> = (0..10).map(|i| format!("P{i},100,0.5,{SQUARE}")).collect();
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let config = IngestConfig { row_limit: Some(4), ..IngestConfig::default() };
        let set = Ingestor::from_text(&csv(&refs), config).unwrap().finish().unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(set.stats().rows, 4);
    }

    #[test]
    fn cancellation_between_batches() {
        let rows: Vec<String> = (0..30).map(|i| format!("P{i},100,0.5,{SQUARE}")).collect();
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let token = CancelToken::new();
        let config = IngestConfig { batch_size: Some(10), ..IngestConfig::default() };
        let mut ingestor = Ingestor::from_text(&csv(&refs), config).unwrap().with_cancel(token.clone());

        assert!(ingestor.step().unwrap().is_some());
        token.cancel();
        assert!(matches!(ingestor.step(), Err(IngestionError::Cancelled { rows: 10 })));
        assert!(matches!(ingestor.step(), Err(IngestionError::Aborted)));
        assert_eq!(ingestor.snapshot().len(), 10);
    }

    #[test]
    fn ragged_input_fails_the_run() {
        let text = csv(&[&format!("A,100,0.5,{SQUARE}"), "B,100"]);
        let err = Ingestor::from_text(&text, IngestConfig::default()).unwrap().finish().unwrap_err();
        assert!(matches!(err, IngestionError::RaggedRow { expected: 4, found: 2, .. }));
    }

    #[test]
    fn missing_geometry_column_skips_everything() {
        let text = "full_plus_code,area_in_meters\nA,100\nB,200\n";
        let set = Ingestor::from_text(text, IngestConfig::default()).unwrap().finish().unwrap();
        assert!(set.is_empty());
        assert_eq!(set.stats().skipped["missing_geometry"], 2);
    }

    #[test]
    fn in_memory_rows() {
        let rows = vec![
            RawRow::from_pairs([("full_plus_code", "A"), ("geometry", "POLYGON((11 10, 11.5 10, 11.5 10.5))"), ("area_in_meters", "700")]),
            RawRow::from_pairs([("full_plus_code", "B"), ("geometry", "POLYGON EMPTY")]),
        ];
        let set = Ingestor::new(RowsSource::new(rows), 2, IngestConfig::default()).unwrap().finish().unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].classification(), Classification::Institutional);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let text = csv(&[&format!("A,100,0.5,{SQUARE}")]);
        let zero = IngestConfig { batch_size: Some(0), ..IngestConfig::default() };
        assert!(matches!(
            Ingestor::from_text(&text, zero.clone()),
            Err(IngestionError::Config(ConfigError::ZeroBatchSize))
        ));
        assert!(Ingestor::new(RowsSource::new(Vec::<RawRow>::new()), 0, zero).is_err());

        let latin = IngestConfig { delimiter: 'é', ..IngestConfig::default() };
        assert!(matches!(
            Ingestor::from_text(&text, latin),
            Err(IngestionError::Config(ConfigError::UnsupportedDelimiter('é')))
        ));
    }

    #[test]
    fn auto_confidence_scale_is_decided_once_per_run() {
        let text = csv(&[&format!("A,100,1,{SQUARE}"), &format!("B,100,50,{SQUARE}"), &format!("C,100,,{SQUARE}")]);
        let set = Ingestor::from_text(&text, IngestConfig::default()).unwrap().finish().unwrap();
        let confidences: Vec<f64> = set.iter().map(|r| r.confidence()).collect();
        assert_eq!(confidences, [0.01, 0.5, 0.0]);
        let view = set.filter(&FilterCriteria::default().with_min_confidence(90.0));
        assert!(view.is_empty());

        // A later batch cannot switch the scale picked by the first one.
        let text = csv(&[&format!("A,100,,{SQUARE}"), &format!("B,100,0.4,{SQUARE}"), &format!("C,100,80,{SQUARE}")]);
        let config = IngestConfig { batch_size: Some(1), ..IngestConfig::default() };
        let set = Ingestor::from_text(&text, config).unwrap().finish().unwrap();
        let confidences: Vec<f64> = set.iter().map(|r| r.confidence()).collect();
        assert_eq!(confidences, [0.0, 0.4, 1.0]);
    }

    #[test]
    fn row_estimate_ignores_header() {
        assert_eq!(estimate_rows(b""), 0);
        assert_eq!(estimate_rows(b"a,b\n"), 0);
        assert_eq!(estimate_rows(b"a,b\n1,2\n3,4"), 2);
        assert_eq!(estimate_rows(b"a,b\n1,2\n3,4\n"), 2);
    }
}
