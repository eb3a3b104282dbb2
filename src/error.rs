//! Error taxonomy.
//!
//! Row-local errors ([`GeometryError`], [`RowValidationError`]) only ever tell the ingestor to
//! skip a row. [`IngestionError`] and [`RemoteClassifierError`] are fatal to the run or batch
//! that raised them.

use thiserror::Error;

/// A single row's polygon text could not be turned into a ring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("geometry text is empty")]
    Empty,

    #[error("geometry is not wrapped in POLYGON((...))")]
    MissingWrapper,

    #[error("polygon has {valid} valid in-bounds points, at least 3 are required")]
    TooFewPoints { valid: usize },
}

/// A classification name outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown classification {0:?}")]
pub struct ParseClassificationError(pub String);

/// A row is missing something it cannot do without.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowValidationError {
    #[error("row has no value in identifier column {0:?}")]
    MissingIdentifier(String),

    #[error("row has no value in geometry column {0:?}")]
    MissingGeometry(String),

    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
}

impl RowValidationError {
    /// Short stable key used when tallying skipped rows.
    pub fn reason(&self) -> &'static str {
        match self {
            RowValidationError::MissingIdentifier(_) => "missing_identifier",
            RowValidationError::MissingGeometry(_) => "missing_geometry",
            RowValidationError::Geometry(GeometryError::Empty) => "empty_geometry",
            RowValidationError::Geometry(GeometryError::MissingWrapper) => "malformed_geometry",
            RowValidationError::Geometry(GeometryError::TooFewPoints { .. }) => "too_few_points",
        }
    }
}

/// The tabular stream itself could not be read. Fatal to the whole run.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed tabular input: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("input has no header row")]
    MissingHeader,

    #[error("line {line} has {found} fields, header declares {expected}")]
    RaggedRow { line: u64, expected: u64, found: u64 },

    #[error("ingestion was cancelled after {rows} rows")]
    Cancelled { rows: u64 },

    #[error("ingestion already failed")]
    Aborted,

    #[error("ingestion was superseded by a newer run")]
    Superseded,
}

/// The remote classifier could not produce a usable batch. Fatal to that batch.
#[derive(Debug, Error)]
pub enum RemoteClassifierError {
    #[error("classifier request failed: {0}")]
    Transport(String),

    #[error("classifier returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("classifier response is malformed: {0}")]
    Malformed(String),

    #[error("classifier returned {got} labels for {expected} instances")]
    CountMismatch { expected: usize, got: usize },

    #[error("classifier returned unknown label {0:?}")]
    UnknownLabel(String),
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: region bounds are not a valid rectangle: {0}")]
    InvalidBounds(String),

    #[error("invalid config: batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("invalid config: unsupported delimiter {0:?}")]
    UnsupportedDelimiter(char),

    #[error("invalid config: {field} must be in [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Export to a delimited or JSON surface failed.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to build export table: {0}")]
    Table(#[from] polars::error::PolarsError),

    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize export: {0}")]
    Json(#[from] serde_json::Error),

    #[error("delimiter {0:?} must be a single ASCII character other than '\"' or a newline")]
    Delimiter(char),
}
