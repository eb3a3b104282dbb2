use std::path::Path;

use serde::Deserialize;

use crate::{error::ConfigError, geom::RegionBounds, summary::RevenueModel};

/// Names of the columns the ingestor reads. Every other column is passed through.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub geometry: String,
    pub id: String,
    pub area: String,
    pub confidence: String,
    pub detected_at: String,
}

impl Default for ColumnNames {
    /// Google Open Buildings column layout.
    fn default() -> Self {
        Self {
            geometry: "geometry".into(),
            id: "full_plus_code".into(),
            area: "area_in_meters".into(),
            confidence: "confidence".into(),
            detected_at: "detected_at".into(),
        }
    }
}

impl ColumnNames {
    pub(crate) fn is_core(&self, name: &str) -> bool {
        [&self.geometry, &self.id, &self.area, &self.confidence, &self.detected_at].iter().any(|c| *c == name)
    }
}

/// Scale of the confidence column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceScale {
    /// Decided once per run from the first batch: percent if any value there exceeds 1.
    #[default]
    Auto,
    Fraction,
    Percent,
}

impl ConfidenceScale {
    /// Pin `Auto` to a concrete scale from a sample of raw values. Other scales are returned as is.
    pub fn resolve(self, sample: impl IntoIterator<Item = f64>) -> Self {
        match self {
            ConfidenceScale::Auto if sample.into_iter().any(|v| v.is_finite() && v > 1.0) => ConfidenceScale::Percent,
            ConfidenceScale::Auto => ConfidenceScale::Fraction,
            other => other,
        }
    }

    /// Normalize a raw value to `[0, 1]`. An unresolved `Auto` reads values as fractions.
    pub fn normalize(self, raw: f64) -> f64 {
        if !raw.is_finite() { return 0.0 }
        let fraction = match self {
            ConfidenceScale::Fraction | ConfidenceScale::Auto => raw,
            ConfidenceScale::Percent => raw / 100.0,
        };
        fraction.clamp(0.0, 1.0)
    }
}

/// Ingestion settings. Every field has a default, so an empty TOML document is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub columns: ColumnNames,
    pub bounds: RegionBounds,
    /// Rows per batch; `None` picks `max(1000, estimated_rows / 100)`.
    pub batch_size: Option<usize>,
    pub confidence_scale: ConfidenceScale,
    pub delimiter: char,
    /// Stop after this many accepted records.
    pub row_limit: Option<usize>,
    pub revenue: RevenueModel,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            bounds: RegionBounds::default(),
            batch_size: None,
            confidence_scale: ConfidenceScale::default(),
            delimiter: ',',
            row_limit: None,
            revenue: RevenueModel::default(),
        }
    }
}

impl IngestConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.bounds.is_valid() {
            return Err(ConfigError::InvalidBounds(format!("{:?}", self.bounds)));
        }
        if self.batch_size == Some(0) {
            return Err(ConfigError::ZeroBatchSize);
        }
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\n' | '\r') {
            return Err(ConfigError::UnsupportedDelimiter(self.delimiter));
        }
        self.revenue.validate()
    }

    /// Rows per batch for an input of roughly `estimated_rows` rows.
    pub fn batch_size_for(&self, estimated_rows: usize) -> usize {
        self.batch_size.unwrap_or_else(|| (estimated_rows / 100).max(1000)).max(1)
    }

    /// The configured delimiter as a byte. Only meaningful after [`IngestConfig::validate`].
    pub(crate) fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.delimiter).unwrap_or(b',')
    }
}
