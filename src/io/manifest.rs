use std::{fs::File, io::{BufWriter, Write}, path::Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::ExportError, store::RecordSet};

/// Provenance of an export: where the records came from and how many made it through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub source: String,
    /// Hex SHA-256 of the input document.
    pub sha256: Option<String>,
    /// Records written to the export.
    pub records: u64,
    /// Data rows read from the input.
    pub rows: u64,
    pub skipped: u64,
    pub generated_at: DateTime<Utc>,
}

impl Manifest {
    /// Manifest for `exported` records drawn from `set`.
    pub fn new(source: impl Into<String>, set: &RecordSet, exported: usize) -> Self {
        Self {
            source: source.into(),
            sha256: set.source_sha256().map(str::to_string),
            records: exported as u64,
            rows: set.stats().rows,
            skipped: set.stats().skipped_total(),
            generated_at: Utc::now(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ExportError> {
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, ExportError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}
