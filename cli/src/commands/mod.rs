pub mod export;
pub mod summary;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result, bail};
use openfootprint::{
    ClassificationSet, FilterCriteria, IngestConfig, Ingestor, Publish, RecordSet, RecordStore, SizeBound, SizeRange,
    ingest_into,
};
use tracing::info;

use crate::cli::{Cli, FilterArgs, InputArgs};

/// Config file (if any) with command-line overrides applied.
pub fn load_config(cli: &Cli, input: &InputArgs) -> Result<IngestConfig> {
    let mut config = match &cli.config {
        Some(path) => IngestConfig::from_toml_file(path)
            .with_context(|| format!("[config] failed to load {}", path.display()))?,
        None => IngestConfig::default(),
    };
    if let Some(limit) = input.limit {
        config.row_limit = Some(limit);
    }
    config.validate()?;
    Ok(config)
}

/// Ingest `path` to completion, logging progress after every batch.
pub fn ingest(path: &Path, config: IngestConfig) -> Result<Arc<RecordSet>> {
    let ingestor = Ingestor::from_path(path, config)
        .with_context(|| format!("[ingest] failed to open {}", path.display()))?;
    let store = RecordStore::new();
    let set = ingest_into(&store, ingestor, Publish::Final, |p| {
        info!(percent = p.percent, rows = p.rows_read, accepted = p.accepted, skipped = p.skipped, "[ingest] progress");
    }).with_context(|| format!("[ingest] failed to read {}", path.display()))?;
    Ok(set)
}

pub fn criteria(args: &FilterArgs) -> Result<FilterCriteria> {
    let types = match &args.types {
        Some(list) => ClassificationSet::parse_list(list).context("[filter] invalid --types")?,
        None => ClassificationSet::EMPTY,
    };
    let min = args.min_size.unwrap_or(0.0);
    if let Some(max) = args.max_size {
        if max < min { bail!("[filter] --max-size {max} is below --min-size {min}") }
    }
    let size = SizeRange::new(min, args.max_size.map_or(SizeBound::Open, SizeBound::AtMost));
    let confidence = args.min_confidence.unwrap_or(0.0);
    if !(0.0..=100.0).contains(&confidence) {
        bail!("[filter] --min-confidence must be a percentage in [0, 100], got {confidence}");
    }

    Ok(FilterCriteria::default().with_types(types).with_size(size).with_min_confidence(confidence))
}
