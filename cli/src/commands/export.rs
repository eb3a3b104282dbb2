use std::path::Path;

use anyhow::{Context, Result, bail};
use openfootprint::io::{Manifest, write_csv_file, write_geojson_file};
use tracing::info;

use crate::cli::{Cli, ExportArgs};
use super::{criteria, ingest, load_config};

fn refuse_overwrite(path: &Path, force: bool) -> Result<()> {
    if path == Path::new("-") {
        bail!("stdout is not supported; provide a real file path.");
    }
    if !force && path.exists() {
        bail!("Refusing to overwrite existing file: {} (use --force)", path.display());
    }
    Ok(())
}

pub fn run(cli: &Cli, args: &ExportArgs) -> Result<()> {
    refuse_overwrite(&args.output, args.force)?;
    if let Some(path) = &args.geojson {
        refuse_overwrite(path, args.force)?;
    }

    let config = load_config(cli, &args.input)?;
    let criteria = criteria(&args.filter)?;
    let set = ingest(&args.input.input, config)?;
    let view = set.filter(&criteria);

    write_csv_file(view.iter().copied(), &args.output, args.delimiter)
        .with_context(|| format!("[io::csv::write] Failed to write CSV to {}", args.output.display()))?;

    if let Some(path) = &args.geojson {
        write_geojson_file(view.iter().copied(), path)
            .with_context(|| format!("[io::geojson] Failed to write GeoJSON to {}", path.display()))?;
    }

    let manifest_path = args.output.with_extension("manifest.json");
    Manifest::new(args.input.input.display().to_string(), &set, view.len())
        .write(&manifest_path)
        .with_context(|| format!("[io::manifest] Failed to write {}", manifest_path.display()))?;

    info!(exported = view.len(), total = set.len(), output = %args.output.display(), "[export] wrote records");
    Ok(())
}
