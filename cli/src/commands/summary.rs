use anyhow::Result;
use openfootprint::aggregate;
use serde_json::json;
use tracing::info;

use crate::cli::{Cli, SummaryArgs};
use super::{criteria, ingest, load_config};

pub fn run(cli: &Cli, args: &SummaryArgs) -> Result<()> {
    let config = load_config(cli, &args.input)?;
    let revenue = config.revenue;
    let criteria = criteria(&args.filter)?;

    let set = ingest(&args.input.input, config)?;
    let summary = aggregate(set.filter(&criteria));

    let report = json!({
        "source": args.input.input.display().to_string(),
        "sha256": set.source_sha256(),
        "ingestion": set.stats(),
        "criteria": criteria,
        "summary": summary,
        "revenue": summary.revenue(&revenue),
    });
    let text = if args.pretty { serde_json::to_string_pretty(&report)? } else { serde_json::to_string(&report)? };
    println!("{text}");
    info!(matched = summary.count, total = set.len(), "[summary] records matched");
    Ok(())
}
