use std::path::PathBuf;

/// Building footprint ingestion CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "openfootprint", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Ingestion settings file (TOML); flags override its values
    #[arg(short, long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Ingest a footprint export and print summary statistics as JSON
    Summary(SummaryArgs),

    /// Ingest a footprint export and write the filtered records
    Export(ExportArgs),
}

#[derive(clap::Args, Debug)]
pub struct InputArgs {
    /// Input footprint table (CSV with a WKT geometry column)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub input: PathBuf,

    /// Stop after this many accepted records
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct FilterArgs {
    /// Comma-separated classifications to keep, e.g. residential,commercial
    #[arg(long)]
    pub types: Option<String>,

    /// Minimum footprint area in square meters
    #[arg(long)]
    pub min_size: Option<f64>,

    /// Maximum footprint area in square meters
    #[arg(long)]
    pub max_size: Option<f64>,

    /// Minimum detection confidence, in percent
    #[arg(long)]
    pub min_confidence: Option<f64>,
}

#[derive(clap::Args, Debug)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Output CSV file
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,

    /// Also write a GeoJSON FeatureCollection here
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub geojson: Option<PathBuf>,

    /// Output field delimiter
    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,
}
