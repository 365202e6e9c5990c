use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

/// Spatial data quality CLI (argument schema only; commands.rs drives the engine)
#[derive(Parser, Debug)]
#[command(name = "geoqc", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the validation pipeline against a shapefile-directory source
    Validate(ValidateArgs),

    /// Split a shapefile-directory source into size-capped per-layer parts
    Split(SplitArgs),
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Directory-of-shapefiles source, with a `.geoqc-source` sentinel
    #[arg(value_hint = ValueHint::DirPath)]
    pub gdb_path: PathBuf,

    /// Root directory for rule-family CSVs, codelist, and criteria
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub config_dir: Option<PathBuf>,

    /// Root directory for job output (errors.ndjson, meta.json)
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub work_dir: Option<PathBuf>,

    /// Comma-separated subset of stages to run, e.g. "1,2,3"
    #[arg(long, value_delimiter = ',')]
    pub stages: Option<Vec<u8>>,

    /// Skip stages 2-5 entirely if Stage 1 (Tables) fails
    #[arg(long)]
    pub stop_on_table_check_failure: bool,
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Directory-of-shapefiles source to split
    #[arg(value_hint = ValueHint::DirPath)]
    pub gdb_path: PathBuf,

    /// Output directory for the per-layer shapefile parts
    #[arg(value_hint = ValueHint::DirPath)]
    pub out_dir: PathBuf,

    /// Soft byte cap per output part (defaults to 2GB)
    #[arg(long)]
    pub max_bytes_per_part: Option<u64>,
}
