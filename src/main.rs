use anyhow::Result;
use clap::Parser;

use geoqc::cli::{Cli, Commands};
use geoqc::commands::{split, validate};

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Validate(args) => validate(&cli, args),
        Commands::Split(args) => split(&cli, args),
    }
}
