use std::path::PathBuf;

use clap::Parser;
use process::models::LocationFormat;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Geocoded BFRO report export
    #[arg(short, long, default_value = "../data/bfro_reports_geocoded.csv")]
    input: PathBuf,

    /// Base directory for the index/, json/ and point/ outputs
    #[arg(short, long, default_value = "../data")]
    output: PathBuf,

    /// Location representation used by the full json view
    #[arg(short, long, value_enum, default_value_t = LocationFormat::Composite)]
    location_format: LocationFormat,
}

fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let summary = process::convert(&args.input, &args.output, args.location_format)?;

    println!("Rows: {}", summary.rows);
    println!("Views written: {}", summary.written);
    println!("Rows skipped: {}", summary.skipped);
    println!("Failed writes: {}", summary.failed);

    Ok(())
}
