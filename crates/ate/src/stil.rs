//! `stil` command: .stil files to the signal assignments CSV

use anyhow::{Context, Result};
use ate_conf::emit::render_stil_assignments;
use ate_conf::{product_name, SignalList};
use clap::Args;
use std::fs;
use std::path::PathBuf;

/// Arguments for the `stil` command
#[derive(Args, Debug)]
pub struct StilArgs {
    /// .stil files to merge
    #[arg(short, long = "input", value_name = "FILE", num_args = 1.., required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory, created when missing
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Product name; defaults to the first .stil file name
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Execute the `stil` command
pub fn execute(args: StilArgs) -> Result<()> {
    let signals = SignalList::parse_files(&args.inputs)?;
    if signals.is_empty() {
        anyhow::bail!("No signals found in the given .stil files");
    }
    eprintln!("Found {} signals", signals.len());

    let name = args
        .name
        .unwrap_or_else(|| product_name(&args.inputs[0]));
    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory: {}", args.output.display()))?;
    let path = args.output.join(format!("{name}_stil_assignments.csv"));
    fs::write(&path, render_stil_assignments(&signals))
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;

    eprintln!("Wrote {}", path.display());
    Ok(())
}
