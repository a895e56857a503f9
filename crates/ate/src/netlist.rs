//! `netlist` command: sheet exports to the netlist assignments CSV

use anyhow::{Context, Result};
use ate_conf::emit::render_netlist_assignments;
use ate_conf::{load_sheets, product_name, InputError, Netlist};
use clap::Args;
use std::fs;
use std::path::PathBuf;

/// Arguments for the `netlist` command
#[derive(Args, Debug)]
#[command(after_help = "Sheet rules:
  1. One net name per row, in a column whose header mentions \"name\", all capitals
  2. One ball per row: 1-2 letters followed by 1-2 digits (A1, AB12); rows
     without a ball are skipped, write \"\" as the ball of a trigger channel
  3. Any number of channels per row, e.g. 12345, 12345-6, 123-P4, 123-P4-P5,
     123.45, 123A+, PF1-PF12_PSNAME_345, optionally prefixed by CH or TC
  4. Analog channels keep their own slot: 456A+ becomes an MCE456 DFAN record,
     not a fixed slot 231")]
pub struct NetlistArgs {
    /// Netlist sheets exported as CSV
    #[arg(short, long = "input", value_name = "FILE", num_args = 1.., required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory, created when missing
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Net names to ignore (e.g. NC N/A)
    #[arg(short = 'x', long, value_name = "NAME", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Product name; defaults to the first sheet file name
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Execute the `netlist` command
pub fn execute(args: NetlistArgs) -> Result<()> {
    let sheets = load_sheets(&args.inputs)?;
    let netlist = Netlist::scan(&sheets, &args.exclude);
    if netlist.is_empty() {
        return Err(InputError::EmptyNetlist.into());
    }
    eprintln!(
        "Found {} nets over {} site(s)",
        netlist.entries.len(),
        netlist.sites()
    );

    let name = args
        .name
        .unwrap_or_else(|| product_name(&args.inputs[0]));
    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory: {}", args.output.display()))?;
    let path = args.output.join(format!("{name}_netlist_assignments.csv"));
    fs::write(&path, render_netlist_assignments(&netlist))
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;

    eprintln!("Wrote {}", path.display());
    Ok(())
}
