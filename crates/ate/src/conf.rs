//! `conf2stil` and `diff` commands over existing .conf files

use anyhow::{Context, Result};
use ate_conf::conf::{compare_config_files, config_to_stil};
use clap::Args;
use std::fs;
use std::path::PathBuf;

/// Arguments for the `conf2stil` command
#[derive(Args, Debug)]
pub struct ConfToStilArgs {
    /// Config file to read
    #[arg(value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub path: PathBuf,

    /// Output file path (defaults to <FILE>.stil)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print to stdout instead of writing to file
    #[arg(long)]
    pub stdout: bool,
}

/// Execute the `conf2stil` command
pub fn execute_conf_to_stil(args: ConfToStilArgs) -> Result<()> {
    let content = fs::read_to_string(&args.path)
        .with_context(|| format!("Failed to read config file: {}", args.path.display()))?;
    let stil = config_to_stil(&content);

    if args.stdout {
        print!("{stil}");
        return Ok(());
    }

    let output = args.output.unwrap_or_else(|| {
        let mut name = args.path.clone().into_os_string();
        name.push(".stil");
        PathBuf::from(name)
    });
    fs::write(&output, stil)
        .with_context(|| format!("Failed to write output file: {}", output.display()))?;
    eprintln!("Wrote {}", output.display());
    Ok(())
}

/// Arguments for the `diff` command
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[arg(value_name = "LEFT")]
    pub left: PathBuf,

    #[arg(value_name = "RIGHT")]
    pub right: PathBuf,
}

/// Execute the `diff` command
pub fn execute_diff(args: DiffArgs) -> Result<()> {
    let diff = compare_config_files(&args.left, &args.right)?;
    print!(
        "{}",
        diff.render(
            &args.left.display().to_string(),
            &args.right.display().to_string()
        )
    );
    Ok(())
}
