//! `convert` command: netlist + STIL signals to a tester config

use anyhow::{Context, Result};
use ate_conf::{AnalogCard, ConvertOptions, InputFiles, PinProject, Settings};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Arguments for the `convert` command
#[derive(Args, Debug)]
#[command(after_help = "Examples:
  ate convert -i netlist.csv bscan.stil -o product_dir
  ate convert -i product_netlist_assignments.csv -o product_dir -n product -p
  ate convert --io folder_with_inputs -n product -c PS1600 -a MCB")]
pub struct ConvertArgs {
    /// Sheet CSV exports, .stil files, assignment CSVs or directories holding them
    #[arg(short, long = "input", value_name = "PATH", num_args = 1.., default_value = ".")]
    pub inputs: Vec<PathBuf>,

    /// Output directory, created when missing
    #[arg(
        short,
        long,
        value_name = "DIR",
        default_value = ".",
        value_hint = clap::ValueHint::DirPath
    )]
    pub output: PathBuf,

    /// Input and output directory when they are the same
    #[arg(
        long = "io",
        value_name = "DIR",
        conflicts_with_all = ["inputs", "output"],
        value_hint = clap::ValueHint::DirPath
    )]
    pub in_out: Option<PathBuf>,

    /// Product name and version (e.g. fulda_B0); defaults to the netlist file name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Pin scale card(s) in use [default: PS9G]
    #[arg(short, long, value_name = "CARD", num_args = 1..)]
    pub cards: Vec<String>,

    /// Analog card in use: MCE, MCB or MCA [default: MCE]
    #[arg(short, long, value_name = "CARD")]
    pub analog: Option<AnalogCard>,

    /// Number of test sites; defaults to the channel count of the first netlist entry
    #[arg(long)]
    pub sites: Option<usize>,

    /// Net names to ignore (e.g. NC)
    #[arg(short = 'x', long, value_name = "NAME", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Settings file; defaults to ate.toml next to the inputs
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Print the error log and name cross-references to the terminal
    #[arg(short, long)]
    pub print: bool,
}

/// Execute the `convert` command
pub fn execute(args: ConvertArgs) -> Result<()> {
    let (inputs, output) = match &args.in_out {
        Some(dir) => {
            if !dir.is_dir() {
                anyhow::bail!("{} is not a directory", dir.display());
            }
            (vec![dir.clone()], dir.clone())
        }
        None => (args.inputs.clone(), args.output.clone()),
    };

    let settings = load_settings(args.config.as_deref(), &inputs)?;
    let options = options_for(&args, &settings.unwrap_or_default());
    log::debug!("Convert options: {options:?}");

    let files = InputFiles::discover(&inputs)?;
    if files.is_empty() {
        anyhow::bail!(
            "No assignment files found in {}",
            inputs
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    eprintln!("Reading inputs");
    report_inputs(&files);

    let project = PinProject::load(&files, &options).context("Failed to load pin assignments")?;
    if project.signals_derived {
        eprintln!(
            "  {} no .stil input, every netlist pin is treated as InOut",
            "Warning:".yellow()
        );
    }

    let conversion = project.convert(&options)?;
    let written = conversion.write_to(&output)?;

    match &written.error_log {
        Some(path) => {
            if args.print {
                if let Some(log) = conversion.error_log() {
                    println!("{}", log.trim());
                }
            }
            eprintln!("Error log location: {}", path.display());
        }
        None => eprintln!("\n{}", "No issues found".green()),
    }

    if let Some(path) = &written.transfers {
        if args.print {
            if let Some(report) = conversion.transfer_report() {
                println!("{}", report.trim());
            }
        }
        eprintln!("Pin name cross-refs location: {}", path.display());
    }

    eprintln!(
        "Config file location: {}",
        written.config.display().to_string().black().on_yellow()
    );
    Ok(())
}

/// Settings file, then command line flags
fn options_for(args: &ConvertArgs, settings: &Settings) -> ConvertOptions {
    let mut options = ConvertOptions::from_settings(settings);
    options.name = args.name.clone();
    if !args.cards.is_empty() {
        options.cards = args.cards.clone();
    }
    if let Some(analog) = args.analog {
        options.analog_card = analog;
    }
    if args.sites.is_some() {
        options.sites = args.sites;
    }
    options.exclude.extend(args.exclude.iter().cloned());
    options
}

fn load_settings(explicit: Option<&Path>, inputs: &[PathBuf]) -> Result<Option<Settings>> {
    if let Some(path) = explicit {
        return Settings::parse(path).map(Some);
    }
    let Some(first) = inputs.first() else {
        return Ok(None);
    };
    let dir = if first.is_dir() {
        first.as_path()
    } else {
        match first.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    };
    Settings::discover(dir)
}

fn report_inputs(files: &InputFiles) {
    if let Some(path) = &files.netlist_assignments {
        eprintln!("  Found netlist assignments ({})", path.display());
    } else {
        for path in &files.sheets {
            eprintln!("  Found netlist sheet ({})", path.display());
        }
    }
    if let Some(path) = &files.stil_assignments {
        eprintln!("  Found signal assignments ({})", path.display());
    } else {
        for path in &files.stil {
            eprintln!("  Found STIL file ({})", path.display());
        }
    }
}
