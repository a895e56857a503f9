//! `ate`: tester pin configuration tools

mod conf;
mod convert;
mod netlist;
mod stil;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ate",
    author,
    version,
    about = "Build tester pin configurations from netlists and STIL files"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a netlist and STIL signals into a .conf file
    Convert(convert::ConvertArgs),

    /// Write the signal assignments CSV for .stil files
    Stil(stil::StilArgs),

    /// Write the netlist assignments CSV for netlist sheet exports
    Netlist(netlist::NetlistArgs),

    /// Rebuild a STIL signals block from a .conf file
    #[command(name = "conf2stil")]
    ConfToStil(conf::ConfToStilArgs),

    /// Compare the definition sections of two .conf files
    Diff(conf::DiffArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Convert(args) => convert::execute(args),
        Commands::Stil(args) => stil::execute(args),
        Commands::Netlist(args) => netlist::execute(args),
        Commands::ConfToStil(args) => conf::execute_conf_to_stil(args),
        Commands::Diff(args) => conf::execute_diff(args),
    }
}

/// `RUST_LOG` wins over `-v`
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
