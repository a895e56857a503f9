//! Pin assignment to ATE configuration converter
//!
//! Cross-references a spreadsheet netlist with STIL signal directions and
//! emits an hp93000 pin configuration (`.conf`) with its reports.

pub mod conf;
pub mod emit;
pub mod error;
pub mod mapping;
pub mod parser;
pub mod reconcile;
pub mod settings;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub use emit::{AnalogCard, ConfigFile, EmitOptions, EmittedConfig, Oddities, Record};
pub use error::InputError;
pub use mapping::{SupplyCard, SupplyRanges};
pub use parser::{Direction, Netlist, Sheet, SignalList};
pub use reconcile::Reconciliation;
pub use settings::Settings;

/// Pin scale card assumed when none is selected
pub const DEFAULT_CARD: &str = "PS9G";

/// Input files sorted by kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputFiles {
    pub stil: Vec<PathBuf>,
    pub stil_assignments: Option<PathBuf>,
    pub netlist_assignments: Option<PathBuf>,
    /// Netlist worksheets exported as CSV
    pub sheets: Vec<PathBuf>,
}

impl InputFiles {
    /// Classify files, expanding directories one level deep
    pub fn discover(paths: &[PathBuf]) -> Result<Self> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                for entry in fs::read_dir(path)
                    .with_context(|| format!("Failed to read directory: {}", path.display()))?
                {
                    let entry_path = entry?.path();
                    if entry_path.is_file() {
                        files.push(entry_path);
                    }
                }
            } else if path.is_file() {
                files.push(path.clone());
            } else {
                log::warn!("{} is not a file", path.display());
            }
        }
        files.sort();

        let mut inputs = InputFiles::default();
        for file in files {
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            if name.ends_with(".stil") {
                inputs.stil.push(file);
            } else if name.ends_with("stil_assignments.csv") {
                inputs.stil_assignments = Some(file);
            } else if name.ends_with("netlist_assignments.csv") {
                inputs.netlist_assignments = Some(file);
            } else if name.ends_with("_ball_map.csv") {
                continue;
            } else if name.ends_with(".csv") {
                inputs.sheets.push(file);
            }
        }
        Ok(inputs)
    }

    pub fn is_empty(&self) -> bool {
        self.stil.is_empty()
            && self.stil_assignments.is_none()
            && self.netlist_assignments.is_none()
            && self.sheets.is_empty()
    }

    /// File the product name is taken from
    pub fn netlist_source(&self) -> Option<&Path> {
        self.netlist_assignments
            .as_deref()
            .or_else(|| self.sheets.first().map(PathBuf::as_path))
    }
}

/// Product name: the file name up to the first `.` or `_`, spaces replaced
///
/// Examples:
/// - `fulda_B0_netlist.csv` → `fulda`
/// - `Big Chip.pins.csv` → `Big_Chip`
pub fn product_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("product");
    let stem = match file_name.find(['.', '_']) {
        Some(0) | None => path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("product"),
        Some(idx) => &file_name[..idx],
    };
    stem.replace(' ', "_")
}

/// Read every sheet CSV
pub fn load_sheets(paths: &[PathBuf]) -> Result<Vec<Sheet>> {
    paths.iter().map(|path| Sheet::from_csv(path)).collect()
}

/// Settings of a conversion
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Product name; derived from the netlist file name when unset
    pub name: Option<String>,
    /// Selected pin scale cards
    pub cards: Vec<String>,
    pub analog_card: AnalogCard,
    /// Site count; derived from the netlist when unset
    pub sites: Option<usize>,
    pub exclude: Vec<String>,
    /// Supply cards beyond the builtin ones
    pub extra_cards: Vec<SupplyCard>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            name: None,
            cards: vec![DEFAULT_CARD.to_string()],
            analog_card: AnalogCard::default(),
            sites: None,
            exclude: Vec::new(),
            extra_cards: Vec::new(),
        }
    }
}

impl ConvertOptions {
    /// Defaults overridden by a settings file
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        Self {
            name: None,
            cards: settings.cards.clone().unwrap_or(defaults.cards),
            analog_card: settings.analog_card.unwrap_or(defaults.analog_card),
            sites: settings.sites,
            exclude: settings.exclude.clone(),
            extra_cards: settings.supply_card.clone(),
        }
    }
}

/// Signals and netlist of one product
#[derive(Debug, Clone, Default)]
pub struct PinProject {
    pub name: String,
    pub signals: SignalList,
    pub netlist: Netlist,
    /// Signals were derived from netlist names rather than read
    pub signals_derived: bool,
}

impl PinProject {
    /// Load a project, preferring intermediate assignment CSVs over sources
    pub fn load(inputs: &InputFiles, options: &ConvertOptions) -> Result<Self> {
        let mut netlist = if let Some(path) = &inputs.netlist_assignments {
            Netlist::parse_assignments(path)?
        } else if !inputs.sheets.is_empty() {
            Netlist::scan(&load_sheets(&inputs.sheets)?, &options.exclude)
        } else {
            return Err(InputError::NoNetlist.into());
        };
        netlist
            .entries
            .retain(|name, _| !options.exclude.contains(name));
        if netlist.is_empty() {
            return Err(InputError::EmptyNetlist.into());
        }

        let mut signals_derived = false;
        let signals = if let Some(path) = &inputs.stil_assignments {
            SignalList::parse_assignments(path)?
        } else if !inputs.stil.is_empty() {
            SignalList::parse_files(&inputs.stil)?
        } else {
            log::warn!("No STIL input found, treating every netlist pin as InOut");
            signals_derived = true;
            SignalList::from_names(netlist.names())
        };

        let name = match (&options.name, inputs.netlist_source()) {
            (Some(name), _) => name.clone(),
            (None, Some(path)) => product_name(path),
            (None, None) => "product".to_string(),
        };

        Ok(PinProject {
            name,
            signals,
            netlist,
            signals_derived,
        })
    }

    /// Reconcile names and emit the config
    pub fn convert(&self, options: &ConvertOptions) -> Result<Conversion> {
        let supplies = SupplyRanges::select(&options.cards, &options.extra_cards)?;
        let sites = options.sites.unwrap_or_else(|| self.netlist.sites());

        let reconciliation = Reconciliation::new(&self.signals, &self.netlist);
        let effective = reconciliation.effective_signals(&self.signals);
        let emit_options = EmitOptions {
            supplies,
            analog_card: options.analog_card,
            sites,
        };
        let emitted = emit::emit_config(&self.netlist, &effective, &reconciliation, &emit_options);
        let oddities = emit::find_oddities(&emitted, &self.netlist, sites);

        log::info!(
            "{}: {} records for {} site(s)",
            self.name,
            emitted.config.records.len(),
            sites
        );

        Ok(Conversion {
            product: self.name.clone(),
            signals: self.signals.clone(),
            netlist: self.netlist.clone(),
            reconciliation,
            emitted,
            oddities,
            sites,
        })
    }
}

/// Result of a conversion, ready to be written
#[derive(Debug, Clone)]
pub struct Conversion {
    pub product: String,
    pub signals: SignalList,
    pub netlist: Netlist,
    pub reconciliation: Reconciliation,
    pub emitted: EmittedConfig,
    pub oddities: Oddities,
    pub sites: usize,
}

/// Paths written by [`Conversion::write_to`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub config: PathBuf,
    pub error_log: Option<PathBuf>,
    pub transfers: Option<PathBuf>,
    pub ball_map: PathBuf,
    pub stil_assignments: PathBuf,
    pub netlist_assignments: PathBuf,
}

impl Conversion {
    pub fn config_text(&self) -> String {
        self.emitted.config.render()
    }

    pub fn error_log(&self) -> Option<String> {
        emit::render_error_log(&self.reconciliation, &self.netlist, &self.oddities)
    }

    pub fn transfer_report(&self) -> Option<String> {
        emit::render_transfers(&self.reconciliation, &self.netlist)
    }

    pub fn ball_map(&self) -> emit::BallMap {
        let defined = self.emitted.config.definitions().filter_map(Record::pin_name);
        emit::BallMap::build(&self.netlist, defined)
    }

    /// Write the config and its companion files into `dir`
    ///
    /// Reports with nothing to say are removed so stale ones do not linger.
    pub fn write_to(&self, dir: &Path) -> Result<OutputFiles> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        let path = |suffix: &str| dir.join(format!("{}{suffix}", self.product));

        let config = path(".conf");
        write_file(&config, &self.config_text())?;

        let error_log = write_optional(&path("_config_error_log.txt"), self.error_log())?;
        let transfers = write_optional(&path("_transfer_names.txt"), self.transfer_report())?;

        let ball_map = path("_ball_map.csv");
        let file = fs::File::create(&ball_map)
            .with_context(|| format!("Failed to create file: {}", ball_map.display()))?;
        self.ball_map()
            .write_csv(file)
            .with_context(|| format!("Failed to write ball map: {}", ball_map.display()))?;

        let stil_assignments = path("_stil_assignments.csv");
        write_file(&stil_assignments, &emit::render_stil_assignments(&self.signals))?;

        let netlist_assignments = path("_netlist_assignments.csv");
        write_file(
            &netlist_assignments,
            &emit::render_netlist_assignments(&self.netlist),
        )?;

        Ok(OutputFiles {
            config,
            error_log,
            transfers,
            ball_map,
            stil_assignments,
            netlist_assignments,
        })
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write file: {}", path.display()))
}

fn write_optional(path: &Path, content: Option<String>) -> Result<Option<PathBuf>> {
    match content {
        Some(content) => {
            write_file(path, &content)?;
            Ok(Some(path.to_path_buf()))
        }
        None => {
            if path.is_file() {
                fs::remove_file(path)
                    .with_context(|| format!("Failed to remove stale file: {}", path.display()))?;
            }
            Ok(None)
        }
    }
}
