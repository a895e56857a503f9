//! Config file, report and CSV emitters

mod assignments;
mod ballmap;
mod config;
mod report;

pub use assignments::{render_netlist_assignments, render_stil_assignments};
pub use ballmap::BallMap;
pub use config::{
    emit_config, AnalogCard, ConfigFile, EmitOptions, EmittedConfig, Record, CONFIG_FOOTER,
    CONFIG_HEADER, TRIGGER_GROUP,
};
pub use report::{find_oddities, render_error_log, render_transfers, Oddities};
