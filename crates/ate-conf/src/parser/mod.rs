//! Parsers for STIL signal lists and spreadsheet netlists

mod netlist;
mod stil;

pub use netlist::{Location, NetEntry, Netlist, Sheet, EMPTY_BALL, NETLIST_ASSIGNMENTS_HEADER};
pub use stil::{Direction, Signal, SignalList, STIL_ASSIGNMENTS_HEADER};
