//! Errors for inputs that cannot be used at all

use thiserror::Error;

/// An input that cannot contribute anything to a conversion.
///
/// Row-level problems are never errors: they are skipped and show up in the
/// error log instead.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("no `Signals {{ }}` block found")]
    MissingSignalsBlock,

    #[error("expected a `{expected}` header line")]
    InvalidHeader { expected: &'static str },

    #[error("no netlist assignments found; provide sheet CSV exports or a netlist assignments CSV")]
    NoNetlist,

    #[error("no pin assignments found in the netlist")]
    EmptyNetlist,

    #[error("unknown supply card `{0}`")]
    UnknownCard(String),

    #[error("unknown analog card `{0}` (expected MCE, MCB or MCA)")]
    UnknownAnalogCard(String),
}
