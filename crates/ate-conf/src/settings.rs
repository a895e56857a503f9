//! Optional `ate.toml` settings file

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::emit::AnalogCard;
use crate::mapping::SupplyCard;

/// File name looked up in the input directory
pub const SETTINGS_FILE: &str = "ate.toml";

/// Conversion defaults read from a settings file
///
/// ```toml
/// cards = ["PS1600"]
/// analog_card = "MCB"
/// sites = 4
/// exclude = ["NC", "N/A"]
///
/// [[supply_card]]
/// name = "BENCH"
/// ranges = ["50101-50116"]
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Pin scale cards in use
    pub cards: Option<Vec<String>>,
    pub analog_card: Option<AnalogCard>,
    /// Site count override
    pub sites: Option<usize>,
    /// Net names to ignore
    pub exclude: Vec<String>,
    /// Extra supply cards, searched before the builtin ones
    pub supply_card: Vec<SupplyCard>,
}

impl Settings {
    pub fn parse(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::parse_str(&content)
            .with_context(|| format!("Invalid settings file: {}", path.display()))
    }

    pub fn parse_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse settings TOML")
    }

    /// Load `ate.toml` from a directory when present
    pub fn discover(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(SETTINGS_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        log::debug!("Loading settings from {}", path.display());
        Self::parse(&path).map(Some)
    }
}
