//! Package ball map: a grid of ball locations labelled with pin and channel

use anyhow::Result;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::sync::LazyLock;

use crate::parser::Netlist;

/// `AB12` → (`AB`, 12)
static BALL_PARTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{1,3})([0-9]{1,3})$").unwrap());

/// Cells keyed by row number, then column letters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BallMap {
    cells: BTreeMap<u32, BTreeMap<ColumnKey, String>>,
}

/// Spreadsheet column order: shorter labels first (`Z` before `AA`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ColumnKey(usize, String);

impl ColumnKey {
    fn new(label: &str) -> Self {
        ColumnKey(label.len(), label.to_string())
    }
}

impl BallMap {
    /// Place every real ball of the named pins; the site-1 channel is shown
    /// next to the pin name
    pub fn build<'a, I>(netlist: &Netlist, pins: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let pins: HashSet<&str> = pins.into_iter().collect();
        let mut map = BallMap::default();
        for (name, entry) in &netlist.entries {
            if !pins.contains(name.as_str()) {
                continue;
            }
            let channel = entry.channels.first().map(String::as_str).unwrap_or("");
            for ball in entry.real_balls() {
                map.insert(ball, format!("{name} {channel}").trim_end().to_string());
            }
        }
        map
    }

    fn insert(&mut self, ball: &str, label: String) {
        let Some(caps) = BALL_PARTS.captures(ball) else {
            log::debug!("Ball `{ball}` does not fit the grid");
            return;
        };
        let Ok(row) = caps[2].parse::<u32>() else {
            return;
        };
        self.cells
            .entry(row)
            .or_default()
            .insert(ColumnKey::new(&caps[1]), label);
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Write the grid as CSV: a header of column letters, then one line per
    /// row number. Only columns holding at least one ball are written.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let columns: BTreeSet<&ColumnKey> =
            self.cells.values().flat_map(|row| row.keys()).collect();

        let mut writer = csv::Writer::from_writer(writer);
        let mut header = vec![String::new()];
        header.extend(columns.iter().map(|c| c.1.clone()));
        writer.write_record(&header)?;

        for (row, cells) in &self.cells {
            let mut record = vec![row.to_string()];
            record.extend(
                columns
                    .iter()
                    .map(|col| cells.get(*col).cloned().unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}
