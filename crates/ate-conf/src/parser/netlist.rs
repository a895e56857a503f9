//! Netlist extraction from spreadsheet rows and the netlist assignments CSV

use anyhow::{Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::InputError;
use crate::mapping::extract_channel;

/// Prefix every netlist assignments CSV header starts with
pub const NETLIST_ASSIGNMENTS_HEADER: &str = "Pin Name,Channel";

/// Marker written for a channel without a ball (trigger channel)
pub const EMPTY_BALL: &str = "\"\"";

/// Ball/package locations: 1-2 letters and 1-2 digits (`A1`, `AB12`)
static BALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{1,2}[0-9]{1,2}\b").unwrap());

static HEADER_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Lower-case header words marking columns that never hold assignments
const IGNORED_HEADERS: [&str; 3] = ["length", "len", "coord"];

/// A sheet row a netlist entry was read from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub sheet: String,
    /// 1-based row number
    pub row: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:Row{}", self.sheet, self.row)
    }
}

impl FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sheet, row) = s
            .rsplit_once(":Row")
            .ok_or_else(|| format!("expected `sheet:RowN`, got `{s}`"))?;
        let row = row.trim().parse().map_err(|_| format!("bad row number in `{s}`"))?;
        Ok(Location {
            sheet: sheet.trim().to_string(),
            row,
        })
    }
}

/// Channels and balls assigned to one net name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetEntry {
    /// Raw channel notations, one per site in discovery order
    pub channels: Vec<String>,
    /// Ball locations; an empty string marks a channel without a ball
    pub balls: Vec<String>,
    /// Every row that contributed to this entry
    pub locations: Vec<Location>,
    /// A new channel/ball pair appeared after the first one; such entries
    /// cannot be mapped to sites reliably
    pub conflicting: bool,
}

impl NetEntry {
    /// Merge one `(channel, ball)` observation into the entry
    ///
    /// - known channel, new ball → another ball of the same net (supply)
    /// - known ball, new channel → the channel of the next site
    /// - both new on a non-empty entry → conflicting
    pub fn assign(&mut self, channel: &str, ball: &str) {
        let has_channel = self.channels.iter().any(|c| c == channel);
        let has_ball = self.balls.iter().any(|b| b == ball);
        match (has_channel, has_ball) {
            (true, true) => {}
            (true, false) => self.balls.push(ball.to_string()),
            (false, true) => self.channels.push(channel.to_string()),
            (false, false) => {
                if !self.channels.is_empty() {
                    self.conflicting = true;
                }
                self.channels.push(channel.to_string());
                self.balls.push(ball.to_string());
            }
        }
    }

    fn add_location(&mut self, location: &Location) {
        if !self.locations.contains(location) {
            self.locations.push(location.clone());
        }
    }

    /// A channel with no ball drives a tester trigger, not a device pin
    pub fn is_trigger(&self) -> bool {
        self.balls.iter().any(|b| b.is_empty())
    }

    /// Balls that name a real package location
    pub fn real_balls(&self) -> impl Iterator<Item = &str> {
        self.balls.iter().map(String::as_str).filter(|b| !b.is_empty())
    }

    pub fn first_location(&self) -> Option<&Location> {
        self.locations.first()
    }

    /// Location of the row that supplied the given 1-based site
    pub fn site_location(&self, site: usize) -> Option<&Location> {
        self.locations
            .get(site.saturating_sub(1))
            .or_else(|| self.first_location())
    }
}

/// One worksheet exported as rows of cells
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Read a sheet exported as CSV; the sheet is named after the file stem
    pub fn from_csv(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("sheet")
            .to_string();
        let file = fs::File::open(path)
            .with_context(|| format!("Failed to open sheet: {}", path.display()))?;
        Self::from_reader(name, file)
            .with_context(|| format!("Failed to read sheet: {}", path.display()))
    }

    /// Read CSV rows; ragged rows are accepted
    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut rows = Vec::new();
        for record in csv.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Sheet {
            name: name.into(),
            rows,
        })
    }
}

/// Net name → assignments, in discovery order
#[derive(Debug, Clone, Default)]
pub struct Netlist {
    pub entries: IndexMap<String, NetEntry>,
    /// Site count declared by a netlist assignments CSV header
    pub declared_sites: Option<usize>,
}

impl Netlist {
    /// Scan sheets for name/channel/ball triples
    ///
    /// A column becomes a name column once any of its cells mentions `name`;
    /// columns headed by a lower-case `len` or `coord` label are ignored. In
    /// each row the pin name is the first upper-case cell in a name column.
    /// Channels found in a row are tied to the row's ball. Rows without a
    /// ball are skipped unless a cell holds the literal `""` marker, which
    /// records trigger channels.
    pub fn scan(sheets: &[Sheet], exclude: &[String]) -> Self {
        let mut netlist = Netlist::default();
        for sheet in sheets {
            netlist.scan_sheet(sheet);
        }
        netlist.entries.retain(|name, _| !exclude.contains(name));
        log::debug!("Scanned {} net names", netlist.entries.len());
        netlist
    }

    fn scan_sheet(&mut self, sheet: &Sheet) {
        let mut name_cols: Vec<usize> = Vec::new();
        let mut ignored_cols: Vec<usize> = Vec::new();

        for (idx, row) in sheet.rows.iter().enumerate() {
            let location = Location {
                sheet: sheet.name.clone(),
                row: idx + 1,
            };
            let named = name_cols
                .iter()
                .filter_map(|&col| row.get(col).map(|cell| (col, cell.trim())))
                .find(|(_, cell)| is_upper(cell));
            let name_col = named.map(|(col, _)| col);
            let name = named.map(|(_, cell)| cell.to_string());

            let mut ball: Option<String> = None;
            let mut pending: Vec<String> = Vec::new();

            for (col, cell) in row.iter().enumerate() {
                if ignored_cols.contains(&col) {
                    continue;
                }
                if IGNORED_HEADERS.iter().any(|h| cell.contains(h)) {
                    ignored_cols.push(col);
                }
                if cell.to_lowercase().contains("name") && !name_cols.contains(&col) {
                    name_cols.push(col);
                }

                if Some(col) == name_col {
                    continue;
                }
                if let Some(channel) = extract_channel(cell) {
                    pending.push(channel);
                } else if ball.is_none() {
                    ball = extract_ball(cell);
                }

                let (Some(name), Some(ball)) = (&name, &ball) else {
                    continue;
                };
                if name == ball {
                    continue;
                }
                for channel in pending.drain(..) {
                    self.record(name, &channel, ball, &location);
                }
            }

            if pending.is_empty() {
                continue;
            }
            match (&name, &ball) {
                (Some(name), None) => {
                    log::debug!("{location}: {name} has channels but no ball, skipped")
                }
                (None, _) => log::debug!("{location}: channels without a pin name, skipped"),
                _ => {}
            }
        }
    }

    fn record(&mut self, name: &str, channel: &str, ball: &str, location: &Location) {
        let entry = self.entries.entry(name.to_string()).or_default();
        entry.assign(channel, ball);
        entry.add_location(location);
    }

    /// Read a netlist assignments CSV written by
    /// [`crate::emit::render_netlist_assignments`]
    pub fn parse_assignments(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| {
            format!("Failed to read netlist assignments: {}", path.display())
        })?;
        Self::parse_assignments_str(&content)
            .with_context(|| format!("Invalid netlist assignments: {}", path.display()))
    }

    /// Parse netlist assignments CSV content
    ///
    /// The site count is the largest number in the header line.
    pub fn parse_assignments_str(content: &str) -> Result<Self> {
        let mut lines = content.lines();
        let header = match lines.next() {
            Some(header) if header.contains(NETLIST_ASSIGNMENTS_HEADER) => header,
            _ => {
                return Err(InputError::InvalidHeader {
                    expected: NETLIST_ASSIGNMENTS_HEADER,
                }
                .into())
            }
        };
        let declared_sites = HEADER_NUMBER
            .find_iter(header)
            .filter_map(|m| m.as_str().parse::<usize>().ok())
            .max()
            .unwrap_or(1);

        let mut netlist = Netlist {
            entries: IndexMap::new(),
            declared_sites: Some(declared_sites),
        };
        for line in lines {
            if line.len() < 4 || line.matches(',').count() < 2 {
                break;
            }
            let mut fields = line.split(',').map(str::trim);
            let Some(name) = fields.next() else {
                continue;
            };
            let entry = netlist.entries.entry(name.to_string()).or_default();
            let mut seen_ball = false;
            for field in fields {
                if field.contains(":Row") {
                    entry
                        .locations
                        .extend(field.split(';').filter_map(|loc| loc.parse().ok()));
                } else if field == EMPTY_BALL || BALL.is_match(field) {
                    let ball = if field == EMPTY_BALL { "" } else { field };
                    entry.balls.push(ball.to_string());
                    seen_ball = true;
                } else if field.len() >= 3 && field[..3].bytes().all(|b| b.is_ascii_digit()) {
                    if seen_ball {
                        entry.conflicting = true;
                    }
                    entry.channels.push(field.to_string());
                }
            }
        }

        Ok(netlist)
    }

    pub fn get(&self, name: &str) -> Option<&NetEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of test sites: the declared count, otherwise the channel count
    /// of the first entry
    pub fn sites(&self) -> usize {
        self.declared_sites
            .or_else(|| self.entries.values().next().map(|e| e.channels.len()))
            .unwrap_or(1)
            .max(1)
    }
}

/// At least one cased letter and no lower-case ones
fn is_upper(cell: &str) -> bool {
    cell.chars().any(char::is_uppercase) && !cell.chars().any(char::is_lowercase)
}

fn extract_ball(cell: &str) -> Option<String> {
    let cell = cell.trim();
    if cell == EMPTY_BALL {
        return Some(String::new());
    }
    BALL.find(cell).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(name: &str, csv: &str) -> Sheet {
        Sheet::from_reader(name, csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_scan_single_site() {
        let pins = sheet(
            "Pins",
            "Pin Name,Ball,Tester Channel,Trace Length\n\
             TDI,A1,10101,12.5\n\
             TDO,A2,CH10102,13\n\
             nc,A3,10103,1\n",
        );
        let netlist = Netlist::scan(&[pins], &[]);
        assert_eq!(netlist.names().collect::<Vec<_>>(), vec!["TDI", "TDO"]);

        let tdo = netlist.get("TDO").unwrap();
        assert_eq!(tdo.channels, vec!["10102"]);
        assert_eq!(tdo.balls, vec!["A2"]);
        assert_eq!(tdo.first_location().unwrap().to_string(), "Pins:Row3");
        assert_eq!(netlist.sites(), 1);
    }

    #[test]
    fn test_scan_multi_site_row() {
        let pins = sheet(
            "Sites",
            "Signal Name,Site 1,Site 2,Ball\n\
             CLK,10101,20101,B7\n",
        );
        let netlist = Netlist::scan(&[pins], &[]);
        let clk = netlist.get("CLK").unwrap();
        assert_eq!(clk.channels, vec!["10101", "20101"]);
        assert_eq!(clk.balls, vec!["B7"]);
        assert!(!clk.conflicting);
        assert_eq!(netlist.sites(), 2);
    }

    #[test]
    fn test_scan_supply_with_many_balls() {
        let pins = sheet(
            "Power",
            "Net Name,Ball,Channel\n\
             VDD,C1,PF1-PF4_DPS_317\n\
             VDD,C2,PF1-PF4_DPS_317\n\
             VDD,C3,PF1-PF4_DPS_317\n",
        );
        let netlist = Netlist::scan(&[pins], &[]);
        let vdd = netlist.get("VDD").unwrap();
        assert_eq!(vdd.channels, vec!["317-P1-P4"]);
        assert_eq!(vdd.balls, vec!["C1", "C2", "C3"]);
        assert_eq!(vdd.locations.len(), 3);
    }

    #[test]
    fn test_scan_trigger_marker() {
        let pins = sheet("Sheet1", "Name,Ball,Channel\nTRIG_A,\"\"\"\"\"\",10150\n");
        let netlist = Netlist::scan(&[pins], &[]);
        let trig = netlist.get("TRIG_A").unwrap();
        assert!(trig.is_trigger());
        assert_eq!(trig.real_balls().count(), 0);
    }

    #[test]
    fn test_scan_skips_rows_without_ball() {
        let pins = sheet("Sheet1", "Name,Ball,Channel\nTRIG_A,,10150\n");
        let netlist = Netlist::scan(&[pins], &[]);
        assert!(netlist.is_empty());
    }

    #[test]
    fn test_scan_ball_from_later_sheet() {
        let channels = sheet("Channels", "Pin Name,Channel\nTDI,10101\n");
        let balls = sheet("Balls", "Pin Name,Ball,Channel\nTDI,A1,10101\n");
        let netlist = Netlist::scan(&[channels, balls], &[]);
        let tdi = netlist.get("TDI").unwrap();
        assert_eq!(tdi.channels, vec!["10101"]);
        assert_eq!(tdi.balls, vec!["A1"]);
        assert!(!tdi.is_trigger());
        assert_eq!(tdi.first_location().unwrap().to_string(), "Balls:Row2");
    }

    #[test]
    fn test_scan_conflicting_entry() {
        let pins = sheet(
            "Sheet1",
            "Name,Ball,Channel\nDQ0,A1,10101\nDQ0,A2,10102\n",
        );
        let netlist = Netlist::scan(&[pins], &[]);
        assert!(netlist.get("DQ0").unwrap().conflicting);
    }

    #[test]
    fn test_scan_excluded_names() {
        let pins = sheet("Sheet1", "Name,Ball,Channel\nNC,A1,10101\nTCK,A2,10102\n");
        let netlist = Netlist::scan(&[pins], &["NC".to_string()]);
        assert!(!netlist.contains("NC"));
        assert!(netlist.contains("TCK"));
    }

    #[test]
    fn test_ignored_length_column() {
        let pins = sheet(
            "Sheet1",
            "Name,Ball,Channel,length\nTMS,A4,10104,10105\n",
        );
        let netlist = Netlist::scan(&[pins], &[]);
        assert_eq!(netlist.get("TMS").unwrap().channels, vec!["10104"]);
    }

    #[test]
    fn test_upper_case_cell_keeps_column() {
        let pins = sheet(
            "Sheet1",
            "Name,Ball,Channel\nTDI,A1,10101 SILENT\nTDO,A2,10102\n",
        );
        let netlist = Netlist::scan(&[pins], &[]);
        assert_eq!(netlist.get("TDI").unwrap().channels, vec!["10101"]);
        assert_eq!(netlist.get("TDO").unwrap().channels, vec!["10102"]);
    }

    #[test]
    fn test_parse_assignments() {
        let content = "Pin Name,Channel Site-1,Channel Site-2,Ball Number(s),Location\n\
                       TDI,10101,20101,A1,Pins:Row2\n\
                       VDD,31701,C1,C2,Power:Row2;Power:Row3\n\
                       TRIG,10150,\"\"\n\
                       BAD,10101,A1,10102,A2\n";
        let netlist = Netlist::parse_assignments_str(content).unwrap();
        assert_eq!(netlist.sites(), 2);

        let tdi = netlist.get("TDI").unwrap();
        assert_eq!(tdi.channels, vec!["10101", "20101"]);
        assert_eq!(tdi.balls, vec!["A1"]);
        assert_eq!(tdi.locations[0].to_string(), "Pins:Row2");

        let vdd = netlist.get("VDD").unwrap();
        assert_eq!(vdd.balls, vec!["C1", "C2"]);
        assert_eq!(vdd.locations.len(), 2);

        assert!(netlist.get("TRIG").unwrap().is_trigger());
        assert!(netlist.get("BAD").unwrap().conflicting);
    }

    #[test]
    fn test_parse_assignments_requires_header() {
        assert!(Netlist::parse_assignments_str("Name,Ball\nA,B,C\n").is_err());
    }

    #[test]
    fn test_location_round_trip() {
        let loc: Location = "Pin Map:Row12".parse().unwrap();
        assert_eq!(loc.sheet, "Pin Map");
        assert_eq!(loc.row, 12);
        assert!("Row12".parse::<Location>().is_err());
    }
}
