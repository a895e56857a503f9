//! Parser for STIL `Signals { }` blocks and the signal assignments CSV

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::InputError;

/// Header line of the signal assignments CSV
pub const STIL_ASSIGNMENTS_HEADER: &str = "Pin Name,In/Out/InOut";

static SIGNALS_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Signals\s*\{").unwrap());

/// Declared direction of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    In,
    Out,
    InOut,
}

impl Direction {
    /// Parse the STIL keyword (`In`, `Out`, `InOut`)
    pub fn parse(word: &str) -> Option<Self> {
        match word {
            "In" => Some(Direction::In),
            "Out" => Some(Direction::Out),
            "InOut" => Some(Direction::InOut),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "In",
            Direction::Out => "Out",
            Direction::InOut => "InOut",
        }
    }

    /// Context code used by `CONF` and `DFGP` records
    pub fn conf_code(&self) -> &'static str {
        match self {
            Direction::In => "I",
            Direction::Out => "O",
            Direction::InOut => "IO",
        }
    }

    pub fn from_conf_code(code: &str) -> Option<Self> {
        match code {
            "I" => Some(Direction::In),
            "O" => Some(Direction::Out),
            "IO" => Some(Direction::InOut),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pin name with its declared direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub name: String,
    pub direction: Direction,
}

/// Deduplicated signals, ordered by direction then name
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SignalList {
    pub signals: Vec<Signal>,
}

impl SignalList {
    /// Parse the `Signals { }` block of a single `.stil` file
    pub fn parse(path: &Path) -> Result<Self> {
        Self::parse_files(&[path.to_path_buf()])
    }

    /// Parse and merge the `Signals { }` blocks of several `.stil` files
    pub fn parse_files(paths: &[PathBuf]) -> Result<Self> {
        let mut statements = Vec::new();
        for path in paths {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read STIL file: {}", path.display()))?;
            let found = parse_statements(&content)
                .with_context(|| format!("Failed to parse STIL file: {}", path.display()))?;
            log::debug!("{}: {} signal statements", path.display(), found.len());
            statements.extend(found);
        }
        Ok(Self::from_statements(statements))
    }

    /// Parse a `Signals { }` block from string content
    pub fn parse_str(content: &str) -> Result<Self> {
        Ok(Self::from_statements(parse_statements(content)?))
    }

    /// Build a list from raw `(name, direction)` statements.
    ///
    /// A name declared `InOut` anywhere, or declared both `In` and `Out`,
    /// becomes `InOut`.
    pub fn from_statements<I>(statements: I) -> Self
    where
        I: IntoIterator<Item = (String, Direction)>,
    {
        let mut seen: BTreeMap<String, [bool; 3]> = BTreeMap::new();
        for (name, direction) in statements {
            let flags = seen.entry(name).or_default();
            flags[direction as usize] = true;
        }

        let mut signals: Vec<Signal> = seen
            .into_iter()
            .map(|(name, [is_in, is_out, is_inout])| {
                let direction = if is_inout || (is_in && is_out) {
                    Direction::InOut
                } else if is_out {
                    Direction::Out
                } else {
                    Direction::In
                };
                Signal { name, direction }
            })
            .collect();
        signals.sort_by(|a, b| (a.direction, &a.name).cmp(&(b.direction, &b.name)));

        SignalList { signals }
    }

    /// Treat every name as bidirectional
    pub fn from_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::from_statements(
            names
                .into_iter()
                .map(|name| (name.to_string(), Direction::InOut)),
        )
    }

    /// Read a signal assignments CSV written by [`crate::emit::render_stil_assignments`]
    pub fn parse_assignments(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| {
            format!("Failed to read signal assignments: {}", path.display())
        })?;
        Self::parse_assignments_str(&content)
            .with_context(|| format!("Invalid signal assignments: {}", path.display()))
    }

    /// Parse signal assignments CSV content. Group sections are ignored;
    /// groups are always derived from the signals themselves.
    pub fn parse_assignments_str(content: &str) -> Result<Self> {
        let mut lines = content.lines();
        match lines.next() {
            Some(header) if header.contains(STIL_ASSIGNMENTS_HEADER) => {}
            _ => {
                return Err(InputError::InvalidHeader {
                    expected: STIL_ASSIGNMENTS_HEADER,
                }
                .into())
            }
        }

        let mut statements = Vec::new();
        for line in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                break;
            }
            let Some((name, direction)) = line.split_once(',') else {
                continue;
            };
            match Direction::parse(direction.trim()) {
                Some(direction) => statements.push((name.trim().to_string(), direction)),
                None => log::warn!("Skipping signal assignment with unknown direction: {line}"),
            }
        }

        Ok(Self::from_statements(statements))
    }

    /// Combine two lists under the same dedup rules as a single parse
    pub fn merge(&self, other: &SignalList) -> SignalList {
        Self::from_statements(
            self.signals
                .iter()
                .chain(&other.signals)
                .map(|s| (s.name.clone(), s.direction)),
        )
    }

    pub fn get(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names declared with exactly this direction, in list order
    pub fn names_with(&self, direction: Direction) -> Vec<&str> {
        self.signals
            .iter()
            .filter(|s| s.direction == direction)
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signals.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Split the `Signals { }` block into `(name, direction)` statements
fn parse_statements(content: &str) -> Result<Vec<(String, Direction)>> {
    let start = SIGNALS_BLOCK
        .find(content)
        .ok_or(InputError::MissingSignalsBlock)?
        .end();
    let body = &content[start..];
    let body = &body[..body.find('}').unwrap_or(body.len())];
    let body = body.replace(['\n', '\r'], " ").replace('"', "");

    let mut statements = Vec::new();
    for statement in body.split(';') {
        let mut words = statement.split_whitespace();
        let Some(name) = words.next() else {
            continue;
        };
        match words.next().and_then(Direction::parse) {
            Some(direction) => statements.push((name.to_string(), direction)),
            None => log::warn!(
                "Skipping signal statement without a direction: {}",
                statement.trim()
            ),
        }
    }

    Ok(statements)
}
