//! Utilities over existing configuration files

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt::Write;
use std::fs;
use std::path::Path;

use crate::parser::{Direction, SignalList};

/// Rebuild a signal list from the `CONF I/O/IO` context lines of a config
pub fn config_to_signals(content: &str) -> SignalList {
    let mut statements = Vec::new();
    for line in content.lines() {
        let Some(rest) = line.trim().strip_prefix("CONF ") else {
            continue;
        };
        let Some((code, _)) = rest.split_once(',') else {
            continue;
        };
        let Some(direction) = Direction::from_conf_code(code) else {
            continue;
        };
        let (Some(open), Some(close)) = (rest.find('('), rest.rfind(')')) else {
            continue;
        };
        if close < open {
            continue;
        }
        statements.extend(
            rest[open + 1..close]
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| (name.to_string(), direction)),
        );
    }
    SignalList::from_statements(statements)
}

/// STIL `Signals { }` block for a signal list
pub fn render_signals_block(signals: &SignalList) -> String {
    let mut out = String::new();
    writeln!(out, "Signals {{").unwrap();
    for signal in &signals.signals {
        writeln!(out, "{} {};", signal.name, signal.direction).unwrap();
    }
    writeln!(out, "}}").unwrap();
    out
}

/// Convert a config file to a STIL signals file
pub fn config_to_stil(content: &str) -> String {
    render_signals_block(&config_to_signals(content))
}

/// Lines present in only one of two config files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDiff {
    pub only_left: Vec<String>,
    pub only_right: Vec<String>,
}

impl ConfigDiff {
    pub fn is_empty(&self) -> bool {
        self.only_left.is_empty() && self.only_right.is_empty()
    }

    pub fn render(&self, left: &str, right: &str) -> String {
        let mut out = String::new();
        writeln!(out, "In {left} but not in {right}").unwrap();
        for line in &self.only_left {
            writeln!(out, "    {line}").unwrap();
        }
        writeln!(out, "In {right} but not in {left}").unwrap();
        for line in &self.only_right {
            writeln!(out, "    {line}").unwrap();
        }
        out
    }
}

/// Lines up to and including the `PSTE` record
fn definition_lines(content: &str) -> BTreeSet<&str> {
    let mut lines = BTreeSet::new();
    for line in content.lines() {
        lines.insert(line.trim_end());
        if line.contains("PSTE") {
            break;
        }
    }
    lines
}

/// Compare the definition sections of two configs as sets of lines
pub fn compare_configs(left: &str, right: &str) -> ConfigDiff {
    let left = definition_lines(left);
    let right = definition_lines(right);
    ConfigDiff {
        only_left: left.difference(&right).map(|s| s.to_string()).collect(),
        only_right: right.difference(&left).map(|s| s.to_string()).collect(),
    }
}

/// Read and compare two config files
pub fn compare_config_files(left: &Path, right: &Path) -> Result<ConfigDiff> {
    let read = |path: &Path| {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))
    };
    Ok(compare_configs(&read(left)?, &read(right)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"hp93000,config,0.1
DFPN 10101,"A1",(TCK)
DFPN 10102,"A2",(TDO)
DFPN 10103,"A3",(DQ0)
PSTE 1
CONF I,F160,(TCK)
CONF O,F160,(TDO)
CONF IO,F160,(DQ0)
CONF DC,POWER,(VDD)
NOOP "7.4.2",,,
"#;

    #[test]
    fn test_config_to_stil() {
        insta::assert_snapshot!(config_to_stil(CONFIG), @r"
        Signals {
        TCK In;
        TDO Out;
        DQ0 InOut;
        }
        ");
    }

    #[test]
    fn test_config_to_stil_round_trips_through_parser() {
        let signals = SignalList::parse_str(&config_to_stil(CONFIG)).unwrap();
        assert_eq!(signals, config_to_signals(CONFIG));
        assert!(!signals.contains("VDD"));
    }

    #[test]
    fn test_compare_configs() {
        let other = CONFIG
            .replace("DFPN 10102,\"A2\",(TDO)", "DFPN 10104,\"A2\",(TDO)")
            .replace("CONF O,F160,(TDO)", "CONF O,F160,(TDO,EXTRA)");
        let diff = compare_configs(CONFIG, &other);
        assert_eq!(diff.only_left, vec!["DFPN 10102,\"A2\",(TDO)"]);
        assert_eq!(diff.only_right, vec!["DFPN 10104,\"A2\",(TDO)"]);
        assert!(compare_configs(CONFIG, CONFIG).is_empty());

        insta::assert_snapshot!(diff.render("a.conf", "b.conf"), @r#"
        In a.conf but not in b.conf
            DFPN 10102,"A2",(TDO)
        In b.conf but not in a.conf
            DFPN 10104,"A2",(TDO)
        "#);
    }
}
