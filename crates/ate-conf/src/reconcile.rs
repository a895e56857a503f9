//! Name reconciliation between the STIL signal list and the netlist

use indexmap::IndexMap;
use std::fmt::Write;

use crate::mapping::cross_match;
use crate::parser::{Direction, Netlist, SignalList};

/// Differences between the two name universes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// STIL names missing from the netlist, in STIL order
    pub stil_only: Vec<String>,
    /// Netlist names missing from the STIL list, in netlist order
    pub net_only: Vec<String>,
    /// Netlist-only channels without a ball; treated as inputs
    pub triggers: Vec<String>,
    /// Netlist name → STIL name it stands in for
    pub transfers: IndexMap<String, String>,
}

impl Reconciliation {
    pub fn new(signals: &SignalList, netlist: &Netlist) -> Self {
        let stil_only: Vec<String> = signals
            .names()
            .filter(|name| !netlist.contains(name))
            .map(str::to_string)
            .collect();

        let mut net_only = Vec::new();
        let mut triggers = Vec::new();
        for (name, entry) in &netlist.entries {
            if signals.contains(name) {
                continue;
            }
            if entry.is_trigger() {
                triggers.push(name.clone());
            } else {
                net_only.push(name.clone());
            }
        }

        let transfers = cross_match(&stil_only, &net_only);
        if !transfers.is_empty() {
            log::info!("Found {} renamed pin(s)", transfers.len());
        }

        Reconciliation {
            stil_only,
            net_only,
            triggers,
            transfers,
        }
    }

    pub fn has_differences(&self) -> bool {
        !self.stil_only.is_empty() || !self.net_only.is_empty()
    }

    /// Netlist name a STIL name was transferred to
    pub fn transferred_to(&self, stil_name: &str) -> Option<&str> {
        self.transfers
            .iter()
            .find(|(_, stil)| stil.as_str() == stil_name)
            .map(|(net, _)| net.as_str())
    }

    /// The signal list under netlist names: transferred STIL names take their
    /// netlist name and triggers join as inputs
    pub fn effective_signals(&self, signals: &SignalList) -> SignalList {
        let renamed = signals.signals.iter().map(|signal| {
            let name = self
                .transferred_to(&signal.name)
                .unwrap_or(&signal.name)
                .to_string();
            (name, signal.direction)
        });
        let triggers = self
            .triggers
            .iter()
            .map(|name| (name.clone(), Direction::In));
        SignalList::from_statements(renamed.chain(triggers))
    }

    /// Human-readable difference report
    pub fn render_diff(&self, netlist: &Netlist) -> String {
        let mut out = String::new();
        writeln!(out, "In .stil but not in netlist:").unwrap();
        for name in &self.stil_only {
            if self.transferred_to(name).is_some() {
                writeln!(out, "{name} (transfer found)").unwrap();
            } else {
                writeln!(out, "{name}").unwrap();
            }
        }
        writeln!(out).unwrap();
        writeln!(out, "In netlist but not in .stil:").unwrap();
        for name in &self.net_only {
            match netlist.get(name).and_then(|e| e.first_location()) {
                Some(location) => writeln!(out, "{name} {location}").unwrap(),
                None => writeln!(out, "{name}").unwrap(),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Sheet;

    fn netlist(csv: &str) -> Netlist {
        let sheet = Sheet::from_reader("Pins", csv.as_bytes()).unwrap();
        Netlist::scan(&[sheet], &[])
    }

    #[test]
    fn test_reconcile() {
        let signals =
            SignalList::parse_str("Signals { TCK In; JTAG_TDO Out; SPARE In; }").unwrap();
        let netlist = netlist(
            "Pin Name,Ball,Channel\n\
             TCK,A1,10101\n\
             TDO,A2,10102\n\
             TRIG,\"\"\"\"\"\",10150\n\
             EXTRA,A4,10104\n",
        );
        let rec = Reconciliation::new(&signals, &netlist);

        assert_eq!(rec.stil_only, vec!["SPARE", "JTAG_TDO"]);
        assert_eq!(rec.net_only, vec!["TDO", "EXTRA"]);
        assert_eq!(rec.triggers, vec!["TRIG"]);
        assert_eq!(rec.transferred_to("JTAG_TDO"), Some("TDO"));

        let effective = rec.effective_signals(&signals);
        assert_eq!(effective.get("TDO").unwrap().direction, Direction::Out);
        assert_eq!(effective.get("TRIG").unwrap().direction, Direction::In);
        assert!(!effective.contains("JTAG_TDO"));

        insta::assert_snapshot!(rec.render_diff(&netlist), @r"
        In .stil but not in netlist:
        SPARE
        JTAG_TDO (transfer found)

        In netlist but not in .stil:
        TDO Pins:Row3
        EXTRA Pins:Row5
        ");
    }

    #[test]
    fn test_no_differences() {
        let signals = SignalList::parse_str("Signals { TCK In; }").unwrap();
        let netlist = netlist("Pin Name,Ball,Channel\nTCK,A1,10101\n");
        let rec = Reconciliation::new(&signals, &netlist);
        assert!(!rec.has_differences());
        assert!(rec.transfers.is_empty());
    }
}
