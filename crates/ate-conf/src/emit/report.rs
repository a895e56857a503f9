//! Error log and name transfer reports

use std::collections::HashMap;
use std::fmt::Write;

use super::config::EmittedConfig;
use crate::mapping::normalize_channel;
use crate::parser::Netlist;
use crate::reconcile::Reconciliation;

/// Suspicious findings in an emitted config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Oddities {
    /// The same channel, ball or analog pad claimed by several records
    pub repeated: Vec<String>,
    /// Pins with a definition count different from the site count
    pub unusual: Vec<String>,
    pub conflicting: Vec<String>,
    pub unrecognized: Vec<String>,
}

impl Oddities {
    pub fn is_empty(&self) -> bool {
        self.repeated.is_empty()
            && self.unusual.is_empty()
            && self.conflicting.is_empty()
            && self.unrecognized.is_empty()
    }

    pub fn render(&self) -> String {
        let sections = [
            ("Repeated Definitions:", &self.repeated),
            ("Unusual Occurrences:", &self.unusual),
            ("Conflicting Assignments:", &self.conflicting),
            ("Unrecognized Channels:", &self.unrecognized),
        ];
        sections
            .iter()
            .filter(|(_, lines)| !lines.is_empty())
            .map(|(title, lines)| format!("{title}\n{}", lines.join("\n")))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Inspect the definition records of an emitted config
///
/// Line numbers refer to the written `.conf` file, whose first line is the
/// header.
pub fn find_oddities(emitted: &EmittedConfig, netlist: &Netlist, sites: usize) -> Oddities {
    let mut oddities = Oddities::default();
    let mut first_seen: HashMap<String, String> = HashMap::new();

    for (idx, record) in emitted.config.definitions().enumerate() {
        let line = idx + 2;
        let location = record
            .pin_name()
            .and_then(|name| netlist.get(name))
            .and_then(|entry| entry.site_location(record.site()))
            .map(ToString::to_string)
            .unwrap_or_default();
        let here = format!("{line} {location}").trim_end().to_string();

        for item in record.resources() {
            match first_seen.get(&item) {
                Some(first) => oddities.repeated.push(format!(
                    "Repeated \"{item}\" on .conf line {here}, first occurrence .conf line {first}"
                )),
                None => {
                    first_seen.insert(item, here.clone());
                }
            }
        }
    }

    for (pin, count) in &emitted.pin_counts {
        if *count != sites {
            oddities.unusual.push(format!(
                "{count} occurrence(s) of {pin} when there should be {sites}"
            ));
        }
    }

    for pin in &emitted.conflicting {
        let locations = netlist
            .get(pin)
            .map(|entry| {
                entry
                    .locations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(";")
            })
            .unwrap_or_default();
        oddities
            .conflicting
            .push(format!("{pin} {locations}").trim_end().to_string());
    }

    for (pin, raw) in &emitted.invalid_channels {
        oddities.unrecognized.push(format!("{pin}: {raw}"));
    }

    oddities
}

/// Name differences followed by oddities; `None` when there is nothing to report
pub fn render_error_log(
    reconciliation: &Reconciliation,
    netlist: &Netlist,
    oddities: &Oddities,
) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if reconciliation.has_differences() {
        parts.push(reconciliation.render_diff(netlist).trim().to_string());
    }
    if !oddities.is_empty() {
        parts.push(oddities.render());
    }
    if parts.is_empty() {
        return None;
    }
    let mut log = parts.join("\n\n");
    log.push('\n');
    Some(log)
}

/// `Stil Name --> Netlist Name, Channel` listing of fuzzy matches
pub fn render_transfers(reconciliation: &Reconciliation, netlist: &Netlist) -> Option<String> {
    if reconciliation.transfers.is_empty() {
        return None;
    }

    let mut out = String::new();
    writeln!(out, "Stil Name --> Netlist Name, Channel").unwrap();
    for (net_name, stil_name) in &reconciliation.transfers {
        let mut fields = vec![net_name.clone()];
        if let Some(entry) = netlist.get(net_name) {
            for raw in &entry.channels {
                fields.extend(normalize_channel(raw).codes().iter().cloned());
            }
        }
        writeln!(out, "{stil_name} --> {}", fields.join(", ")).unwrap();
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::{emit_config, AnalogCard, EmitOptions};
    use crate::mapping::SupplyRanges;
    use crate::parser::{Sheet, SignalList};

    fn run(stil: &str, csv: &str, sites: usize) -> (Netlist, Reconciliation, EmittedConfig) {
        let sheet = Sheet::from_reader("Pins", csv.as_bytes()).unwrap();
        let netlist = Netlist::scan(&[sheet], &[]);
        let signals = SignalList::parse_str(stil).unwrap();
        let rec = Reconciliation::new(&signals, &netlist);
        let options = EmitOptions {
            supplies: SupplyRanges::select(&["PS9G".to_string()], &[]).unwrap(),
            analog_card: AnalogCard::Mce,
            sites,
        };
        let emitted = emit_config(&netlist, &rec.effective_signals(&signals), &rec, &options);
        (netlist, rec, emitted)
    }

    #[test]
    fn test_repeated_channel() {
        let (netlist, _, emitted) = run(
            "Signals { TCK In; TMS In; }",
            "Name,Ball,Channel\nTCK,A1,10101\nTMS,A2,10101\n",
            1,
        );
        let oddities = find_oddities(&emitted, &netlist, 1);
        assert_eq!(
            oddities.repeated,
            vec![
                "Repeated \"10101\" on .conf line 3 Pins:Row3, first occurrence .conf line 2 Pins:Row2"
            ]
        );
        assert!(oddities.unusual.is_empty());
    }

    #[test]
    fn test_unusual_occurrences() {
        let (netlist, _, emitted) = run(
            "Signals { TCK In; TMS In; }",
            "Name,Site 1,Site 2,Ball\nTCK,10101,20101,A1\nTMS,10102,,A2\n",
            2,
        );
        let oddities = find_oddities(&emitted, &netlist, 2);
        assert_eq!(
            oddities.unusual,
            vec!["1 occurrence(s) of TMS when there should be 2"]
        );
    }

    #[test]
    fn test_error_log() {
        let (netlist, rec, emitted) = run(
            "Signals { TCK In; GONE In; }",
            "Name,Ball,Channel\nTCK,A1,10101\nNEW,A2,10102\nDQ0,A3,10103\nDQ0,A4,10104\n",
            1,
        );
        let oddities = find_oddities(&emitted, &netlist, 1);
        let log = render_error_log(&rec, &netlist, &oddities).unwrap();
        insta::assert_snapshot!(log, @r"
        In .stil but not in netlist:
        GONE

        In netlist but not in .stil:
        NEW Pins:Row3
        DQ0 Pins:Row4

        Conflicting Assignments:
        DQ0 Pins:Row4;Pins:Row5
        ");
    }

    #[test]
    fn test_clean_run_has_no_log() {
        let (netlist, rec, emitted) = run(
            "Signals { TCK In; }",
            "Name,Ball,Channel\nTCK,A1,10101\n",
            1,
        );
        let oddities = find_oddities(&emitted, &netlist, 1);
        assert!(render_error_log(&rec, &netlist, &oddities).is_none());
        assert!(render_transfers(&rec, &netlist).is_none());
    }

    #[test]
    fn test_transfer_report() {
        let (netlist, rec, _) = run(
            "Signals { JTAG_TDO Out; }",
            "Name,Site 1,Site 2,Ball\nTDO,10102,20102,A2\n",
            2,
        );
        let report = render_transfers(&rec, &netlist).unwrap();
        assert_eq!(
            report,
            "Stil Name --> Netlist Name, Channel\nJTAG_TDO --> TDO, 10102, 20102\n"
        );
    }
}
