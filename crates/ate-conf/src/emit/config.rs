//! Tester configuration records and the config file emitter

use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt::{self, Write};
use std::str::FromStr;

use crate::error::InputError;
use crate::mapping::{
    build_groups, classify, group_label, normalize_channel, AnalogPad, Channel, ChannelList,
    PinRole, SupplyRanges,
};
use crate::parser::{Direction, NetEntry, Netlist, SignalList};
use crate::reconcile::Reconciliation;

pub const CONFIG_HEADER: &str = "hp93000,config,0.1";
pub const CONFIG_FOOTER: &str = "NOOP \"7.4.2\",,,";

/// Label of the group collecting trigger channels
pub const TRIGGER_GROUP: &str = "triggers";

/// Analog card model, prefixed to the slot in `DFAN` records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum AnalogCard {
    #[default]
    Mce,
    Mcb,
    Mca,
}

impl AnalogCard {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalogCard::Mce => "MCE",
            AnalogCard::Mcb => "MCB",
            AnalogCard::Mca => "MCA",
        }
    }
}

impl fmt::Display for AnalogCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalogCard {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MCE" => Ok(AnalogCard::Mce),
            "MCB" => Ok(AnalogCard::Mcb),
            "MCA" => Ok(AnalogCard::Mca),
            _ => Err(InputError::UnknownAnalogCard(s.to_string())),
        }
    }
}

impl TryFrom<String> for AnalogCard {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One line of a configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// `DFPN ch,"ball",(name)`
    Pin {
        channels: Vec<String>,
        ball: String,
        name: String,
    },
    /// `DFPS ch,POS,(name)`
    Supply { channels: Vec<String>, name: String },
    /// `DFAN "<card><slot>,<mode>,<i|o>","ball",(name)`
    Analog {
        card: AnalogCard,
        pad: AnalogPad,
        ball: String,
        name: String,
    },
    /// `PALS site,ch,,(name)`
    SiteAlias {
        site: usize,
        channels: Vec<String>,
        name: String,
    },
    /// `PSTE sites`
    Sites(usize),
    /// `CONF <I|O|IO>,F160,(names)`
    Context {
        direction: Direction,
        names: Vec<String>,
    },
    /// `CONF DC,POWER,(names)`
    Power(Vec<String>),
    /// `DFGP <I|O>,(members),(label)`
    Group {
        direction: Direction,
        members: Vec<String>,
        label: String,
    },
}

impl Record {
    /// Position of the record type in the file
    pub fn rank(&self) -> u8 {
        match self {
            Record::Pin { .. } => 0,
            Record::Supply { .. } => 1,
            Record::Analog { .. } => 2,
            Record::SiteAlias { .. } => 3,
            Record::Sites(_) => 4,
            Record::Context { .. } | Record::Power(_) => 5,
            Record::Group { .. } => 6,
        }
    }

    /// Record type, then the text from the last `(` on
    pub fn sort_key(&self) -> (u8, String) {
        let line = self.to_string();
        let tail = line.rfind('(').map_or("", |idx| &line[idx..]).to_string();
        (self.rank(), tail)
    }

    /// Pin name of a definition record
    pub fn pin_name(&self) -> Option<&str> {
        match self {
            Record::Pin { name, .. }
            | Record::Supply { name, .. }
            | Record::Analog { name, .. }
            | Record::SiteAlias { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Site the definition record applies to
    pub fn site(&self) -> usize {
        match self {
            Record::SiteAlias { site, .. } => *site,
            _ => 1,
        }
    }

    /// Channel codes, balls and analog descriptors claimed by this record
    pub fn resources(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        match self {
            Record::Pin { channels, ball, .. } => {
                out.extend(channels.iter().cloned());
                out.push(ball.clone());
            }
            Record::Supply { channels, .. } | Record::SiteAlias { channels, .. } => {
                out.extend(channels.iter().cloned());
            }
            Record::Analog {
                card, pad, ball, ..
            } => {
                out.push(analog_descriptor(*card, pad));
                out.push(ball.clone());
            }
            _ => {}
        }
        out.retain(|item| item.len() >= 2);
        out
    }
}

/// `MCE231,17,o`; the slot is the one written in the netlist channel
fn analog_descriptor(card: AnalogCard, pad: &AnalogPad) -> String {
    format!("{card}{},{},{}", pad.slot, pad.mode, pad.io_code())
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Pin {
                channels,
                ball,
                name,
            } => write!(f, "DFPN {},\"{ball}\",({name})", ChannelList(channels)),
            Record::Supply { channels, name } => {
                write!(f, "DFPS {},POS,({name})", ChannelList(channels))
            }
            Record::Analog {
                card,
                pad,
                ball,
                name,
            } => write!(
                f,
                "DFAN \"{}\",\"{ball}\",({name})",
                analog_descriptor(*card, pad)
            ),
            Record::SiteAlias {
                site,
                channels,
                name,
            } => write!(f, "PALS {site},{},,({name})", ChannelList(channels)),
            Record::Sites(sites) => write!(f, "PSTE {sites}"),
            Record::Context { direction, names } => {
                write!(f, "CONF {},F160,({})", direction.conf_code(), names.join(","))
            }
            Record::Power(names) => write!(f, "CONF DC,POWER,({})", names.join(",")),
            Record::Group {
                direction,
                members,
                label,
            } => write!(
                f,
                "DFGP {},({}),({label})",
                direction.conf_code(),
                members.join(",")
            ),
        }
    }
}

/// An ordered configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub records: Vec<Record>,
}

impl ConfigFile {
    /// Stable sort by record type, then by the trailing parenthesized field
    pub fn sort(&mut self) {
        self.records.sort_by_cached_key(Record::sort_key);
    }

    /// Definition records (everything before `PSTE`)
    pub fn definitions(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().take_while(|r| !matches!(r, Record::Sites(_)))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        writeln!(out, "{CONFIG_HEADER}").unwrap();
        for record in &self.records {
            writeln!(out, "{record}").unwrap();
        }
        writeln!(out, "{CONFIG_FOOTER}").unwrap();
        out
    }
}

/// Knobs of a config emission
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    pub supplies: SupplyRanges,
    pub analog_card: AnalogCard,
    pub sites: usize,
}

/// A config file plus what happened while building it
#[derive(Debug, Clone, Default)]
pub struct EmittedConfig {
    pub config: ConfigFile,
    /// Definition records per pin (site 1 plus aliases)
    pub pin_counts: IndexMap<String, usize>,
    /// Pins defined as power supplies, in emission order
    pub supplies: Vec<String>,
    /// Pins skipped because their assignments conflict
    pub conflicting: Vec<String>,
    /// `(pin, raw channel)` pairs that could not be normalized
    pub invalid_channels: Vec<(String, String)>,
}

impl EmittedConfig {
    fn push(&mut self, record: Record) -> bool {
        if self.config.records.contains(&record) {
            return false;
        }
        self.config.records.push(record);
        true
    }

    fn count(&mut self, name: &str) {
        *self.pin_counts.entry(name.to_string()).or_default() += 1;
    }
}

/// Build the configuration file
///
/// `signals` must already be the effective list of the reconciliation
/// (transferred names and triggers included). Pins are visited in netlist
/// order, then signal order, each once.
pub fn emit_config(
    netlist: &Netlist,
    signals: &SignalList,
    reconciliation: &Reconciliation,
    options: &EmitOptions,
) -> EmittedConfig {
    let mut out = EmittedConfig::default();
    let mut visited: HashSet<&str> = HashSet::new();

    for name in netlist.names().chain(signals.names()) {
        if !visited.insert(name) {
            continue;
        }
        let Some(entry) = netlist.get(name) else {
            continue;
        };
        if entry.conflicting {
            log::debug!("{name}: conflicting assignments, skipped");
            out.conflicting.push(name.to_string());
            continue;
        }
        emit_pin(&mut out, name, entry, signals.contains(name), options);
    }

    if !out.supplies.is_empty() {
        out.push(Record::Power(out.supplies.clone()));
    }
    out.push(Record::Sites(options.sites));

    let defined: HashSet<String> = out
        .config
        .records
        .iter()
        .filter(|r| matches!(r, Record::Pin { .. }))
        .filter_map(|r| r.pin_name().map(str::to_string))
        .collect();
    let keep = |names: &[String]| -> Vec<String> {
        names
            .iter()
            .filter(|n| defined.contains(n.as_str()))
            .cloned()
            .collect()
    };

    for direction in [Direction::In, Direction::Out, Direction::InOut] {
        let names: Vec<String> = signals
            .names_with(direction)
            .into_iter()
            .map(str::to_string)
            .collect();
        let names = keep(&names);
        if !names.is_empty() {
            out.push(Record::Context { direction, names });
        }
    }

    let grouped = SignalList {
        signals: signals
            .signals
            .iter()
            .filter(|s| !reconciliation.triggers.contains(&s.name))
            .cloned()
            .collect(),
    };
    for group in build_groups(&grouped) {
        let members = keep(&group.members);
        let label = group_label(&members);
        if label.len() < 3 || members.len() < 2 {
            continue;
        }
        out.push(Record::Group {
            direction: group.direction,
            members,
            label,
        });
    }

    let triggers = keep(&reconciliation.triggers);
    if triggers.len() > 1 {
        out.push(Record::Group {
            direction: Direction::In,
            members: triggers,
            label: TRIGGER_GROUP.to_string(),
        });
    }

    out.config.sort();
    out
}

fn emit_pin(
    out: &mut EmittedConfig,
    name: &str,
    entry: &NetEntry,
    known: bool,
    options: &EmitOptions,
) {
    // One slot per site; invalid channels stay in place so site numbers hold
    let channels: Vec<Channel> = entry
        .channels
        .iter()
        .map(|raw| normalize_channel(raw))
        .collect();
    for channel in &channels {
        if let Channel::Invalid(raw) = channel {
            log::warn!("{name}: unrecognized channel `{raw}`");
            out.invalid_channels.push((name.to_string(), raw.clone()));
        }
    }
    if matches!(channels.first(), None | Some(Channel::Invalid(_))) {
        return;
    }

    match classify(&channels, entry.real_balls().count(), &options.supplies) {
        PinRole::Analog => {
            if !known {
                return;
            }
            let Some(Channel::Analog(pad)) = channels.iter().find(|c| c.is_analog()) else {
                return;
            };
            let mut balls = entry.real_balls();
            let ball = match (balls.next(), balls.next()) {
                (Some(ball), None) => ball.to_string(),
                _ => String::new(),
            };
            out.push(Record::Analog {
                card: options.analog_card,
                pad: pad.clone(),
                ball,
                name: name.to_string(),
            });
        }
        PinRole::Supply => {
            if out.push(Record::Supply {
                channels: channels[0].codes().to_vec(),
                name: name.to_string(),
            }) {
                out.count(name);
            }
            if !out.supplies.iter().any(|s| s == name) {
                out.supplies.push(name.to_string());
            }
            emit_aliases(out, name, &channels);
        }
        PinRole::Digital => {
            if !known {
                return;
            }
            let ball = entry.real_balls().next().unwrap_or_default().to_string();
            if out.push(Record::Pin {
                channels: channels[0].codes().to_vec(),
                ball,
                name: name.to_string(),
            }) {
                out.count(name);
            }
            emit_aliases(out, name, &channels);
        }
    }
}

/// `PALS` records for sites 2 and up
fn emit_aliases(out: &mut EmittedConfig, name: &str, channels: &[Channel]) {
    if !out.pin_counts.contains_key(name) {
        return;
    }
    for (idx, channel) in channels.iter().enumerate().skip(1) {
        let codes = channel.codes();
        if codes.is_empty() {
            continue;
        }
        if out.push(Record::SiteAlias {
            site: idx + 1,
            channels: codes.to_vec(),
            name: name.to_string(),
        }) {
            out.count(name);
        }
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

    fn options(sites: usize) -> EmitOptions {
        EmitOptions {
            supplies: SupplyRanges::select(&["PS9G".to_string()], &[]).unwrap(),
            analog_card: AnalogCard::Mce,
            sites,
        }
    }

    fn emit(stil: &str, net: &Netlist, sites: usize) -> EmittedConfig {
        let signals = SignalList::parse_str(stil).unwrap();
        let rec = Reconciliation::new(&signals, net);
        let effective = rec.effective_signals(&signals);
        emit_config(net, &effective, &rec, &options(sites))
    }

    #[test]
    fn test_record_display() {
        let pin = Record::Pin {
            channels: vec!["10101".into()],
            ball: "A1".into(),
            name: "TDI".into(),
        };
        assert_eq!(pin.to_string(), "DFPN 10101,\"A1\",(TDI)");

        let supply = Record::Supply {
            channels: vec!["31701".into(), "31702".into()],
            name: "VDD".into(),
        };
        assert_eq!(supply.to_string(), "DFPS (31701,31702),POS,(VDD)");

        let analog = Record::Analog {
            card: AnalogCard::Mcb,
            pad: AnalogPad {
                slot: "231".into(),
                mode: 17,
            },
            ball: "B2".into(),
            name: "VREF".into(),
        };
        assert_eq!(analog.to_string(), "DFAN \"MCB231,17,o\",\"B2\",(VREF)");

        let alias = Record::SiteAlias {
            site: 2,
            channels: vec!["20101".into()],
            name: "TDI".into(),
        };
        assert_eq!(alias.to_string(), "PALS 2,20101,,(TDI)");
    }

    #[test]
    fn test_analog_card_parsing() {
        assert_eq!("mcb".parse::<AnalogCard>().unwrap(), AnalogCard::Mcb);
        assert!(matches!(
            "XYZ".parse::<AnalogCard>(),
            Err(InputError::UnknownAnalogCard(_))
        ));
    }

    #[test]
    fn test_emit_two_sites() {
        let net = netlist(
            "Pin Name,Site 1,Site 2,Ball\n\
             TDI,10101,20101,A1\n\
             TDO,10102,20102,A2\n\
             VDD,31701,31702,C1\n\
             VDD,31701,31702,C2\n",
        );
        let emitted = emit("Signals { TDI In; TDO Out; }", &net, 2);
        insta::assert_snapshot!(emitted.config.render(), @r#"
        hp93000,config,0.1
        DFPN 10101,"A1",(TDI)
        DFPN 10102,"A2",(TDO)
        DFPS 31701,POS,(VDD)
        PALS 2,20101,,(TDI)
        PALS 2,20102,,(TDO)
        PALS 2,31702,,(VDD)
        PSTE 2
        CONF I,F160,(TDI)
        CONF O,F160,(TDO)
        CONF DC,POWER,(VDD)
        NOOP "7.4.2",,,
        "#);
        assert_eq!(emitted.pin_counts["TDI"], 2);
        assert_eq!(emitted.supplies, vec!["VDD"]);
    }

    #[test]
    fn test_unknown_digital_pin_is_not_defined() {
        let net = netlist("Name,Ball,Channel\nTCK,A1,10101\nMYSTERY,A2,10102\n");
        let emitted = emit("Signals { TCK In; }", &net, 1);
        let lines = emitted.config.render();
        assert!(lines.contains("(TCK)"));
        assert!(!lines.contains("MYSTERY"));
    }

    #[test]
    fn test_groups_and_triggers() {
        let net = netlist(
            "Name,Ball,Channel\n\
             DATA_0,A1,10101\n\
             DATA_1,A2,10102\n\
             DATA_2,A3,10103\n\
             TRIG_A,\"\"\"\"\"\",10150\n\
             TRIG_B,\"\"\"\"\"\",10151\n",
        );
        let emitted = emit(
            "Signals { DATA_0 InOut; DATA_1 InOut; DATA_2 InOut; }",
            &net,
            1,
        );
        let rendered = emitted.config.render();
        assert!(rendered.contains("DFPN 10150,\"\",(TRIG_A)"));
        assert!(rendered.contains("CONF I,F160,(TRIG_A,TRIG_B)"));
        assert!(rendered.contains("CONF IO,F160,(DATA_0,DATA_1,DATA_2)"));
        assert!(rendered.contains("DFGP I,(DATA_0,DATA_1,DATA_2),(data)"));
        assert!(rendered.contains("DFGP O,(DATA_0,DATA_1,DATA_2),(data)"));
        assert!(rendered.contains("DFGP I,(TRIG_A,TRIG_B),(triggers)"));
    }

    #[test]
    fn test_analog_and_invalid_channels() {
        let net = netlist(
            "Name,Ball,Channel\n\
             VREF,B2,231AA+\n\
             VSNS,B4,456C-\n\
             ODD,B3,12345-2\n",
        );
        let emitted = emit("Signals { VREF In; VSNS In; ODD In; }", &net, 1);
        let rendered = emitted.config.render();
        assert!(rendered.contains("DFAN \"MCE231,17,o\",\"B2\",(VREF)"));
        assert!(rendered.contains("DFAN \"MCE456,7,i\",\"B4\",(VSNS)"));
        assert!(!rendered.contains("(ODD)"));
        assert_eq!(
            emitted.invalid_channels,
            vec![("ODD".to_string(), "12345-2".to_string())]
        );
    }

    #[test]
    fn test_invalid_channel_keeps_site_numbers() {
        let net = netlist(
            "Pin Name,Site 1,Site 2,Ball\n\
             TDI,12345-2,20101,A1\n\
             TDO,10102,31745-2,A2\n\
             TMS,10103,20103,A3\n",
        );
        let emitted = emit("Signals { TDI In; TDO Out; TMS In; }", &net, 2);
        let rendered = emitted.config.render();
        assert!(!rendered.contains("(TDI)"));
        assert!(rendered.contains("DFPN 10102,\"A2\",(TDO)"));
        assert!(!rendered.contains("PALS 2,31745"));
        assert!(rendered.contains("DFPN 10103,\"A3\",(TMS)"));
        assert!(rendered.contains("PALS 2,20103,,(TMS)"));
        assert_eq!(
            emitted.invalid_channels,
            vec![
                ("TDI".to_string(), "12345-2".to_string()),
                ("TDO".to_string(), "31745-2".to_string()),
            ]
        );
    }

    #[test]
    fn test_supply_channel_range() {
        let net = netlist("Name,Ball,Channel\nVDD,C1,31745-7\n");
        let emitted = emit("Signals { TDI In; }", &net, 1);
        assert!(emitted
            .config
            .render()
            .contains("DFPS (31745,31746,31747),POS,(VDD)"));
        assert_eq!(emitted.supplies, vec!["VDD"]);
    }

    #[test]
    fn test_ball_from_second_sheet_stays_digital() {
        let sheets = [
            Sheet::from_reader("Channels", "Pin Name,Channel\nTDI,10101\n".as_bytes()).unwrap(),
            Sheet::from_reader(
                "Balls",
                "Pin Name,Ball,Channel\nTDI,A1,10101\n".as_bytes(),
            )
            .unwrap(),
        ];
        let net = Netlist::scan(&sheets, &[]);
        let emitted = emit("Signals { TDI In; }", &net, 1);
        let rendered = emitted.config.render();
        assert!(rendered.contains("DFPN 10101,\"A1\",(TDI)"));
        assert!(!rendered.contains("DFPS"));
        assert!(emitted.supplies.is_empty());
    }

    #[test]
    fn test_groups_need_defined_members() {
        let net = netlist(
            "Name,Ball,Channel\n\
             DATA_0,A1,10101\n\
             DATA_1,C1,10102\n\
             DATA_1,C2,10102\n\
             ABCD0,B1,10103\n\
             ABCD1,B2,10104\n\
             ABXD0,B3,10105\n\
             ABXD1,B4,10106\n",
        );
        let stil = "Signals { DATA_0 In; DATA_1 In; \
                    ABCD0 Out; ABCD1 Out; ABXD0 Out; ABXD1 Out; }";
        let emitted = emit(stil, &net, 1);
        let rendered = emitted.config.render();
        assert!(rendered.contains("DFPS 10102,POS,(DATA_1)"));
        assert!(rendered.contains("CONF I,F160,(DATA_0)"));
        assert!(rendered.contains("CONF O,F160,(ABCD0,ABCD1,ABXD0,ABXD1)"));
        assert!(!rendered.contains("DFGP"));
    }

    #[test]
    fn test_conflicting_entries_skipped() {
        let net = netlist("Name,Ball,Channel\nDQ0,A1,10101\nDQ0,A2,10102\n");
        let emitted = emit("Signals { DQ0 InOut; }", &net, 1);
        assert_eq!(emitted.conflicting, vec!["DQ0"]);
        assert!(!emitted.config.render().contains("DFPN"));
    }

    #[test]
    fn test_sort_key_uses_last_paren() {
        let mut config = ConfigFile {
            records: vec![
                Record::Sites(1),
                Record::Pin {
                    channels: vec!["10102".into()],
                    ball: "A2".into(),
                    name: "B".into(),
                },
                Record::Pin {
                    channels: vec!["10101".into()],
                    ball: "A1".into(),
                    name: "A".into(),
                },
            ],
        };
        config.sort();
        assert_eq!(config.records[0].pin_name(), Some("A"));
        assert_eq!(config.records[2], Record::Sites(1));
        assert_eq!(config.definitions().count(), 2);
    }
}
