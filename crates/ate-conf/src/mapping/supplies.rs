//! Power-supply channel ranges and pin role classification

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::channels::Channel;
use crate::error::InputError;

/// Inclusive range of tester channels driven by a supply card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct ChannelRange {
    pub low: u32,
    pub high: u32,
}

impl ChannelRange {
    pub fn contains(&self, channel: u32) -> bool {
        (self.low..=self.high).contains(&channel)
    }
}

impl FromStr for ChannelRange {
    type Err = String;

    /// Parse `low-high`, e.g. `31701-32416`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (low, high) = s
            .split_once('-')
            .ok_or_else(|| format!("expected `low-high` channel range, got `{s}`"))?;
        let low = low.trim().parse().map_err(|_| format!("bad range start in `{s}`"))?;
        let high = high.trim().parse().map_err(|_| format!("bad range end in `{s}`"))?;
        if high < low {
            return Err(format!("range `{s}` ends before it starts"));
        }
        Ok(ChannelRange { low, high })
    }
}

impl TryFrom<String> for ChannelRange {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ChannelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

/// A supply card and the channels it occupies
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SupplyCard {
    pub name: String,
    pub ranges: Vec<ChannelRange>,
    /// Always active, regardless of the selected pin scale cards
    #[serde(default)]
    pub always: bool,
}

impl SupplyCard {
    fn builtin(name: &str, ranges: &[(u32, u32)], always: bool) -> Self {
        SupplyCard {
            name: name.to_string(),
            ranges: ranges
                .iter()
                .map(|&(low, high)| ChannelRange { low, high })
                .collect(),
            always,
        }
    }
}

/// Supply cards known without any configuration
pub static BUILTIN_CARDS: LazyLock<Vec<SupplyCard>> = LazyLock::new(|| {
    vec![
        SupplyCard::builtin(
            "DCS_DPS128HC",
            &[(22501, 22516), (42501, 42516), (22901, 22916), (42901, 42916)],
            true,
        ),
        SupplyCard::builtin("DCS_UHC4T", &[(22701, 22704), (23001, 23004)], true),
        SupplyCard::builtin(
            "PS9G",
            &[(31701, 32416), (30101, 30216), (30501, 30616)],
            false,
        ),
        SupplyCard::builtin(
            "PS1600",
            &[
                (12501, 13216),
                (11701, 12416),
                (10101, 10816),
                (20101, 20816),
                (40101, 40816),
                (10901, 11616),
                (20901, 21616),
                (40901, 41616),
                (21701, 22416),
                (41701, 42416),
            ],
            false,
        ),
    ]
});

/// The set of supply cards in use for a conversion
#[derive(Debug, Clone, Default)]
pub struct SupplyRanges {
    pub cards: Vec<SupplyCard>,
}

impl SupplyRanges {
    /// Activate the always-on cards plus the named ones.
    ///
    /// `extra` cards (from a settings file) are searched before the builtin
    /// ones, so they can redefine a builtin card.
    pub fn select(names: &[String], extra: &[SupplyCard]) -> Result<Self, InputError> {
        let known: Vec<&SupplyCard> = extra.iter().chain(BUILTIN_CARDS.iter()).collect();

        let mut cards: Vec<SupplyCard> = Vec::new();
        for card in &known {
            if card.always && !cards.iter().any(|c| c.name == card.name) {
                cards.push((*card).clone());
            }
        }
        for name in names {
            let card = known
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| InputError::UnknownCard(name.clone()))?;
            if !cards.iter().any(|c| c.name == card.name) {
                cards.push((*card).clone());
            }
        }

        Ok(SupplyRanges { cards })
    }

    /// Name of the active card driving this channel, if any
    pub fn card_for(&self, channel: u32) -> Option<&str> {
        self.cards
            .iter()
            .find(|card| card.ranges.iter().any(|r| r.contains(channel)))
            .map(|card| card.name.as_str())
    }
}

/// Electrical role of a netlist pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRole {
    /// Digital pin, emitted as `DFPN`
    Digital,
    /// Power supply, emitted as `DFPS`
    Supply,
    /// Analog card pad, emitted as `DFAN`
    Analog,
}

/// Classify a pin from its normalized per-site channels and the number of
/// real package balls (trigger markers not counted)
///
/// - any analog pad → Analog
/// - several balls, several channels on site 1, or a site-1 channel inside
///   an active supply range → Supply
/// - anything else → Digital
pub fn classify(channels: &[Channel], ball_count: usize, supplies: &SupplyRanges) -> PinRole {
    if channels.iter().any(Channel::is_analog) {
        return PinRole::Analog;
    }

    if ball_count > 1 {
        return PinRole::Supply;
    }

    let first = channels.first().map(Channel::codes).unwrap_or(&[]);
    if first.len() > 1 {
        return PinRole::Supply;
    }

    let in_supply_range = first
        .first()
        .and_then(|code| code.parse::<u32>().ok())
        .is_some_and(|code| supplies.card_for(code).is_some());
    if in_supply_range {
        return PinRole::Supply;
    }

    PinRole::Digital
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::normalize_channel;

    fn ranges(names: &[&str]) -> SupplyRanges {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        SupplyRanges::select(&names, &[]).unwrap()
    }

    fn channels(raw: &[&str]) -> Vec<Channel> {
        raw.iter().map(|c| normalize_channel(c)).collect()
    }

    #[test]
    fn test_always_on_cards() {
        let supplies = ranges(&[]);
        assert_eq!(supplies.card_for(22501), Some("DCS_DPS128HC"));
        assert_eq!(supplies.card_for(22704), Some("DCS_UHC4T"));
        assert_eq!(supplies.card_for(31701), None);
    }

    #[test]
    fn test_selected_cards() {
        let supplies = ranges(&["PS9G"]);
        assert_eq!(supplies.card_for(31701), Some("PS9G"));
        assert_eq!(supplies.card_for(32416), Some("PS9G"));
        assert_eq!(supplies.card_for(10101), None);

        let supplies = ranges(&["ps1600"]);
        assert_eq!(supplies.card_for(10101), Some("PS1600"));
    }

    #[test]
    fn test_unknown_card() {
        let err = SupplyRanges::select(&["PS42".to_string()], &[]).unwrap_err();
        assert!(matches!(err, InputError::UnknownCard(name) if name == "PS42"));
    }

    #[test]
    fn test_extra_card_from_settings() {
        let extra = SupplyCard {
            name: "BENCH".to_string(),
            ranges: vec!["50101-50116".parse().unwrap()],
            always: false,
        };
        let supplies = SupplyRanges::select(&["BENCH".to_string()], &[extra]).unwrap();
        assert_eq!(supplies.card_for(50110), Some("BENCH"));
    }

    #[test]
    fn test_range_parsing() {
        let range: ChannelRange = "30101-30216".parse().unwrap();
        assert!(range.contains(30101));
        assert!(range.contains(30216));
        assert!(!range.contains(30217));
        assert!("30216-30101".parse::<ChannelRange>().is_err());
        assert!("30101".parse::<ChannelRange>().is_err());
    }

    #[test]
    fn test_classify() {
        let supplies = ranges(&["PS9G"]);
        assert_eq!(
            classify(&channels(&["10101"]), 1, &supplies),
            PinRole::Digital
        );
        assert_eq!(
            classify(&channels(&["10101", "10102"]), 1, &supplies),
            PinRole::Digital
        );
        assert_eq!(
            classify(&channels(&["31705"]), 1, &supplies),
            PinRole::Supply
        );
        assert_eq!(
            classify(&channels(&["10101-2"]), 1, &supplies),
            PinRole::Supply
        );
        assert_eq!(
            classify(&channels(&["10101"]), 3, &supplies),
            PinRole::Supply
        );
        assert_eq!(
            classify(&channels(&["231B-"]), 1, &supplies),
            PinRole::Analog
        );
        assert_eq!(
            classify(&channels(&["10101", "12345-2"]), 1, &supplies),
            PinRole::Digital
        );
    }
}
