//! Tester channel notation → canonical 5-digit channel codes

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Analog card pads; the mode value in a `DFAN` record is the index + 1
pub const ANALOG_PADS: [&str; 32] = [
    "A+", "B+", "C+", "D+", "A-", "B-", "C-", "D-", "E+", "F+", "G+", "H+", "E-", "F-", "G-",
    "H-", "AA+", "BB+", "CC+", "DD+", "AA-", "BB-", "CC-", "DD-", "EE+", "FF+", "GG+", "HH+",
    "EE-", "FF-", "GG-", "HH-",
];

/// `12345`
static CANONICAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{5}$").unwrap());

/// `12345-7` (sites 45 through 47 of slot 123)
static CHANNEL_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{3})([0-9]{2})-([0-9]{1,2})$").unwrap());

/// `123-P4`
static POGO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{3})-P([0-9]{1,2})$").unwrap());

/// `123-P4-P7`
static POGO_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{3})-P([0-9]{1,2})-P([0-9]{1,2})$").unwrap());

/// `231A+`, `231HH-`
static ANALOG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{3})([A-Z]{1,2}[+-])$").unwrap());

/// Channel notations accepted in netlist cells, tried in order
static CELL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^[0-9]{5}(?:-[0-9]{1,2})?\b").unwrap(), // 12345, 12345-6
        Regex::new(r"^[0-9]{3}-P[0-9]{1,2}(?:-P[0-9]{1,2})?\b").unwrap(), // 123-P4, 123-P4-P5
        Regex::new(r"^[0-9]{3}[A-Z]{1,2}[+-]").unwrap(),     // 123A+, 123HH-
    ]
});

static THREE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{3}").unwrap());

static DOTTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{3}\.[0-9]{2}").unwrap());

/// A pad on an analog card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalogPad {
    /// Three-digit card slot the pad belongs to
    pub slot: String,
    /// 1-based position in [`ANALOG_PADS`]
    pub mode: usize,
}

impl AnalogPad {
    /// Double-letter pads are outputs
    pub fn is_output(&self) -> bool {
        ANALOG_PADS[self.mode - 1].len() == 3
    }

    pub fn io_code(&self) -> char {
        if self.is_output() {
            'o'
        } else {
            'i'
        }
    }
}

/// A normalized channel assignment for one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// One or more canonical 5-digit channel codes
    Digital(Vec<String>),
    /// A pad on an analog card
    Analog(AnalogPad),
    /// Unrecognized notation, kept verbatim for reporting
    Invalid(String),
}

impl Channel {
    /// Canonical codes of a digital channel; empty otherwise
    pub fn codes(&self) -> &[String] {
        match self {
            Channel::Digital(codes) => codes,
            _ => &[],
        }
    }

    pub fn is_analog(&self) -> bool {
        matches!(self, Channel::Analog(_))
    }
}

/// Channel codes as written in a config record: `12345` or `(12345,12346)`
pub struct ChannelList<'a>(pub &'a [String]);

impl fmt::Display for ChannelList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            [single] => f.write_str(single),
            codes => write!(f, "({})", codes.join(",")),
        }
    }
}

/// Normalize a channel string from the netlist
///
/// Examples:
/// - `12345` → `[12345]`
/// - `123-P4` → `[12304]`
/// - `123-P4-P6` → `[12304, 12305, 12306]`
/// - `12345-7` → `[12345, 12346, 12347]`
/// - `231AA+` → analog pad 17 on slot 231
pub fn normalize_channel(raw: &str) -> Channel {
    let text = raw.trim();

    if CANONICAL.is_match(text) {
        return Channel::Digital(vec![text.to_string()]);
    }

    if let Some(caps) = POGO_RANGE.captures(text) {
        return expand(raw, &caps[1], &caps[2], &caps[3]);
    }

    if let Some(caps) = POGO.captures(text) {
        return expand(raw, &caps[1], &caps[2], &caps[2]);
    }

    if let Some(caps) = CHANNEL_RANGE.captures(text) {
        let (start, end) = (&caps[2], &caps[3]);
        let end = format!("{}{end}", &start[..start.len() - end.len()]);
        return expand(raw, &caps[1], start, &end);
    }

    if let Some(caps) = ANALOG.captures(text) {
        if let Some(idx) = ANALOG_PADS.iter().position(|pad| *pad == &caps[2]) {
            return Channel::Analog(AnalogPad {
                slot: caps[1].to_string(),
                mode: idx + 1,
            });
        }
    }

    Channel::Invalid(raw.to_string())
}

fn expand(raw: &str, slot: &str, start: &str, end: &str) -> Channel {
    let (Ok(start), Ok(end)) = (start.parse::<u32>(), end.parse::<u32>()) else {
        return Channel::Invalid(raw.to_string());
    };
    if end < start {
        return Channel::Invalid(raw.to_string());
    }
    Channel::Digital((start..=end).map(|n| format!("{slot}{n:02}")).collect())
}

/// Find a channel notation in a spreadsheet cell
///
/// Cells are cleaned up before matching: `TC`/`CH` markers are dropped,
/// `PF` becomes `P`, supply-card names between underscores are removed and
/// `P1-P4_425` style suffixes are rotated to `425-P1-P4`.
///
/// Examples:
/// - `CH12345` → `12345`
/// - `PF13-PF16_DPS32_425` → `425-P13-P16`
/// - `123.45` → `12345`
pub fn extract_channel(cell: &str) -> Option<String> {
    let mut text = cell.replace("TC", "").replace("CH", "").replace("PF", "P");

    if let (Some(first), Some(last)) = (text.find('_'), text.rfind('_')) {
        if first != last {
            text = format!("{}_{}", &text[..first], &text[last + 1..]);
        }
    }
    if let Some(idx) = text.find('_') {
        if THREE_DIGITS.is_match(&text) {
            text = format!("{}-{}", &text[idx + 1..], &text[..idx]);
        }
    }
    if DOTTED.is_match(&text) {
        text = text.replace('.', "");
    }

    let text = text.trim();
    CELL_PATTERNS
        .iter()
        .find_map(|pattern| pattern.find(text))
        .map(|m| m.as_str().to_string())
}
