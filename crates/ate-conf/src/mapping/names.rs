//! Cross-matching of near-identical pin names between STIL and netlist

use indexmap::IndexMap;

/// Digits of the last number in a name, without leading zeros
///
/// `Some("")` means the number was all zeros.
fn trailing_number(name: &str) -> Option<&str> {
    let end = name.rfind(|c: char| c.is_ascii_digit())? + 1;
    let start = name[..end]
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + 1);
    Some(name[start..end].trim_start_matches('0'))
}

fn chunks(name: &str) -> Vec<&str> {
    name.split('_').collect()
}

/// Check whether a STIL name is an abbreviation-tolerant variant of a
/// netlist name.
///
/// Both names must end in the same number (or neither has one). After
/// removing `[`/`]`, the names are split on `_`; every netlist chunk must be
/// covered, in order, by a STIL chunk that equals it or contains it.
///
/// Examples:
/// - `DDR_DQ[3]` vs `DDR_DQ3` → true
/// - `SPI0_CLK_OUT` vs `SPI0_CLK` → true
/// - `GPIO_12` vs `GPIO_13` → false
pub fn is_variant(stil_name: &str, net_name: &str) -> bool {
    if trailing_number(stil_name) != trailing_number(net_name) {
        return false;
    }

    let stil_clean = stil_name.replace(['[', ']'], "");
    let net_clean = net_name.replace(['[', ']'], "");
    let stil_chunks = chunks(&stil_clean);
    let net_chunks = chunks(&net_clean);

    let mut matched: Vec<&str> = Vec::new();
    for stil_chunk in &stil_chunks {
        for net_chunk in &net_chunks {
            if matched.contains(net_chunk) {
                continue;
            }
            if stil_chunk == net_chunk || (net_chunk.len() > 1 && stil_chunk.contains(net_chunk)) {
                matched.push(*net_chunk);
                break;
            }
        }
    }

    !matched.is_empty() && matched == net_chunks
}

/// Pair unmatched netlist names with unmatched STIL names
///
/// Returns netlist name → STIL name. When several STIL names qualify, the
/// last one wins.
pub fn cross_match<S: AsRef<str>, N: AsRef<str>>(
    stil_only: &[S],
    net_only: &[N],
) -> IndexMap<String, String> {
    let mut transfers = IndexMap::new();
    for stil_name in stil_only {
        for net_name in net_only {
            if is_variant(stil_name.as_ref(), net_name.as_ref()) {
                log::debug!(
                    "{} looks like netlist name {}",
                    stil_name.as_ref(),
                    net_name.as_ref()
                );
                transfers.insert(net_name.as_ref().to_string(), stil_name.as_ref().to_string());
            }
        }
    }
    transfers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_number() {
        assert_eq!(trailing_number("GPIO_12"), Some("12"));
        assert_eq!(trailing_number("DQ[07]"), Some("7"));
        assert_eq!(trailing_number("A1B"), Some("1"));
        assert_eq!(trailing_number("TCK"), None);
        assert_eq!(trailing_number("PIN_0"), Some(""));
    }

    #[test]
    fn test_bracketed_index() {
        assert!(is_variant("DDR_DQ[3]", "DDR_DQ3"));
    }

    #[test]
    fn test_abbreviated_netlist_name() {
        assert!(is_variant("SPI0_CLK_OUT", "SPI0_CLK"));
        assert!(is_variant("JTAG_TDO_PAD", "TDO"));
    }

    #[test]
    fn test_numbers_must_agree() {
        assert!(!is_variant("GPIO_12", "GPIO_13"));
        assert!(!is_variant("GPIO_12", "GPIO"));
    }

    #[test]
    fn test_every_netlist_chunk_needed() {
        assert!(!is_variant("SPI_CLK", "SPI_CLK_EN"));
        assert!(!is_variant("RESET", "RST"));
    }

    #[test]
    fn test_cross_match_last_wins() {
        let transfers = cross_match(&["TDO_PAD", "JTAG_TDO"], &["TDO", "TMS"]);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers["TDO"], "JTAG_TDO");
    }
}
