//! Intermediate assignment CSVs for signals and netlist entries

use std::fmt::Write;

use crate::mapping::build_groups;
use crate::parser::{
    Direction, NetEntry, Netlist, SignalList, EMPTY_BALL, STIL_ASSIGNMENTS_HEADER,
};

/// Signal directions followed by `CONF` and `DFGP` sections
pub fn render_stil_assignments(signals: &SignalList) -> String {
    let mut out = String::new();
    writeln!(out, "{STIL_ASSIGNMENTS_HEADER}").unwrap();
    for signal in &signals.signals {
        writeln!(out, "{},{}", signal.name, signal.direction).unwrap();
    }

    writeln!(out).unwrap();
    writeln!(out, "#IN/OUTS#").unwrap();
    for direction in [Direction::In, Direction::Out, Direction::InOut] {
        let names = signals.names_with(direction);
        if !names.is_empty() {
            writeln!(
                out,
                "CONF {},F160,({})",
                direction.conf_code(),
                names.join(",")
            )
            .unwrap();
        }
    }

    writeln!(out).unwrap();
    writeln!(out, "#Groups#").unwrap();
    for group in build_groups(signals) {
        writeln!(
            out,
            "DFGP {},({}),({})",
            group.direction.conf_code(),
            group.members.join(","),
            group.label
        )
        .unwrap();
    }

    out
}

/// One row per net: channels per site, balls, then `;`-joined locations
pub fn render_netlist_assignments(netlist: &Netlist) -> String {
    let mut out = String::new();
    let sites = netlist.sites();
    let channel_header = if sites == 1 {
        "Channel Number".to_string()
    } else {
        (1..=sites)
            .map(|site| format!("Channel Site-{site}"))
            .collect::<Vec<_>>()
            .join(",")
    };
    writeln!(out, "Pin Name,{channel_header},Ball Number(s),Location").unwrap();

    for (name, entry) in &netlist.entries {
        let mut fields = vec![name.clone()];
        fields.extend(assignment_fields(entry));
        let locations: Vec<String> = entry.locations.iter().map(ToString::to_string).collect();
        if !locations.is_empty() {
            fields.push(locations.join(";"));
        }
        writeln!(out, "{}", fields.join(",")).unwrap();
    }

    out
}

/// Channels then balls; conflicting entries keep their channel/ball pairs
/// interleaved so they read back as conflicting.
fn assignment_fields(entry: &NetEntry) -> Vec<String> {
    let ball_field = |ball: &String| {
        if ball.is_empty() {
            EMPTY_BALL.to_string()
        } else {
            ball.clone()
        }
    };

    if !entry.conflicting {
        return entry
            .channels
            .iter()
            .cloned()
            .chain(entry.balls.iter().map(ball_field))
            .collect();
    }

    let pairs = entry.channels.len().max(entry.balls.len());
    let mut fields = Vec::new();
    for idx in 0..pairs {
        fields.extend(entry.channels.get(idx).cloned());
        fields.extend(entry.balls.get(idx).map(ball_field));
    }
    fields
}
