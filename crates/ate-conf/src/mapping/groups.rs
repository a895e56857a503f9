//! Grouping of signals that share a name prefix

use itertools::Itertools;

use crate::parser::{Direction, SignalList};

/// Number of leading characters two names must share to start a group
const PREFIX_LEN: usize = 4;

/// A named set of same-direction pins, emitted as a `DFGP` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalGroup {
    /// `In` or `Out`; bidirectional pins are added to both
    pub direction: Direction,
    pub label: String,
    pub members: Vec<String>,
}

/// Group the signals of a list by common prefix
///
/// Names of one direction are walked in sorted order and split into runs
/// sharing their first four characters. Each run is labelled with its
/// common prefix (see [`group_label`]). Groups of the same direction whose
/// labels contain one another, or differ in a single position, are merged.
/// Single-member groups are dropped.
pub fn build_groups(signals: &SignalList) -> Vec<SignalGroup> {
    let mut groups: Vec<SignalGroup> = Vec::new();

    for direction in [Direction::In, Direction::Out, Direction::InOut] {
        let names = signals.names_with(direction);
        let runs = names.into_iter().chunk_by(|name| prefix_key(name));
        for (_, run) in &runs {
            let members: Vec<String> = run.map(str::to_string).collect();
            let label = group_label(&members);
            let targets: &[Direction] = match direction {
                Direction::InOut => &[Direction::In, Direction::Out],
                Direction::In => &[Direction::In],
                Direction::Out => &[Direction::Out],
            };
            for &target in targets {
                add_to_group(&mut groups, target, &label, &members);
            }
        }
    }

    merge_related(&mut groups);
    groups.retain(|g| g.members.len() > 1);
    groups
}

/// Lower-cased common prefix of the names, without a trailing `_` or `[`
pub fn group_label<S: AsRef<str>>(names: &[S]) -> String {
    let mut label = common_prefix(names).to_lowercase();
    if label.ends_with('_') || label.ends_with('[') {
        label.pop();
    }
    label
}

/// Longest common character prefix
pub fn common_prefix<S: AsRef<str>>(names: &[S]) -> String {
    let Some((first, rest)) = names.split_first() else {
        return String::new();
    };
    let mut prefix: Vec<char> = first.as_ref().chars().collect();
    for name in rest {
        let shared = prefix
            .iter()
            .zip(name.as_ref().chars())
            .take_while(|(a, b)| **a == *b)
            .count();
        prefix.truncate(shared);
    }
    prefix.into_iter().collect()
}

fn prefix_key(name: &str) -> String {
    name.chars().take(PREFIX_LEN).collect()
}

fn add_to_group(
    groups: &mut Vec<SignalGroup>,
    direction: Direction,
    label: &str,
    members: &[String],
) {
    match groups
        .iter_mut()
        .find(|g| g.direction == direction && g.label == label)
    {
        Some(group) => extend_unique(&mut group.members, members.iter().cloned()),
        None => groups.push(SignalGroup {
            direction,
            label: label.to_string(),
            members: members.to_vec(),
        }),
    }
}

fn extend_unique<I: IntoIterator<Item = String>>(members: &mut Vec<String>, extra: I) {
    for name in extra {
        if !members.contains(&name) {
            members.push(name);
        }
    }
}

/// `a` absorbs `b` when `a` is a substring of `b`, or when the labels
/// (each closed with `)`) differ at exactly one shared position.
fn labels_related(a: &str, b: &str) -> bool {
    if b.contains(a) {
        return true;
    }
    let closed_a = format!("{a})");
    let closed_b = format!("{b})");
    closed_a
        .chars()
        .zip(closed_b.chars())
        .filter(|(x, y)| x != y)
        .count()
        == 1
}

fn merge_related(groups: &mut Vec<SignalGroup>) {
    let mut i = 0;
    while i < groups.len() {
        let mut j = 0;
        while j < groups.len() {
            let related = i != j
                && groups[i].direction == groups[j].direction
                && groups[i].label != groups[j].label
                && labels_related(&groups[i].label, &groups[j].label);
            if !related {
                j += 1;
                continue;
            }
            let absorbed = groups.remove(j);
            if j < i {
                i -= 1;
            }
            extend_unique(&mut groups[i].members, absorbed.members);
        }
        i += 1;
    }
}
