//! Mapping utilities for netlist/STIL → tester configuration translation

mod channels;
mod groups;
mod names;
mod supplies;

pub use channels::{
    extract_channel, normalize_channel, AnalogPad, Channel, ChannelList, ANALOG_PADS,
};
pub use groups::{build_groups, common_prefix, group_label, SignalGroup};
pub use names::{cross_match, is_variant};
pub use supplies::{classify, ChannelRange, PinRole, SupplyCard, SupplyRanges, BUILTIN_CARDS};
