use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Number of addressable channel slots in one DMX universe.
pub const UNIVERSE_SIZE: u16 = 512;

/// Universe identifier. Universes are pure namespaces; nothing owns one.
pub type UniverseId = u16;

/// A logical lighting device patched to a contiguous channel range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: u32,
    pub name: String,
    pub universe: UniverseId,
    pub start_address: u16,
    /// Channel footprint. Invariant: `start_address + width - 1 <= 512`.
    pub width: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<u32>,
}

impl Fixture {
    /// Inclusive channel range occupied by this fixture.
    pub fn range(&self) -> RangeInclusive<u16> {
        self.start_address..=self.start_address + self.width - 1
    }

    pub fn channels(&self) -> impl Iterator<Item = u16> {
        self.range()
    }
}

/// How a physical output node reaches the rig.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Wifi,
    Gateway,
    /// Built-in nodes ship with the controller and cannot be unpaired.
    Builtin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Offline,
}

/// A physical output device bound to a channel range in one universe.
/// Same overlap semantics as a fixture; different lifecycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: u32,
    pub name: String,
    pub universe: UniverseId,
    pub channel_start: u16,
    pub channel_end: u16,
    pub transport: Transport,
    pub status: NodeStatus,
}

impl Node {
    pub fn range(&self) -> RangeInclusive<u16> {
        self.channel_start..=self.channel_end
    }

    pub fn channels(&self) -> impl Iterator<Item = u16> {
        self.range()
    }

    /// Built-in nodes are exempt from delete/unpair.
    pub fn is_builtin(&self) -> bool {
        self.transport == Transport::Builtin
    }
}

/// A named, non-exclusive set of channels used for bulk targeting.
/// Groups are views, not claims: their channels may legitimately overlap
/// fixtures, nodes, and other groups, and are never conflict-checked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: u32,
    pub name: String,
    pub channels: BTreeSet<u16>,
    pub color: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_range_is_inclusive() {
        let fixture = Fixture {
            id: 1,
            name: "Left PAR".to_string(),
            universe: 1,
            start_address: 10,
            width: 3,
            node_id: None,
        };
        assert_eq!(fixture.range(), 10..=12);
        assert_eq!(fixture.channels().collect::<Vec<_>>(), vec![10, 11, 12]);
    }

    #[test]
    fn single_channel_fixture() {
        let fixture = Fixture {
            id: 2,
            name: "Pinspot".to_string(),
            universe: 1,
            start_address: 512,
            width: 1,
            node_id: None,
        };
        assert_eq!(fixture.channels().collect::<Vec<_>>(), vec![512]);
    }

    #[test]
    fn transport_wire_format() {
        let node = Node {
            id: 7,
            name: "Stage Left".to_string(),
            universe: 1,
            channel_start: 1,
            channel_end: 16,
            transport: Transport::Wifi,
            status: NodeStatus::Online,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["transport"], "wifi");
        assert_eq!(json["status"], "online");

        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
        assert!(!back.is_builtin());
    }

    #[test]
    fn fixture_node_id_omitted_when_absent() {
        let fixture = Fixture {
            id: 3,
            name: "Wash".to_string(),
            universe: 2,
            start_address: 1,
            width: 8,
            node_id: None,
        };
        let json = serde_json::to_string(&fixture).unwrap();
        assert!(!json.contains("node_id"));
    }
}
