use std::collections::BTreeMap;

use patchbay_model::{Fixture, Node, UniverseId};

/// Which kind of exclusive-claim entity owns a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OwnerKind {
    Fixture,
    Node,
}

/// Identity of a claiming entity, unique across kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId {
    pub kind: OwnerKind,
    pub id: u32,
}

impl OwnerId {
    pub fn fixture(id: u32) -> Self {
        Self {
            kind: OwnerKind::Fixture,
            id,
        }
    }

    pub fn node(id: u32) -> Self {
        Self {
            kind: OwnerKind::Node,
            id,
        }
    }
}

/// One entity's claim over a contiguous channel range, as recorded in the
/// occupancy index. Carries the name so conflict reports can show it.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelOwner {
    pub owner: OwnerId,
    pub name: String,
    pub start: u16,
    pub end: u16,
}

/// Derived channel -> owners map for a single universe.
///
/// Built from a snapshot of the fixture and node lists; pure, no I/O.
/// A channel claimed by more than one entity keeps every owner — a
/// multi-owner slot is the conflict marker.
#[derive(Clone, Debug, Default)]
pub struct OccupancyIndex {
    universe: UniverseId,
    claims: BTreeMap<u16, Vec<ChannelOwner>>,
}

impl OccupancyIndex {
    pub fn build(universe: UniverseId, fixtures: &[Fixture], nodes: &[Node]) -> Self {
        let mut claims: BTreeMap<u16, Vec<ChannelOwner>> = BTreeMap::new();

        for fixture in fixtures.iter().filter(|f| f.universe == universe) {
            let owner = ChannelOwner {
                owner: OwnerId::fixture(fixture.id),
                name: fixture.name.clone(),
                start: fixture.start_address,
                end: fixture.start_address + fixture.width - 1,
            };
            for channel in fixture.channels() {
                claims.entry(channel).or_default().push(owner.clone());
            }
        }

        for node in nodes.iter().filter(|n| n.universe == universe) {
            let owner = ChannelOwner {
                owner: OwnerId::node(node.id),
                name: node.name.clone(),
                start: node.channel_start,
                end: node.channel_end,
            };
            for channel in node.channels() {
                claims.entry(channel).or_default().push(owner.clone());
            }
        }

        Self { universe, claims }
    }

    pub fn universe(&self) -> UniverseId {
        self.universe
    }

    pub fn owners_at(&self, channel: u16) -> &[ChannelOwner] {
        self.claims.get(&channel).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_free(&self, channel: u16) -> bool {
        !self.claims.contains_key(&channel)
    }

    /// Highest claimed channel, if any entity is patched at all.
    pub fn highest_claimed(&self) -> Option<u16> {
        self.claims.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &[ChannelOwner])> {
        self.claims.iter().map(|(ch, owners)| (*ch, owners.as_slice()))
    }
}
