use std::collections::{BTreeMap, BTreeSet};

use patchbay_model::UNIVERSE_SIZE;

use crate::occupancy::{ChannelOwner, OccupancyIndex, OwnerId};

/// Hard validation failures for candidate address ranges. These block the
/// operation outright; overlaps with existing entities are soft outcomes
/// and reported as data instead (see [`find_conflicts`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    StartOutOfRange(u16),
    WidthTooSmall(u16),
    EndPastUniverse { start: u16, end: u16 },
}

impl std::fmt::Display for AddressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressError::StartOutOfRange(start) => {
                write!(f, "Start address {} is outside 1..={}", start, UNIVERSE_SIZE)
            }
            AddressError::WidthTooSmall(width) => {
                write!(f, "Channel width {} is invalid; must be at least 1", width)
            }
            AddressError::EndPastUniverse { start, end } => write!(
                f,
                "Range {}..={} extends past the {}-channel universe ceiling",
                start, end, UNIVERSE_SIZE
            ),
        }
    }
}

impl std::error::Error for AddressError {}

/// A validated, inclusive contiguous channel range within one universe.
/// Construction is the single validation point: an invalid candidate is
/// rejected here, never silently clipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelRange {
    start: u16,
    end: u16,
}

impl ChannelRange {
    pub fn new(start: u16, width: u16) -> Result<Self, AddressError> {
        if width < 1 {
            return Err(AddressError::WidthTooSmall(width));
        }
        if start < 1 || start > UNIVERSE_SIZE {
            return Err(AddressError::StartOutOfRange(start));
        }
        // Widened to avoid u16 overflow on absurd widths.
        let end = start as u32 + width as u32 - 1;
        if end > UNIVERSE_SIZE as u32 {
            return Err(AddressError::EndPastUniverse {
                start,
                end: end.min(u16::MAX as u32) as u16,
            });
        }
        Ok(Self {
            start,
            end: end as u16,
        })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn channels(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

/// Every distinct owner whose claim intersects the candidate range.
///
/// An empty result means no conflict. All intersecting owners are reported,
/// deduplicated and ordered by (kind, id) so the result is independent of
/// entity insertion order. `exclude` skips one owner, for editing an entity
/// against its own current claim.
pub fn find_conflicts(
    range: &ChannelRange,
    occupancy: &OccupancyIndex,
    exclude: Option<OwnerId>,
) -> Vec<ChannelOwner> {
    collect_owners(range.channels(), occupancy, exclude)
}

/// Set-shaped variant of [`find_conflicts`] for non-contiguous candidates
/// (group edits, activation targets). Channels are bounds-checked first.
pub fn find_conflicts_in_set(
    channels: &BTreeSet<u16>,
    occupancy: &OccupancyIndex,
    exclude: Option<OwnerId>,
) -> Result<Vec<ChannelOwner>, AddressError> {
    for &channel in channels {
        if channel < 1 || channel > UNIVERSE_SIZE {
            return Err(AddressError::StartOutOfRange(channel));
        }
    }
    Ok(collect_owners(channels.iter().copied(), occupancy, exclude))
}

fn collect_owners(
    channels: impl Iterator<Item = u16>,
    occupancy: &OccupancyIndex,
    exclude: Option<OwnerId>,
) -> Vec<ChannelOwner> {
    let mut distinct: BTreeMap<OwnerId, ChannelOwner> = BTreeMap::new();
    for channel in channels {
        for owner in occupancy.owners_at(channel) {
            if Some(owner.owner) == exclude {
                continue;
            }
            distinct.entry(owner.owner).or_insert_with(|| owner.clone());
        }
    }
    distinct.into_values().collect()
}
