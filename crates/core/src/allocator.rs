use patchbay_model::UNIVERSE_SIZE;

use crate::conflict::AddressError;
use crate::occupancy::OccupancyIndex;

/// Result of a first-fit allocation request. May be shorter than asked for;
/// the caller must treat a shortfall as "insufficient space", never pad the
/// list or place entities past channel 512.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    /// Start addresses found, strictly increasing, windows mutually disjoint.
    pub starts: Vec<u16>,
    pub requested: usize,
}

impl Allocation {
    pub fn is_complete(&self) -> bool {
        self.starts.len() == self.requested
    }

    pub fn placed(&self) -> usize {
        self.starts.len()
    }

    pub fn shortfall(&self) -> usize {
        self.requested - self.starts.len()
    }
}

/// Find up to `quantity` free windows of `width` consecutive channels,
/// lowest addresses first.
///
/// Scans candidate starts from 1 upward. A feasible window is recorded and
/// the cursor jumps past it, which doubles as the in-call reservation: a
/// later window can never reuse channels handed out earlier in the same
/// call. An infeasible window advances the cursor by one.
///
/// First-fit rather than best-fit on purpose: lower channels are patched
/// and wired first in typical rigs, so the lowest available address is what
/// operators expect to win.
///
/// The occupancy snapshot is not updated across calls; callers chaining
/// dependent allocations must refresh it (or commit results) in between.
pub fn first_fit(
    width: u16,
    quantity: usize,
    occupancy: &OccupancyIndex,
) -> Result<Allocation, AddressError> {
    if width < 1 {
        return Err(AddressError::WidthTooSmall(width));
    }
    if width > UNIVERSE_SIZE {
        return Err(AddressError::EndPastUniverse {
            start: 1,
            end: width,
        });
    }

    let mut starts = Vec::new();
    let mut cursor: u16 = 1;
    let last_start = UNIVERSE_SIZE - width + 1;

    while starts.len() < quantity && cursor <= last_start {
        let window_end = cursor + width - 1;
        if (cursor..=window_end).all(|ch| occupancy.is_free(ch)) {
            starts.push(cursor);
            cursor = window_end + 1;
        } else {
            cursor += 1;
        }
    }

    Ok(Allocation {
        starts,
        requested: quantity,
    })
}
