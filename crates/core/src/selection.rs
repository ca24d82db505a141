use std::collections::BTreeSet;

use patchbay_model::{Fixture, Group};

use crate::snapshot::LevelSnapshot;

/// Action applied to every cell visited during one drag. Fixed when the
/// drag begins so crossing already-visited cells never flip-flops them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragMode {
    Select,
    Unselect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
}

/// Device-neutral pointer input. Mouse and touch events are both translated
/// to this at the UI boundary (touch via point-to-cell lookup), so there is
/// exactly one drag state machine regardless of input device. `channel` is
/// `None` when the pointer is not over a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub channel: Option<u16>,
}

/// Interactive selection over raw channels, fixture references and group
/// references. Session-scoped: created when an activation dialog opens and
/// discarded on close or submit, never persisted.
///
/// References are expanded to channels only at [`ChannelSelection::resolve`]
/// time, against the entity lists passed in by the caller.
#[derive(Clone, Debug, Default)]
pub struct ChannelSelection {
    channels: BTreeSet<u16>,
    fixtures: BTreeSet<u32>,
    groups: BTreeSet<u32>,
    drag: Option<DragMode>,
}

impl ChannelSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_channel(&mut self, channel: u16) {
        if !self.channels.remove(&channel) {
            self.channels.insert(channel);
        }
    }

    pub fn toggle_fixture(&mut self, id: u32) {
        if !self.fixtures.remove(&id) {
            self.fixtures.insert(id);
        }
    }

    pub fn toggle_group(&mut self, id: u32) {
        if !self.groups.remove(&id) {
            self.groups.insert(id);
        }
    }

    pub fn is_selected(&self, channel: u16) -> bool {
        self.channels.contains(&channel)
    }

    pub fn selected_channels(&self) -> &BTreeSet<u16> {
        &self.channels
    }

    pub fn selected_fixtures(&self) -> &BTreeSet<u32> {
        &self.fixtures
    }

    pub fn selected_groups(&self) -> &BTreeSet<u32> {
        &self.groups
    }

    pub fn clear(&mut self) {
        self.channels.clear();
        self.fixtures.clear();
        self.groups.clear();
        self.drag = None;
    }

    /// Start a drag. The mode is decided once, from the initial cell's
    /// current state: dragging from a selected cell unselects, otherwise
    /// selects. The initial cell itself is changed by the first
    /// [`ChannelSelection::drag_over`], which the pointer router issues.
    pub fn begin_drag(&mut self, channel: u16) {
        self.drag = Some(if self.is_selected(channel) {
            DragMode::Unselect
        } else {
            DragMode::Select
        });
    }

    /// Apply the established drag mode to a visited cell. Idempotent, so
    /// re-entering a cell does not toggle it twice. No-op outside a drag.
    pub fn drag_over(&mut self, channel: u16) {
        match self.drag {
            Some(DragMode::Select) => {
                self.channels.insert(channel);
            }
            Some(DragMode::Unselect) => {
                self.channels.remove(&channel);
            }
            None => {}
        }
    }

    /// End the drag. Only clears the mode; every visited cell already
    /// committed, so there is no revert path. The pointer leaving the
    /// surface is routed here too.
    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn drag_mode(&self) -> Option<DragMode> {
        self.drag
    }

    /// Route a unified pointer event through the drag state machine.
    pub fn apply_pointer(&mut self, event: PointerEvent) {
        match (event.phase, event.channel) {
            (PointerPhase::Down, Some(channel)) => {
                self.begin_drag(channel);
                self.drag_over(channel);
            }
            (PointerPhase::Move, Some(channel)) => self.drag_over(channel),
            (PointerPhase::Up, _) => self.end_drag(),
            // Down/Move off-grid: nothing to do.
            _ => {}
        }
    }

    /// Flatten the selection to a sorted, deduplicated channel list: raw
    /// channels, plus the span of every selected fixture, plus the channel
    /// set of every selected group. Unknown references are skipped.
    pub fn resolve(&self, fixtures: &[Fixture], groups: &[Group]) -> Vec<u16> {
        let mut resolved = self.channels.clone();

        for fixture in fixtures.iter().filter(|f| self.fixtures.contains(&f.id)) {
            resolved.extend(fixture.channels());
        }
        for group in groups.iter().filter(|g| self.groups.contains(&g.id)) {
            resolved.extend(group.channels.iter().copied());
        }

        resolved.into_iter().collect()
    }

    /// Channels of the resolved selection that are already live (non-zero
    /// in the active snapshot). A non-empty result requires explicit user
    /// confirmation before an activation proceeds.
    pub fn conflicts_against(
        &self,
        snapshot: &LevelSnapshot,
        fixtures: &[Fixture],
        groups: &[Group],
    ) -> Vec<u16> {
        self.resolve(fixtures, groups)
            .into_iter()
            .filter(|&ch| snapshot.is_live(ch))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn fixture(id: u32, start: u16, width: u16) -> Fixture {
        Fixture {
            id,
            name: format!("Fixture {}", id),
            universe: 1,
            start_address: start,
            width,
            node_id: None,
        }
    }

    fn group(id: u32, channels: &[u16]) -> Group {
        Group {
            id,
            name: format!("Group {}", id),
            channels: channels.iter().copied().collect(),
            color: "#00ff88".to_string(),
        }
    }

    #[test]
    fn toggle_flips_membership() {
        let mut selection = ChannelSelection::new();
        selection.toggle_channel(5);
        assert!(selection.is_selected(5));
        selection.toggle_channel(5);
        assert!(!selection.is_selected(5));
    }

    #[test]
    fn drag_mode_is_fixed_for_the_whole_drag() {
        let mut selection = ChannelSelection::new();
        selection.begin_drag(7);
        assert_eq!(selection.drag_mode(), Some(DragMode::Select));
        selection.drag_over(7);
        selection.drag_over(8);
        // Crossing back over 7 must not unselect it.
        selection.drag_over(7);
        selection.end_drag();

        let selected: Vec<u16> = selection.selected_channels().iter().copied().collect();
        assert_eq!(selected, vec![7, 8]);
        assert_eq!(selection.drag_mode(), None);
    }

    #[test]
    fn drag_from_selected_cell_unselects() {
        let mut selection = ChannelSelection::new();
        for ch in [3, 4, 5] {
            selection.toggle_channel(ch);
        }

        selection.begin_drag(4);
        assert_eq!(selection.drag_mode(), Some(DragMode::Unselect));
        selection.drag_over(4);
        selection.drag_over(5);
        selection.drag_over(4);
        selection.end_drag();

        let selected: Vec<u16> = selection.selected_channels().iter().copied().collect();
        assert_eq!(selected, vec![3]);
    }

    #[test]
    fn drag_over_without_drag_is_a_no_op() {
        let mut selection = ChannelSelection::new();
        selection.drag_over(9);
        assert!(selection.selected_channels().is_empty());
    }

    #[test]
    fn pointer_events_drive_the_same_machine() {
        let mut selection = ChannelSelection::new();
        selection.apply_pointer(PointerEvent {
            phase: PointerPhase::Down,
            channel: Some(7),
        });
        selection.apply_pointer(PointerEvent {
            phase: PointerPhase::Move,
            channel: Some(8),
        });
        // Finger slides off the grid mid-drag.
        selection.apply_pointer(PointerEvent {
            phase: PointerPhase::Move,
            channel: None,
        });
        selection.apply_pointer(PointerEvent {
            phase: PointerPhase::Up,
            channel: None,
        });

        let selected: Vec<u16> = selection.selected_channels().iter().copied().collect();
        assert_eq!(selected, vec![7, 8]);
        assert_eq!(selection.drag_mode(), None);
    }

    #[test]
    fn resolve_unions_channels_fixtures_and_groups() {
        let mut selection = ChannelSelection::new();
        selection.toggle_channel(5);
        selection.toggle_fixture(1);

        let fixtures = vec![fixture(1, 10, 3)];
        assert_eq!(selection.resolve(&fixtures, &[]), vec![5, 10, 11, 12]);

        // Overlapping group channels deduplicate.
        selection.toggle_group(2);
        let groups = vec![group(2, &[11, 40])];
        assert_eq!(
            selection.resolve(&fixtures, &groups),
            vec![5, 10, 11, 12, 40]
        );
    }

    #[test]
    fn resolve_skips_unknown_references() {
        let mut selection = ChannelSelection::new();
        selection.toggle_fixture(99);
        selection.toggle_group(98);
        assert!(selection.resolve(&[], &[]).is_empty());
    }

    #[test]
    fn conflicts_against_reports_live_channels_only() {
        let mut selection = ChannelSelection::new();
        selection.toggle_channel(5);
        selection.toggle_fixture(1);
        let fixtures = vec![fixture(1, 10, 3)];

        let mut levels = BTreeMap::new();
        levels.insert(11u16, 200u8);
        levels.insert(5u16, 0u8); // present but zero: not live
        let mut snapshot = LevelSnapshot::new(1);
        snapshot.replace(levels);

        assert_eq!(
            selection.conflicts_against(&snapshot, &fixtures, &[]),
            vec![11]
        );
    }
}
