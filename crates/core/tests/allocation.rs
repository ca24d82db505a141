//! End-to-end allocation behavior over a realistically patched universe.

use patchbay_core::{
    find_conflicts, first_fit, ChannelRange, ChannelSelection, OccupancyIndex, OwnerId,
};
use patchbay_model::{Fixture, Group, Node, NodeStatus, Transport};

fn fixture(id: u32, name: &str, start: u16, width: u16) -> Fixture {
    Fixture {
        id,
        name: name.to_string(),
        universe: 1,
        start_address: start,
        width,
        node_id: None,
    }
}

#[test]
fn allocation_fills_the_first_gap_after_an_existing_fixture() {
    let fixtures = vec![fixture(1, "House Left", 1, 4)];
    let occupancy = OccupancyIndex::build(1, &fixtures, &[]);

    let allocation = first_fit(4, 2, &occupancy).unwrap();
    assert_eq!(allocation.starts, vec![5, 9]);
    assert!(allocation.is_complete());
}

#[test]
fn allocated_windows_are_conflict_free_against_the_same_snapshot() {
    let fixtures = vec![
        fixture(1, "Left Wash", 3, 10),
        fixture(2, "Right Wash", 40, 10),
    ];
    let nodes = vec![Node {
        id: 7,
        name: "Gateway".to_string(),
        universe: 1,
        channel_start: 80,
        channel_end: 96,
        transport: Transport::Gateway,
        status: NodeStatus::Online,
    }];
    let occupancy = OccupancyIndex::build(1, &fixtures, &nodes);

    let allocation = first_fit(12, 5, &occupancy).unwrap();
    assert!(allocation.is_complete());

    for &start in &allocation.starts {
        let range = ChannelRange::new(start, 12).unwrap();
        assert!(
            find_conflicts(&range, &occupancy, None).is_empty(),
            "allocated window at {} collides",
            start
        );
    }
}

#[test]
fn editing_an_entity_against_itself_is_clean_but_neighbors_still_report() {
    let fixtures = vec![
        fixture(1, "Spot A", 100, 16),
        fixture(2, "Spot B", 116, 16),
    ];
    let occupancy = OccupancyIndex::build(1, &fixtures, &[]);

    // Re-saving Spot A in place: no conflict.
    let own = ChannelRange::new(100, 16).unwrap();
    assert!(find_conflicts(&own, &occupancy, Some(OwnerId::fixture(1))).is_empty());

    // Shifting Spot A one channel up collides with Spot B only.
    let shifted = ChannelRange::new(101, 16).unwrap();
    let conflicts = find_conflicts(&shifted, &occupancy, Some(OwnerId::fixture(1)));
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].name, "Spot B");
}

#[test]
fn selection_expansion_feeds_activation_targets() {
    let fixtures = vec![fixture(3, "Blinder", 10, 3)];
    let groups = vec![Group {
        id: 9,
        name: "FOH".to_string(),
        channels: [12, 200].into_iter().collect(),
        color: "#3366ff".to_string(),
    }];

    let mut selection = ChannelSelection::new();
    selection.toggle_channel(5);
    selection.toggle_fixture(3);
    selection.toggle_group(9);

    assert_eq!(selection.resolve(&fixtures, &groups), vec![5, 10, 11, 12, 200]);
}
