use std::collections::BTreeSet;

use patchbay_model::{Transport, UniverseId};
use serde::{Deserialize, Serialize};

use crate::occupancy::ChannelOwner;

/// Commands sent from the UI to the patch console.
#[derive(Debug, Clone)]
pub enum PatchCommand {
    /// Re-pull fixtures, nodes and groups from the remote.
    Refresh,

    // Fixture patching
    PatchFixture {
        name: String,
        universe: UniverseId,
        address: u16,
        width: u16,
        node_id: Option<u32>,
        /// Set after the user explicitly confirms a reported conflict.
        allow_overlap: bool,
    },
    UpdateFixture {
        fixture_id: u32,
        name: String,
        universe: UniverseId,
        address: u16,
        allow_overlap: bool,
    },
    UnpatchFixture {
        fixture_id: u32,
    },
    /// Place `quantity` fixtures of `width` channels into free space,
    /// lowest addresses first.
    AutoPatchFixtures {
        name_prefix: String,
        universe: UniverseId,
        width: u16,
        quantity: usize,
    },

    // Node pairing
    PairNode {
        name: String,
        universe: UniverseId,
        channel_start: u16,
        channel_end: u16,
        transport: Transport,
        allow_overlap: bool,
    },
    UnpairNode {
        node_id: u32,
    },

    // Groups
    CreateGroup {
        name: String,
        channels: BTreeSet<u16>,
        color: String,
    },
    DeleteGroup {
        group_id: u32,
    },

    // Live edits (fader drags)
    BeginFaderEdit,
    FaderStep {
        channel: u16,
        value: u8,
    },
    EndFaderEdit,

    /// Activate a resolved channel selection. `confirmed` is set after the
    /// user acknowledges already-live channels.
    ActivateChannels {
        channels: Vec<u16>,
        confirmed: bool,
    },

    Shutdown,
}

/// Events emitted by the patch console for the UI to render.
#[derive(Debug, Clone)]
pub enum PatchEvent {
    FixturesRefreshed,
    NodesRefreshed,
    GroupsRefreshed,
    /// A patch or pair attempt overlaps existing claims; lists every
    /// conflicting owner. Re-send the command with `allow_overlap` to
    /// override.
    ConflictDetected {
        owners: Vec<ChannelOwner>,
    },
    /// An auto-patch could not place the full request.
    InsufficientSpace {
        requested: usize,
        placed: usize,
    },
    /// The activation targets channels that are already live; re-send with
    /// `confirmed` to proceed.
    ActivationNeedsConfirm {
        live_channels: Vec<u16>,
    },
    ActivationCommitted {
        channel_count: usize,
    },
    /// A fire-and-forget remote write failed. Nothing is rolled back; the
    /// next poll re-establishes the remote's view.
    CommitFailed {
        context: String,
    },
    Error(String),
}

/// Runtime settings, persisted by the config manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // Remote API
    pub api_base_url: String,
    pub request_timeout_secs: u32,

    // Polling
    pub universe: UniverseId,
    pub poll_interval_secs: u32,
    pub resume_grace_ms: u32,

    // Live edits
    pub default_fade_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8089".to_string(),
            request_timeout_secs: 10,
            universe: 1,
            poll_interval_secs: 5,
            resume_grace_ms: 750,
            default_fade_ms: 200,
        }
    }
}
