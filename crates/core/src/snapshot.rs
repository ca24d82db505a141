use std::collections::BTreeMap;

use patchbay_model::UniverseId;
use serde::{Deserialize, Deserializer, Serialize};

/// Channel -> value map as it crosses the wire: a JSON object whose keys
/// are stringified channel numbers. Keys are normalized to `u16` here,
/// once, at deserialization; everything downstream works with integers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelMap(
    #[serde(deserialize_with = "deserialize_channel_keys")] pub BTreeMap<u16, u8>,
);

fn deserialize_channel_keys<'de, D>(deserializer: D) -> Result<BTreeMap<u16, u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, u8>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            key.parse::<u16>()
                .map(|channel| (channel, value))
                .map_err(|_| serde::de::Error::custom(format!("invalid channel key {:?}", key)))
        })
        .collect()
}

/// The periodically-polled live channel values for one universe.
///
/// Read-only to the core except during an active local edit: the poll loop
/// replaces it wholesale, and fader edits write single channels while the
/// poll is suspended (see `reconciler`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelSnapshot {
    universe: UniverseId,
    levels: BTreeMap<u16, u8>,
}

impl LevelSnapshot {
    pub fn new(universe: UniverseId) -> Self {
        Self {
            universe,
            levels: BTreeMap::new(),
        }
    }

    pub fn universe(&self) -> UniverseId {
        self.universe
    }

    /// Current value for a channel; unreported channels read as 0.
    pub fn level(&self, channel: u16) -> u8 {
        self.levels.get(&channel).copied().unwrap_or(0)
    }

    /// A channel is live when its value is non-zero.
    pub fn is_live(&self, channel: u16) -> bool {
        self.level(channel) > 0
    }

    pub fn live_channels(&self) -> impl Iterator<Item = (u16, u8)> + '_ {
        self.levels
            .iter()
            .filter(|(_, &v)| v > 0)
            .map(|(&ch, &v)| (ch, v))
    }

    /// Local-edit writer: called only while the poll gate is closed.
    pub fn set_level(&mut self, channel: u16, value: u8) {
        if value == 0 {
            self.levels.remove(&channel);
        } else {
            self.levels.insert(channel, value);
        }
    }

    /// Poll writer: replace the whole snapshot with the remote's view.
    pub fn replace(&mut self, levels: BTreeMap<u16, u8>) {
        self.levels = levels;
    }
}
