pub use allocator::{first_fit, Allocation};
pub use client::{ApiClient, HttpApiClient, NewFixture, NewGroup, NewNode};
pub use config::{ConfigError, ConfigManager, ConfigOption, ConfigSchema};
pub use conflict::{find_conflicts, find_conflicts_in_set, AddressError, ChannelRange};
pub use console::{ActivationOutcome, AutoPatchOutcome, PairOutcome, PatchConsole, PatchOutcome};
pub use messages::{PatchCommand, PatchEvent, Settings};
pub use occupancy::{ChannelOwner, OccupancyIndex, OwnerId, OwnerKind};
pub use reconciler::{LiveStateReconciler, PollGate};
pub use selection::{ChannelSelection, DragMode, PointerEvent, PointerPhase};
pub use snapshot::{LevelMap, LevelSnapshot};

mod allocator;
mod client;
mod config;
mod conflict;
mod console;
pub mod messages;
mod occupancy;
mod reconciler;
mod selection;
mod snapshot;
