use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use patchbay_model::{Fixture, Group, Node, Transport, UniverseId};
use tokio::sync::{mpsc, RwLock};

use crate::allocator::first_fit;
use crate::client::{ApiClient, NewFixture, NewGroup, NewNode};
use crate::conflict::{find_conflicts, ChannelRange};
use crate::messages::{PatchCommand, PatchEvent, Settings};
use crate::occupancy::{ChannelOwner, OccupancyIndex, OwnerId};
use crate::reconciler::LiveStateReconciler;

/// Outcome of a fixture patch or edit attempt.
#[derive(Debug, Clone)]
pub enum PatchOutcome {
    Applied(Fixture),
    /// Warn-then-allow: the caller re-sends with `allow_overlap` after the
    /// user confirms.
    Conflicts(Vec<ChannelOwner>),
}

/// Outcome of a node pairing attempt.
#[derive(Debug, Clone)]
pub enum PairOutcome {
    Paired(Node),
    Conflicts(Vec<ChannelOwner>),
}

/// Outcome of a bulk auto-patch request.
#[derive(Debug, Clone)]
pub enum AutoPatchOutcome {
    Patched(Vec<Fixture>),
    /// Nothing was created; the user decides whether a smaller batch is
    /// acceptable.
    Insufficient { requested: usize, placed: usize },
}

/// Outcome of an activation request over resolved channels.
#[derive(Debug, Clone)]
pub enum ActivationOutcome {
    /// Some targets are already live; re-send with `confirmed`.
    NeedsConfirm(Vec<u16>),
    Committed(usize),
}

/// Coordinates the patch state: entity lists pulled from the remote, the
/// occupancy/conflict/allocation logic over them, and the live-level
/// reconciler. Drives everything from a [`PatchCommand`] channel and
/// reports through [`PatchEvent`]s.
pub struct PatchConsole {
    client: Arc<dyn ApiClient>,
    fixtures: Arc<RwLock<Vec<Fixture>>>,
    nodes: Arc<RwLock<Vec<Node>>>,
    groups: Arc<RwLock<Vec<Group>>>,
    reconciler: Arc<LiveStateReconciler>,
    settings: Settings,
    event_tx: mpsc::UnboundedSender<PatchEvent>,
}

impl PatchConsole {
    pub fn new(
        client: Arc<dyn ApiClient>,
        settings: Settings,
        event_tx: mpsc::UnboundedSender<PatchEvent>,
    ) -> Self {
        let reconciler = Arc::new(LiveStateReconciler::new(
            Arc::clone(&client),
            settings.universe,
            Duration::from_secs(settings.poll_interval_secs as u64),
            Duration::from_millis(settings.resume_grace_ms as u64),
        ));

        Self {
            client,
            fixtures: Arc::new(RwLock::new(Vec::new())),
            nodes: Arc::new(RwLock::new(Vec::new())),
            groups: Arc::new(RwLock::new(Vec::new())),
            reconciler,
            settings,
            event_tx,
        }
    }

    pub fn fixtures(&self) -> Arc<RwLock<Vec<Fixture>>> {
        Arc::clone(&self.fixtures)
    }

    pub fn nodes(&self) -> Arc<RwLock<Vec<Node>>> {
        Arc::clone(&self.nodes)
    }

    pub fn groups(&self) -> Arc<RwLock<Vec<Group>>> {
        Arc::clone(&self.groups)
    }

    pub fn reconciler(&self) -> Arc<LiveStateReconciler> {
        Arc::clone(&self.reconciler)
    }

    /// Re-pull fixtures, nodes and groups from the remote.
    pub async fn refresh(&self) -> Result<()> {
        let fixtures = self.client.list_fixtures().await?;
        let nodes = self.client.list_nodes().await?;
        let groups = self.client.list_groups().await?;

        *self.fixtures.write().await = fixtures;
        *self.nodes.write().await = nodes;
        *self.groups.write().await = groups;

        self.emit(PatchEvent::FixturesRefreshed);
        self.emit(PatchEvent::NodesRefreshed);
        self.emit(PatchEvent::GroupsRefreshed);
        Ok(())
    }

    /// Build the occupancy index for one universe from the current entity
    /// snapshot. Callers chaining dependent allocations must rebuild it
    /// after committing.
    pub async fn occupancy(&self, universe: UniverseId) -> OccupancyIndex {
        let fixtures = self.fixtures.read().await;
        let nodes = self.nodes.read().await;
        OccupancyIndex::build(universe, &fixtures, &nodes)
    }

    /// Patch a fixture. Overlaps with existing fixtures/nodes are reported,
    /// not applied, unless `allow_overlap` carries the user's confirmation.
    /// Ranges past the universe ceiling are hard errors.
    pub async fn patch_fixture(
        &self,
        name: &str,
        universe: UniverseId,
        address: u16,
        width: u16,
        node_id: Option<u32>,
        allow_overlap: bool,
    ) -> Result<PatchOutcome> {
        let range = ChannelRange::new(address, width)?;
        let occupancy = self.occupancy(universe).await;

        let conflicts = find_conflicts(&range, &occupancy, None);
        if !conflicts.is_empty() {
            if !allow_overlap {
                return Ok(PatchOutcome::Conflicts(conflicts));
            }
            log::warn!(
                "patching \"{}\" over {} confirmed conflict(s) in universe {}",
                name,
                conflicts.len(),
                universe
            );
        }

        let created = self
            .client
            .create_fixture(&NewFixture {
                name: name.to_string(),
                universe,
                start_address: address,
                width,
                node_id,
            })
            .await?;

        self.fixtures.write().await.push(created.clone());
        Ok(PatchOutcome::Applied(created))
    }

    /// Move or rename an existing fixture. The fixture's own claim is
    /// excluded from conflict detection so re-saving in place is clean.
    pub async fn update_fixture(
        &self,
        fixture_id: u32,
        name: &str,
        universe: UniverseId,
        address: u16,
        allow_overlap: bool,
    ) -> Result<PatchOutcome> {
        let current = {
            let fixtures = self.fixtures.read().await;
            fixtures
                .iter()
                .find(|f| f.id == fixture_id)
                .cloned()
                .ok_or_else(|| anyhow!("Fixture {} not found", fixture_id))?
        };

        let range = ChannelRange::new(address, current.width)?;
        let occupancy = self.occupancy(universe).await;

        let conflicts = find_conflicts(&range, &occupancy, Some(OwnerId::fixture(fixture_id)));
        if !conflicts.is_empty() && !allow_overlap {
            return Ok(PatchOutcome::Conflicts(conflicts));
        }

        let updated = Fixture {
            name: name.to_string(),
            universe,
            start_address: address,
            ..current
        };
        self.client.update_fixture(&updated).await?;

        let mut fixtures = self.fixtures.write().await;
        if let Some(slot) = fixtures.iter_mut().find(|f| f.id == fixture_id) {
            *slot = updated.clone();
        }
        Ok(PatchOutcome::Applied(updated))
    }

    pub async fn unpatch_fixture(&self, fixture_id: u32) -> Result<()> {
        self.client.delete_fixture(fixture_id).await?;
        self.fixtures.write().await.retain(|f| f.id != fixture_id);
        Ok(())
    }

    /// Place `quantity` fixtures of `width` channels into the lowest free
    /// windows. All-or-nothing: a shortfall creates no fixtures at all and
    /// is reported back for the user to decide on.
    pub async fn auto_patch_fixtures(
        &self,
        name_prefix: &str,
        universe: UniverseId,
        width: u16,
        quantity: usize,
    ) -> Result<AutoPatchOutcome> {
        let occupancy = self.occupancy(universe).await;
        let allocation = first_fit(width, quantity, &occupancy)?;

        if !allocation.is_complete() {
            return Ok(AutoPatchOutcome::Insufficient {
                requested: allocation.requested,
                placed: allocation.placed(),
            });
        }

        let mut created = Vec::with_capacity(allocation.starts.len());
        for (index, start) in allocation.starts.iter().enumerate() {
            let fixture = self
                .client
                .create_fixture(&NewFixture {
                    name: format!("{} {}", name_prefix, index + 1),
                    universe,
                    start_address: *start,
                    width,
                    node_id: None,
                })
                .await?;
            created.push(fixture);
        }

        self.fixtures.write().await.extend(created.iter().cloned());
        Ok(AutoPatchOutcome::Patched(created))
    }

    /// Pair a physical output node to a channel range. Same conflict
    /// semantics as fixtures.
    pub async fn pair_node(
        &self,
        name: &str,
        universe: UniverseId,
        channel_start: u16,
        channel_end: u16,
        transport: Transport,
        allow_overlap: bool,
    ) -> Result<PairOutcome> {
        if channel_end < channel_start {
            return Err(anyhow!(
                "Node range {}..={} is inverted",
                channel_start,
                channel_end
            ));
        }
        let range = ChannelRange::new(channel_start, channel_end - channel_start + 1)?;
        let occupancy = self.occupancy(universe).await;

        let conflicts = find_conflicts(&range, &occupancy, None);
        if !conflicts.is_empty() {
            if !allow_overlap {
                return Ok(PairOutcome::Conflicts(conflicts));
            }
            log::warn!(
                "pairing \"{}\" over {} confirmed conflict(s) in universe {}",
                name,
                conflicts.len(),
                universe
            );
        }

        let paired = self
            .client
            .pair_node(&NewNode {
                name: name.to_string(),
                universe,
                channel_start,
                channel_end,
                transport,
            })
            .await?;

        self.nodes.write().await.push(paired.clone());
        Ok(PairOutcome::Paired(paired))
    }

    /// Unpair a node. Built-in nodes ship with the controller and are
    /// exempt from unpairing.
    pub async fn unpair_node(&self, node_id: u32) -> Result<()> {
        let builtin = {
            let nodes = self.nodes.read().await;
            let node = nodes
                .iter()
                .find(|n| n.id == node_id)
                .ok_or_else(|| anyhow!("Node {} not found", node_id))?;
            node.is_builtin()
        };
        if builtin {
            return Err(anyhow!("Node {} is built-in and cannot be unpaired", node_id));
        }

        self.client.unpair_node(node_id).await?;
        self.nodes.write().await.retain(|n| n.id != node_id);
        Ok(())
    }

    /// Create a group. Groups are views, not claims, so no conflict check.
    pub async fn create_group(
        &self,
        name: &str,
        channels: BTreeSet<u16>,
        color: &str,
    ) -> Result<Group> {
        let created = self
            .client
            .create_group(&NewGroup {
                name: name.to_string(),
                channels,
                color: color.to_string(),
            })
            .await?;
        self.groups.write().await.push(created.clone());
        Ok(created)
    }

    pub async fn delete_group(&self, group_id: u32) -> Result<()> {
        self.client.delete_group(group_id).await?;
        self.groups.write().await.retain(|g| g.id != group_id);
        Ok(())
    }

    /// Commit an activation over resolved channels. Channels that are
    /// already live require explicit confirmation first.
    pub async fn activate_channels(
        &self,
        channels: Vec<u16>,
        confirmed: bool,
    ) -> Result<ActivationOutcome> {
        if !confirmed {
            let snapshot = self.reconciler.snapshot();
            let snapshot = snapshot.read().await;
            let live: Vec<u16> = channels
                .iter()
                .copied()
                .filter(|&ch| snapshot.is_live(ch))
                .collect();
            if !live.is_empty() {
                return Ok(ActivationOutcome::NeedsConfirm(live));
            }
        }

        self.client.commit_activation(&channels).await?;
        Ok(ActivationOutcome::Committed(channels.len()))
    }

    fn emit(&self, event: PatchEvent) {
        if self.event_tx.send(event).is_err() {
            log::debug!("event receiver dropped");
        }
    }

    /// Drain the command channel until `Shutdown`, running the level poll
    /// alongside. Remote failures surface as events; the console itself
    /// keeps running.
    pub async fn run(&self, mut commands: mpsc::UnboundedReceiver<PatchCommand>) {
        let (poll_stop_tx, poll_stop_rx) = mpsc::channel(1);
        let reconciler = Arc::clone(&self.reconciler);
        let poll_handle = tokio::spawn(async move { reconciler.run(poll_stop_rx).await });

        while let Some(command) = commands.recv().await {
            match command {
                PatchCommand::Refresh => {
                    if let Err(e) = self.refresh().await {
                        self.emit(PatchEvent::Error(format!("refresh failed: {}", e)));
                    }
                }
                PatchCommand::PatchFixture {
                    name,
                    universe,
                    address,
                    width,
                    node_id,
                    allow_overlap,
                } => {
                    match self
                        .patch_fixture(&name, universe, address, width, node_id, allow_overlap)
                        .await
                    {
                        Ok(PatchOutcome::Applied(_)) => self.emit(PatchEvent::FixturesRefreshed),
                        Ok(PatchOutcome::Conflicts(owners)) => {
                            self.emit(PatchEvent::ConflictDetected { owners })
                        }
                        Err(e) => self.emit(PatchEvent::Error(e.to_string())),
                    }
                }
                PatchCommand::UpdateFixture {
                    fixture_id,
                    name,
                    universe,
                    address,
                    allow_overlap,
                } => {
                    match self
                        .update_fixture(fixture_id, &name, universe, address, allow_overlap)
                        .await
                    {
                        Ok(PatchOutcome::Applied(_)) => self.emit(PatchEvent::FixturesRefreshed),
                        Ok(PatchOutcome::Conflicts(owners)) => {
                            self.emit(PatchEvent::ConflictDetected { owners })
                        }
                        Err(e) => self.emit(PatchEvent::Error(e.to_string())),
                    }
                }
                PatchCommand::UnpatchFixture { fixture_id } => {
                    match self.unpatch_fixture(fixture_id).await {
                        Ok(()) => self.emit(PatchEvent::FixturesRefreshed),
                        Err(e) => self.emit(PatchEvent::Error(e.to_string())),
                    }
                }
                PatchCommand::AutoPatchFixtures {
                    name_prefix,
                    universe,
                    width,
                    quantity,
                } => {
                    match self
                        .auto_patch_fixtures(&name_prefix, universe, width, quantity)
                        .await
                    {
                        Ok(AutoPatchOutcome::Patched(_)) => {
                            self.emit(PatchEvent::FixturesRefreshed)
                        }
                        Ok(AutoPatchOutcome::Insufficient { requested, placed }) => {
                            self.emit(PatchEvent::InsufficientSpace { requested, placed })
                        }
                        Err(e) => self.emit(PatchEvent::Error(e.to_string())),
                    }
                }
                PatchCommand::PairNode {
                    name,
                    universe,
                    channel_start,
                    channel_end,
                    transport,
                    allow_overlap,
                } => {
                    match self
                        .pair_node(
                            &name,
                            universe,
                            channel_start,
                            channel_end,
                            transport,
                            allow_overlap,
                        )
                        .await
                    {
                        Ok(PairOutcome::Paired(_)) => self.emit(PatchEvent::NodesRefreshed),
                        Ok(PairOutcome::Conflicts(owners)) => {
                            self.emit(PatchEvent::ConflictDetected { owners })
                        }
                        Err(e) => self.emit(PatchEvent::Error(e.to_string())),
                    }
                }
                PatchCommand::UnpairNode { node_id } => match self.unpair_node(node_id).await {
                    Ok(()) => self.emit(PatchEvent::NodesRefreshed),
                    Err(e) => self.emit(PatchEvent::Error(e.to_string())),
                },
                PatchCommand::CreateGroup {
                    name,
                    channels,
                    color,
                } => match self.create_group(&name, channels, &color).await {
                    Ok(_) => self.emit(PatchEvent::GroupsRefreshed),
                    Err(e) => self.emit(PatchEvent::Error(e.to_string())),
                },
                PatchCommand::DeleteGroup { group_id } => {
                    match self.delete_group(group_id).await {
                        Ok(()) => self.emit(PatchEvent::GroupsRefreshed),
                        Err(e) => self.emit(PatchEvent::Error(e.to_string())),
                    }
                }
                PatchCommand::BeginFaderEdit => self.reconciler.begin_fader_edit(),
                PatchCommand::FaderStep { channel, value } => {
                    self.reconciler
                        .apply_local_edit(channel, value, self.settings.default_fade_ms)
                        .await;
                }
                PatchCommand::EndFaderEdit => self.reconciler.end_fader_edit(),
                PatchCommand::ActivateChannels {
                    channels,
                    confirmed,
                } => match self.activate_channels(channels, confirmed).await {
                    Ok(ActivationOutcome::Committed(channel_count)) => {
                        self.emit(PatchEvent::ActivationCommitted { channel_count })
                    }
                    Ok(ActivationOutcome::NeedsConfirm(live_channels)) => {
                        self.emit(PatchEvent::ActivationNeedsConfirm { live_channels })
                    }
                    Err(e) => self.emit(PatchEvent::CommitFailed {
                        context: e.to_string(),
                    }),
                },
                PatchCommand::Shutdown => break,
            }
        }

        let _ = poll_stop_tx.send(()).await;
        let _ = poll_handle.await;
        log::info!("patch console stopped");
    }
}
