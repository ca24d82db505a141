use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use patchbay_model::UniverseId;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;

use crate::client::ApiClient;
use crate::snapshot::{LevelMap, LevelSnapshot};

#[derive(Debug, Default)]
struct GateState {
    edits: u32,
    resume_at: Option<Instant>,
}

/// Reference-counted suspend/resume gate for the level poll.
///
/// A counter rather than a boolean: two faders held at once are two edits,
/// and the poll may resume only after both have ended. The 1 -> 0
/// transition stamps a grace deadline so the final local write can reach
/// the remote before the next poll reads it back.
#[derive(Debug, Default)]
pub struct PollGate {
    state: Mutex<GateState>,
}

impl PollGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_edit(&self) {
        let mut state = self.state.lock();
        state.edits += 1;
        state.resume_at = None;
    }

    pub fn end_edit(&self, grace: Duration) {
        let mut state = self.state.lock();
        state.edits = state.edits.saturating_sub(1);
        if state.edits == 0 {
            state.resume_at = Some(Instant::now() + grace);
        }
    }

    pub fn active_edits(&self) -> u32 {
        self.state.lock().edits
    }

    /// Whether a poll starting at `now` may read the remote snapshot.
    pub fn poll_allowed(&self, now: Instant) -> bool {
        let state = self.state.lock();
        state.edits == 0 && state.resume_at.map_or(true, |at| now >= at)
    }
}

/// Keeps the polled [`LevelSnapshot`] and locally-initiated edits from
/// trampling each other.
///
/// The poll loop replaces the snapshot wholesale except while a manual edit
/// is in progress. Local edits write the snapshot immediately and fire the
/// remote commit without awaiting it: failures are logged, never rolled
/// back — the next successful poll is the sole source of truth. Surfacing
/// write failures to the operator is the calling UI's job.
pub struct LiveStateReconciler {
    client: Arc<dyn ApiClient>,
    snapshot: Arc<RwLock<LevelSnapshot>>,
    gate: Arc<PollGate>,
    universe: UniverseId,
    poll_interval: Duration,
    grace: Duration,
}

impl LiveStateReconciler {
    pub fn new(
        client: Arc<dyn ApiClient>,
        universe: UniverseId,
        poll_interval: Duration,
        grace: Duration,
    ) -> Self {
        Self {
            client,
            snapshot: Arc::new(RwLock::new(LevelSnapshot::new(universe))),
            gate: Arc::new(PollGate::new()),
            universe,
            poll_interval,
            grace,
        }
    }

    pub fn snapshot(&self) -> Arc<RwLock<LevelSnapshot>> {
        Arc::clone(&self.snapshot)
    }

    pub fn gate(&self) -> Arc<PollGate> {
        Arc::clone(&self.gate)
    }

    pub fn begin_fader_edit(&self) {
        self.gate.begin_edit();
    }

    pub fn end_fader_edit(&self) {
        self.gate.end_edit(self.grace);
    }

    /// Apply a fader step locally and commit it to the remote without
    /// blocking on the result.
    pub async fn apply_local_edit(&self, channel: u16, value: u8, fade_ms: u32) {
        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.set_level(channel, value);
        }

        let client = Arc::clone(&self.client);
        let universe = self.universe;
        tokio::spawn(async move {
            let mut levels = LevelMap::default();
            levels.0.insert(channel, value);
            if let Err(e) = client.commit_levels(universe, &levels, fade_ms).await {
                log::warn!(
                    "level commit for universe {} channel {} failed: {}",
                    universe,
                    channel,
                    e
                );
            }
        });
    }

    /// Run the poll loop until a shutdown message arrives. Skipped ticks
    /// while the gate is closed are not made up for; the next open tick
    /// refreshes everything.
    pub async fn run(&self, mut shutdown: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        log::info!(
            "level poll running for universe {} every {:?}",
            self.universe,
            self.poll_interval
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    log::info!("level poll for universe {} stopped", self.universe);
                    break;
                }
                _ = ticker.tick() => {
                    if !self.gate.poll_allowed(Instant::now()) {
                        log::debug!("level poll suspended, {} edits active", self.gate.active_edits());
                        continue;
                    }
                    match self.client.poll_levels(self.universe).await {
                        Ok(levels) => {
                            let mut snapshot = self.snapshot.write().await;
                            snapshot.replace(levels.0);
                        }
                        Err(e) => log::warn!("level poll for universe {} failed: {}", self.universe, e),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::Result;
    use async_trait::async_trait;
    use patchbay_model::{Fixture, Group, Node};

    use super::*;
    use crate::client::{NewFixture, NewGroup, NewNode};

    #[test]
    fn gate_requires_every_edit_to_end() {
        let gate = PollGate::new();
        assert!(gate.poll_allowed(Instant::now()));

        gate.begin_edit();
        gate.begin_edit();
        assert!(!gate.poll_allowed(Instant::now()));

        gate.end_edit(Duration::ZERO);
        assert!(!gate.poll_allowed(Instant::now()));
        assert_eq!(gate.active_edits(), 1);

        gate.end_edit(Duration::ZERO);
        assert!(gate.poll_allowed(Instant::now()));
    }

    #[test]
    fn gate_holds_through_the_grace_window() {
        let gate = PollGate::new();
        gate.begin_edit();
        gate.end_edit(Duration::from_millis(500));

        let now = Instant::now();
        assert!(!gate.poll_allowed(now));
        assert!(gate.poll_allowed(now + Duration::from_millis(600)));
    }

    #[test]
    fn new_edit_during_grace_closes_the_gate_again() {
        let gate = PollGate::new();
        gate.begin_edit();
        gate.end_edit(Duration::from_millis(500));
        gate.begin_edit();

        let later = Instant::now() + Duration::from_secs(5);
        assert!(!gate.poll_allowed(later));
    }

    #[test]
    fn extra_end_edit_does_not_underflow() {
        let gate = PollGate::new();
        gate.end_edit(Duration::ZERO);
        assert_eq!(gate.active_edits(), 0);
    }

    struct FakeClient {
        polls: AtomicUsize,
        commits: AtomicUsize,
        level: u8,
    }

    #[async_trait]
    impl ApiClient for FakeClient {
        async fn list_fixtures(&self) -> Result<Vec<Fixture>> {
            Ok(Vec::new())
        }
        async fn list_nodes(&self) -> Result<Vec<Node>> {
            Ok(Vec::new())
        }
        async fn list_groups(&self) -> Result<Vec<Group>> {
            Ok(Vec::new())
        }
        async fn create_fixture(&self, _: &NewFixture) -> Result<Fixture> {
            unimplemented!()
        }
        async fn update_fixture(&self, _: &Fixture) -> Result<()> {
            Ok(())
        }
        async fn delete_fixture(&self, _: u32) -> Result<()> {
            Ok(())
        }
        async fn pair_node(&self, _: &NewNode) -> Result<Node> {
            unimplemented!()
        }
        async fn unpair_node(&self, _: u32) -> Result<()> {
            Ok(())
        }
        async fn create_group(&self, _: &NewGroup) -> Result<Group> {
            unimplemented!()
        }
        async fn delete_group(&self, _: u32) -> Result<()> {
            Ok(())
        }
        async fn poll_levels(&self, _: UniverseId) -> Result<LevelMap> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut levels = LevelMap::default();
            levels.0.insert(1, self.level);
            Ok(levels)
        }
        async fn commit_levels(&self, _: UniverseId, _: &LevelMap, _: u32) -> Result<()> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn commit_activation(&self, _: &[u16]) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_loop_refreshes_and_respects_the_gate() {
        let client = Arc::new(FakeClient {
            polls: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            level: 99,
        });
        let reconciler = Arc::new(LiveStateReconciler::new(
            Arc::clone(&client) as Arc<dyn ApiClient>,
            1,
            Duration::from_secs(5),
            Duration::from_millis(750),
        ));

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let runner = Arc::clone(&reconciler);
        let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

        // Let a couple of ticks elapse with the gate open.
        tokio::time::sleep(Duration::from_secs(11)).await;
        let open_polls = client.polls.load(Ordering::SeqCst);
        assert!(open_polls >= 2);
        assert_eq!(reconciler.snapshot().read().await.level(1), 99);

        // Suspend, locally edit, and confirm ticks stop fetching.
        reconciler.begin_fader_edit();
        reconciler.apply_local_edit(1, 10, 200).await;
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(client.polls.load(Ordering::SeqCst), open_polls);
        assert_eq!(reconciler.snapshot().read().await.level(1), 10);
        assert_eq!(client.commits.load(Ordering::SeqCst), 1);

        // Resume: after the grace window the poll wins again.
        reconciler.end_fader_edit();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(client.polls.load(Ordering::SeqCst) > open_polls);
        assert_eq!(reconciler.snapshot().read().await.level(1), 99);

        shutdown_tx.send(()).await.unwrap();
        handle.await.unwrap();
    }
}
