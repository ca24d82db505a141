use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use patchbay_model::{Fixture, Group, Node, Transport, UniverseId};
use serde::{Deserialize, Serialize};

use crate::snapshot::LevelMap;

/// Create-request shapes: the same records as the model types, minus the
/// server-assigned id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewFixture {
    pub name: String,
    pub universe: UniverseId,
    pub start_address: u16,
    pub width: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewNode {
    pub name: String,
    pub universe: UniverseId,
    pub channel_start: u16,
    pub channel_end: u16,
    pub transport: Transport,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub channels: BTreeSet<u16>,
    pub color: String,
}

/// The remote backend boundary. The core never assumes persistence stronger
/// than "eventually reflected on the next poll", and every write here is
/// idempotent from the core's point of view — safe to retry without
/// re-deriving an allocation.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn list_fixtures(&self) -> Result<Vec<Fixture>>;
    async fn list_nodes(&self) -> Result<Vec<Node>>;
    async fn list_groups(&self) -> Result<Vec<Group>>;

    async fn create_fixture(&self, fixture: &NewFixture) -> Result<Fixture>;
    async fn update_fixture(&self, fixture: &Fixture) -> Result<()>;
    async fn delete_fixture(&self, id: u32) -> Result<()>;

    async fn pair_node(&self, node: &NewNode) -> Result<Node>;
    async fn unpair_node(&self, id: u32) -> Result<()>;

    async fn create_group(&self, group: &NewGroup) -> Result<Group>;
    async fn delete_group(&self, id: u32) -> Result<()>;

    /// Current channel values for one universe.
    async fn poll_levels(&self, universe: UniverseId) -> Result<LevelMap>;

    /// Commit a channel-value edit with a fade time.
    async fn commit_levels(
        &self,
        universe: UniverseId,
        levels: &LevelMap,
        fade_ms: u32,
    ) -> Result<()>;

    /// Commit an activation over a resolved channel selection.
    async fn commit_activation(&self, channels: &[u16]) -> Result<()>;
}

#[derive(Serialize)]
struct LevelCommit<'a> {
    levels: &'a LevelMap,
    fade_ms: u32,
}

#[derive(Serialize)]
struct ActivationCommit<'a> {
    target_channels: &'a [u16],
}

/// JSON-over-HTTP implementation of [`ApiClient`].
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("GET {} failed", path))?
            .error_for_status()
            .with_context(|| format!("GET {} rejected", path))?;
        response
            .json()
            .await
            .with_context(|| format!("GET {} returned invalid JSON", path))
    }

    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", path))?
            .error_for_status()
            .with_context(|| format!("POST {} rejected", path))?;
        response
            .json()
            .await
            .with_context(|| format!("POST {} returned invalid JSON", path))
    }

    async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        self.http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", path))?
            .error_for_status()
            .with_context(|| format!("POST {} rejected", path))?;
        Ok(())
    }

    async fn put_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        self.http
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("PUT {} failed", path))?
            .error_for_status()
            .with_context(|| format!("PUT {} rejected", path))?;
        Ok(())
    }

    async fn delete_unit(&self, path: &str) -> Result<()> {
        self.http
            .delete(self.url(path))
            .send()
            .await
            .with_context(|| format!("DELETE {} failed", path))?
            .error_for_status()
            .with_context(|| format!("DELETE {} rejected", path))?;
        Ok(())
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn list_fixtures(&self) -> Result<Vec<Fixture>> {
        self.get_json("/fixtures").await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.get_json("/nodes").await
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        self.get_json("/groups").await
    }

    async fn create_fixture(&self, fixture: &NewFixture) -> Result<Fixture> {
        self.post_json("/fixtures", fixture).await
    }

    async fn update_fixture(&self, fixture: &Fixture) -> Result<()> {
        self.put_unit(&format!("/fixtures/{}", fixture.id), fixture)
            .await
    }

    async fn delete_fixture(&self, id: u32) -> Result<()> {
        self.delete_unit(&format!("/fixtures/{}", id)).await
    }

    async fn pair_node(&self, node: &NewNode) -> Result<Node> {
        self.post_json("/nodes", node).await
    }

    async fn unpair_node(&self, id: u32) -> Result<()> {
        self.delete_unit(&format!("/nodes/{}", id)).await
    }

    async fn create_group(&self, group: &NewGroup) -> Result<Group> {
        self.post_json("/groups", group).await
    }

    async fn delete_group(&self, id: u32) -> Result<()> {
        self.delete_unit(&format!("/groups/{}", id)).await
    }

    async fn poll_levels(&self, universe: UniverseId) -> Result<LevelMap> {
        self.get_json(&format!("/universes/{}/levels", universe))
            .await
    }

    async fn commit_levels(
        &self,
        universe: UniverseId,
        levels: &LevelMap,
        fade_ms: u32,
    ) -> Result<()> {
        self.post_unit(
            &format!("/universes/{}/levels", universe),
            &LevelCommit { levels, fade_ms },
        )
        .await
    }

    async fn commit_activation(&self, channels: &[u16]) -> Result<()> {
        self.post_unit(
            "/activate",
            &ActivationCommit {
                target_channels: channels,
            },
        )
        .await
    }
}
