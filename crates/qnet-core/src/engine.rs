//! Container engine abstraction.
//!
//! [`ContainerEngine`] is the narrow set of engine calls the orchestrator
//! needs. [`crate::docker::DockerEngine`] talks to a real Docker daemon;
//! [`crate::fakes::MemoryEngine`] keeps everything in memory for tests.
//! Implementations must be safe to call concurrently from many tasks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::labels::{LabelFilter, Labels};

/// Network created for one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHandle {
    pub id: String,
    pub name: String,
}

/// Network as reported by a label query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSummary {
    pub id: String,
    pub name: String,
    pub labels: Labels,
}

/// Container as reported by a label query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub labels: Labels,
}

/// Everything needed to create one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub hostname: String,
    pub image: String,
    pub network: String,
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub labels: Labels,
}

/// First 12 characters of an engine id, for log lines.
pub fn short_id(id: &str) -> &str {
    &id[..12.min(id.len())]
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Create a network named `name` carrying `labels`.
    async fn create_network(&self, name: &str, labels: &Labels) -> EngineResult<NetworkHandle>;

    /// Remove a network by id or name.
    async fn remove_network(&self, id: &str) -> EngineResult<()>;

    /// Networks whose labels satisfy `filter`.
    async fn list_networks(&self, filter: &LabelFilter) -> EngineResult<Vec<NetworkSummary>>;

    /// Ids of local images matching `reference`.
    async fn list_images(&self, reference: &str) -> EngineResult<Vec<String>>;

    /// Pull `reference` from its registry.
    async fn pull_image(&self, reference: &str) -> EngineResult<()>;

    /// Create (but do not start) a container, returning its id.
    async fn create_container(&self, spec: &ContainerSpec) -> EngineResult<String>;

    async fn start_container(&self, id: &str) -> EngineResult<()>;

    async fn stop_container(&self, id: &str) -> EngineResult<()>;

    /// Containers, running or not, whose labels satisfy `filter`.
    async fn list_containers(&self, filter: &LabelFilter) -> EngineResult<Vec<ContainerSummary>>;

    /// Remove a container. With `force` a running container is killed first.
    async fn remove_container(&self, id: &str, force: bool) -> EngineResult<()>;
}
