//! In-memory container engine (testing only)
//!
//! `MemoryEngine` satisfies the [`ContainerEngine`] contract without a Docker
//! daemon and lets tests inject failures for specific containers, images or
//! networks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::engine::{ContainerEngine, ContainerSpec, ContainerSummary, NetworkHandle, NetworkSummary};
use crate::error::{EngineError, EngineResult};
use crate::labels::{LabelFilter, Labels};

#[derive(Debug, Clone)]
struct FakeNetwork {
    name: String,
    labels: Labels,
}

/// Container record kept by [`MemoryEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeContainer {
    pub id: String,
    pub spec: ContainerSpec,
    pub running: bool,
}

#[derive(Debug, Default)]
struct Failures {
    network_create: bool,
    image_lookup: bool,
    container_lookup: bool,
    network_lookup: bool,
    pulls: BTreeSet<String>,
    starts: BTreeSet<String>,
    stops: BTreeSet<String>,
    removals: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct EngineState {
    next_id: u64,
    networks: BTreeMap<String, FakeNetwork>,
    containers: BTreeMap<String, FakeContainer>,
    images: BTreeSet<String>,
    pulls: Vec<String>,
    failures: Failures,
}

impl EngineState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:060x}", self.next_id)
    }

    fn resolve_network(&self, id_or_name: &str) -> Option<String> {
        if self.networks.contains_key(id_or_name) {
            return Some(id_or_name.to_string());
        }
        self.networks
            .iter()
            .find(|(_, n)| n.name == id_or_name)
            .map(|(id, _)| id.clone())
    }
}

/// Appends `:latest` when `reference` carries no tag or digest.
fn normalize_reference(reference: &str) -> String {
    let last = reference.rsplit('/').next().unwrap_or(reference);
    if last.contains(':') || last.contains('@') {
        reference.to_string()
    } else {
        format!("{reference}:latest")
    }
}

/// In-memory engine backed by a single `Mutex<EngineState>`.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: Mutex<EngineState>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image as already present locally.
    pub fn with_image(self, reference: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .images
            .insert(normalize_reference(reference));
        self
    }

    /// Make `create_network` fail.
    pub fn fail_network_create(&self) {
        self.state.lock().unwrap().failures.network_create = true;
    }

    /// Make every `list_images` call fail.
    pub fn fail_image_lookup(&self) {
        self.state.lock().unwrap().failures.image_lookup = true;
    }

    /// Make every `list_containers` call fail.
    pub fn fail_container_lookup(&self) {
        self.state.lock().unwrap().failures.container_lookup = true;
    }

    /// Make every `list_networks` call fail.
    pub fn fail_network_lookup(&self) {
        self.state.lock().unwrap().failures.network_lookup = true;
    }

    /// Make pulling `reference` fail.
    pub fn fail_pull(&self, reference: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .pulls
            .insert(normalize_reference(reference));
    }

    /// Make starting the container called `name` fail.
    pub fn fail_start(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .starts
            .insert(name.to_string());
    }

    /// Make stopping the container called `name` fail.
    pub fn fail_stop(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .stops
            .insert(name.to_string());
    }

    /// Make removing the container called `name` fail.
    pub fn fail_remove(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .removals
            .insert(name.to_string());
    }

    /// Images pulled so far, in call order.
    pub fn pulls(&self) -> Vec<String> {
        self.state.lock().unwrap().pulls.clone()
    }

    pub fn containers(&self) -> Vec<FakeContainer> {
        self.state.lock().unwrap().containers.values().cloned().collect()
    }

    pub fn container_by_name(&self, name: &str) -> Option<FakeContainer> {
        self.state
            .lock()
            .unwrap()
            .containers
            .values()
            .find(|c| c.spec.name == name)
            .cloned()
    }

    /// Names of all networks currently known.
    pub fn network_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .networks
            .values()
            .map(|n| n.name.clone())
            .collect()
    }
}

#[async_trait]
impl ContainerEngine for MemoryEngine {
    async fn create_network(&self, name: &str, labels: &Labels) -> EngineResult<NetworkHandle> {
        let mut state = self.state.lock().unwrap();
        if state.failures.network_create {
            return Err(EngineError::Api("network create refused".to_string()));
        }
        if state.networks.values().any(|n| n.name == name) {
            return Err(EngineError::Conflict(format!(
                "network with name {name} already exists"
            )));
        }
        let id = state.allocate_id("n");
        state.networks.insert(
            id.clone(),
            FakeNetwork {
                name: name.to_string(),
                labels: labels.clone(),
            },
        );
        Ok(NetworkHandle {
            id,
            name: name.to_string(),
        })
    }

    async fn remove_network(&self, id: &str) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        let key = state.resolve_network(id).ok_or_else(|| EngineError::NotFound {
            kind: "network".to_string(),
            id: id.to_string(),
        })?;
        let name = state.networks[&key].name.clone();
        let attached = state
            .containers
            .values()
            .any(|c| c.spec.network == name || c.spec.network == key);
        if attached {
            return Err(EngineError::Conflict(format!(
                "error while removing network: network {name} id {key} has active endpoints"
            )));
        }
        state.networks.remove(&key);
        Ok(())
    }

    async fn list_networks(&self, filter: &LabelFilter) -> EngineResult<Vec<NetworkSummary>> {
        let state = self.state.lock().unwrap();
        if state.failures.network_lookup {
            return Err(EngineError::Connection("network listing refused".to_string()));
        }
        Ok(state
            .networks
            .iter()
            .filter(|(_, n)| filter.matches(&n.labels))
            .map(|(id, n)| NetworkSummary {
                id: id.clone(),
                name: n.name.clone(),
                labels: n.labels.clone(),
            })
            .collect())
    }

    async fn list_images(&self, reference: &str) -> EngineResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        if state.failures.image_lookup {
            return Err(EngineError::Api("image lookup refused".to_string()));
        }
        let wanted = normalize_reference(reference);
        Ok(state
            .images
            .iter()
            .filter(|image| **image == wanted)
            .cloned()
            .collect())
    }

    async fn pull_image(&self, reference: &str) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        let normalized = normalize_reference(reference);
        state.pulls.push(reference.to_string());
        if state.failures.pulls.contains(&normalized) {
            return Err(EngineError::NotFound {
                kind: "image".to_string(),
                id: reference.to_string(),
            });
        }
        state.images.insert(normalized);
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> EngineResult<String> {
        let mut state = self.state.lock().unwrap();
        if state.containers.values().any(|c| c.spec.name == spec.name) {
            return Err(EngineError::Conflict(format!(
                "container name {} is already in use",
                spec.name
            )));
        }
        if state.resolve_network(&spec.network).is_none() {
            return Err(EngineError::NotFound {
                kind: "network".to_string(),
                id: spec.network.clone(),
            });
        }
        let id = state.allocate_id("c");
        state.containers.insert(
            id.clone(),
            FakeContainer {
                id: id.clone(),
                spec: spec.clone(),
                running: false,
            },
        );
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        let fail = {
            let container = state.containers.get(id).ok_or_else(|| EngineError::NotFound {
                kind: "container".to_string(),
                id: id.to_string(),
            })?;
            state.failures.starts.contains(&container.spec.name)
        };
        if fail {
            return Err(EngineError::Api(format!("cannot start container {id}")));
        }
        if let Some(container) = state.containers.get_mut(id) {
            container.running = true;
        }
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        let fail = {
            let container = state.containers.get(id).ok_or_else(|| EngineError::NotFound {
                kind: "container".to_string(),
                id: id.to_string(),
            })?;
            state.failures.stops.contains(&container.spec.name)
        };
        if fail {
            return Err(EngineError::Api(format!("cannot stop container {id}")));
        }
        if let Some(container) = state.containers.get_mut(id) {
            container.running = false;
        }
        Ok(())
    }

    async fn list_containers(&self, filter: &LabelFilter) -> EngineResult<Vec<ContainerSummary>> {
        let state = self.state.lock().unwrap();
        if state.failures.container_lookup {
            return Err(EngineError::Connection("container listing refused".to_string()));
        }
        Ok(state
            .containers
            .values()
            .filter(|c| filter.matches(&c.spec.labels))
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                names: vec![format!("/{}", c.spec.name)],
                labels: c.spec.labels.clone(),
            })
            .collect())
    }

    async fn remove_container(&self, id: &str, force: bool) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        let container = state.containers.get(id).ok_or_else(|| EngineError::NotFound {
            kind: "container".to_string(),
            id: id.to_string(),
        })?;
        if state.failures.removals.contains(&container.spec.name) {
            return Err(EngineError::Api(format!(
                "cannot remove container {}",
                container.spec.name
            )));
        }
        if container.running && !force {
            return Err(EngineError::Conflict(format!(
                "cannot remove running container {id}"
            )));
        }
        state.containers.remove(id);
        Ok(())
    }
}
