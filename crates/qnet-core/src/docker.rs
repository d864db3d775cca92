//! Docker implementation of [`ContainerEngine`] on top of `bollard`.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions,
};
use bollard::image::{CreateImageOptions, ListImagesOptions};
use bollard::models::HostConfig;
use bollard::network::{CreateNetworkOptions, InspectNetworkOptions, ListNetworksOptions};
use bollard::Docker;
use futures::TryStreamExt;
use tracing::debug;

use crate::engine::{
    short_id, ContainerEngine, ContainerSpec, ContainerSummary, NetworkHandle, NetworkSummary,
};
use crate::error::{EngineError, EngineResult};
use crate::labels::{LabelFilter, Labels};

const NETWORK_DRIVER: &str = "bridge";

/// Docker daemon client. Cloning is cheap and clones share one connection pool.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using `DOCKER_HOST` or the platform's default local socket.
    pub fn connect() -> EngineResult<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Connection(e.to_string()))?;
        Ok(Self { docker })
    }

    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }
}

fn to_hash_map(labels: &Labels) -> HashMap<String, String> {
    labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn to_labels(labels: Option<HashMap<String, String>>) -> Labels {
    labels.unwrap_or_default().into_iter().collect()
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn create_network(&self, name: &str, labels: &Labels) -> EngineResult<NetworkHandle> {
        let options = CreateNetworkOptions::<String> {
            name: name.to_string(),
            driver: NETWORK_DRIVER.to_string(),
            labels: to_hash_map(labels),
            ..Default::default()
        };
        self.docker.create_network(options).await?;

        let network = self
            .docker
            .inspect_network(name, None::<InspectNetworkOptions<String>>)
            .await?;
        let id = network.id.unwrap_or_else(|| name.to_string());
        debug!(id = %short_id(&id), name = %name, "network created");
        Ok(NetworkHandle {
            id,
            name: name.to_string(),
        })
    }

    async fn remove_network(&self, id: &str) -> EngineResult<()> {
        self.docker.remove_network(id).await?;
        Ok(())
    }

    async fn list_networks(&self, filter: &LabelFilter) -> EngineResult<Vec<NetworkSummary>> {
        let options = ListNetworksOptions::<String> {
            filters: filter.to_query(),
        };
        let networks = self.docker.list_networks(Some(options)).await?;
        Ok(networks
            .into_iter()
            .filter_map(|n| {
                let id = n.id?;
                Some(NetworkSummary {
                    name: n.name.unwrap_or_else(|| id.clone()),
                    id,
                    labels: to_labels(n.labels),
                })
            })
            .collect())
    }

    async fn list_images(&self, reference: &str) -> EngineResult<Vec<String>> {
        let options = ListImagesOptions::<String> {
            filters: HashMap::from([("reference".to_string(), vec![reference.to_string()])]),
            ..Default::default()
        };
        let images = self.docker.list_images(Some(options)).await?;
        Ok(images.into_iter().map(|image| image.id).collect())
    }

    async fn pull_image(&self, reference: &str) -> EngineResult<()> {
        let options = CreateImageOptions::<String> {
            from_image: reference.to_string(),
            ..Default::default()
        };
        // The pull only completes once the progress stream is drained.
        self.docker
            .create_image(Some(options), None, None)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> EngineResult<String> {
        let options = CreateContainerOptions::<String> {
            name: spec.name.clone(),
            platform: None,
        };
        let config = Config::<String> {
            image: Some(spec.image.clone()),
            hostname: Some(spec.hostname.clone()),
            cmd: Some(spec.args.clone()),
            env: Some(spec.env.clone()),
            labels: Some(to_hash_map(&spec.labels)),
            host_config: Some(HostConfig {
                network_mode: Some(spec.network.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let response = self.docker.create_container(Some(options), config).await?;
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> EngineResult<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> EngineResult<()> {
        self.docker.stop_container(id, None).await?;
        Ok(())
    }

    async fn list_containers(&self, filter: &LabelFilter) -> EngineResult<Vec<ContainerSummary>> {
        let options = ListContainersOptions::<String> {
            all: true,
            filters: filter.to_query(),
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;
        Ok(containers
            .into_iter()
            .filter_map(|c| {
                Some(ContainerSummary {
                    id: c.id?,
                    names: c.names.unwrap_or_default(),
                    labels: to_labels(c.labels),
                })
            })
            .collect())
    }

    async fn remove_container(&self, id: &str, force: bool) -> EngineResult<()> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.docker.remove_container(id, Some(options)).await?;
        Ok(())
    }
}
