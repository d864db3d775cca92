//! Provisioning runs: network creation, group startup and label-driven teardown.
//!
//! A [`Provisioner`] lives for one `up` invocation. It owns the run's common
//! labels and the network handle, and remembers the containers it started.
//! [`destroy`] needs none of that: it rebuilds the label filter from the run
//! name and removes whatever the engine reports.
//!
//! # Build sequence
//!
//! 1. [`Provisioner::create_network`]
//! 2. [`Provisioner::start_tx_managers`]
//! 3. [`Provisioner::start_nodes`]
//!
//! [`Provisioner::build`] runs steps 1 and 2. Step 3 is left to the caller.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::config::{ImageConfig, NodeDecl, ProvisionConfig};
use crate::engine::{short_id, ContainerEngine, ContainerSummary, NetworkHandle, NetworkSummary};
use crate::error::{ProvisionError, ProvisionResult};
use crate::executor::{run_parallel, run_parallel_collect};
use crate::image::ensure_image;
use crate::labels::{common_labels, LabelFilter, Labels};
use crate::obs::{emit_network_created, emit_resource_removed};
use crate::report::{ContainerEntry, NetworkReport};
use crate::resource::{build_resource, Resource, ResourceConfig, Role};

const TX_MANAGER_GROUP: &str = "tx managers";
const NODE_GROUP: &str = "quorum nodes";

/// One provisioning run.
pub struct Provisioner {
    config: ProvisionConfig,
    common_labels: Labels,
    engine: Arc<dyn ContainerEngine>,
    network: Option<NetworkHandle>,
    started: Vec<Arc<dyn Resource>>,
}

impl Provisioner {
    pub fn new(config: ProvisionConfig, engine: Arc<dyn ContainerEngine>) -> ProvisionResult<Self> {
        config.validate()?;
        Ok(Self {
            common_labels: common_labels(&config.name),
            config,
            engine,
            network: None,
            started: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Labels attached to every resource of this run.
    pub fn common_labels(&self) -> &Labels {
        &self.common_labels
    }

    pub fn network(&self) -> Option<&NetworkHandle> {
        self.network.as_ref()
    }

    /// Containers this run started, in completion order.
    pub fn resources(&self) -> &[Arc<dyn Resource>] {
        &self.started
    }

    /// Create the network and start the transaction managers.
    pub async fn build(&mut self) -> ProvisionResult<()> {
        self.create_network().await?;
        self.start_tx_managers().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(provisioning_id = %self.config.name))]
    pub async fn create_network(&mut self) -> ProvisionResult<&NetworkHandle> {
        debug!(name = %self.config.name, "creating network");
        let network = self
            .engine
            .create_network(&self.config.name, &self.common_labels)
            .await
            .map_err(|source| ProvisionError::NetworkCreate {
                name: self.config.name.clone(),
                source,
            })?;
        emit_network_created(&network.name, &network.id);
        Ok(self.network.insert(network))
    }

    #[instrument(skip(self), fields(provisioning_id = %self.config.name))]
    pub async fn start_tx_managers(&mut self) -> ProvisionResult<()> {
        self.start_group(Role::TxManager, TX_MANAGER_GROUP, |node| &node.tx_manager)
            .await
    }

    #[instrument(skip(self), fields(provisioning_id = %self.config.name))]
    pub async fn start_nodes(&mut self) -> ProvisionResult<()> {
        self.start_group(Role::Quorum, NODE_GROUP, |node| &node.quorum)
            .await
    }

    /// Ensure images, construct and start one `role` container per node, all
    /// concurrently. Containers that did start are kept even when the group fails.
    async fn start_group(
        &mut self,
        role: Role,
        group: &str,
        select: fn(&NodeDecl) -> &ImageConfig,
    ) -> ProvisionResult<()> {
        let network = self
            .network
            .clone()
            .ok_or_else(|| ProvisionError::NetworkMissing {
                name: self.config.name.clone(),
            })?;
        let elements: Vec<(usize, ImageConfig)> = self
            .config
            .nodes
            .iter()
            .map(select)
            .cloned()
            .enumerate()
            .collect();
        let total = elements.len();
        debug!(group = %group, total, "starting containers");

        let engine = Arc::clone(&self.engine);
        let run_name = self.config.name.clone();
        let labels = self.common_labels.clone();
        let outcome = run_parallel_collect(group, elements, move |(index, image)| {
            let config = ResourceConfig {
                index,
                run_name: run_name.clone(),
                engine: Arc::clone(&engine),
                network: network.clone(),
                image: image.image,
                config: image.config,
                labels: labels.clone(),
            };
            async move {
                start_resource(role, config)
                    .await
                    .map_err(|e| format!("container {index}: {e}"))
            }
        })
        .await;

        self.started.extend(outcome.outputs);
        let tally = outcome.tally;
        if tally.failed() > 0 {
            return Err(ProvisionError::GroupStart {
                group: group.to_string(),
                ready: tally.succeeded(),
                total,
                errors: tally.errors().to_vec(),
            });
        }
        info!(group = %group, total, "containers are ready");
        Ok(())
    }

    /// Stop every container this run started.
    #[instrument(skip(self), fields(provisioning_id = %self.config.name))]
    pub async fn stop_all(&self) -> ProvisionResult<()> {
        run_parallel("stopping containers", self.started.clone(), |resource| async move {
            resource
                .stop()
                .await
                .map_err(|e| format!("container {}: {e}", resource.index()))
        })
        .await
        .map_err(ProvisionError::Stop)
    }

    /// Remove everything labelled with this run's name.
    pub async fn destroy(&self) -> ProvisionResult<()> {
        destroy(Arc::clone(&self.engine), &self.config.name).await
    }

    /// Describe what this run has created so far.
    pub async fn report(&self) -> NetworkReport {
        let mut containers = Vec::with_capacity(self.started.len());
        for resource in &self.started {
            containers.push(ContainerEntry {
                index: resource.index(),
                role: resource.role(),
                name: resource.name().to_string(),
                id: resource.id().await,
                image: resource.image().to_string(),
            });
        }
        let mut report = NetworkReport {
            name: self.config.name.clone(),
            network: self.network.clone(),
            generated_at: Utc::now(),
            containers,
        };
        report.sort();
        report
    }
}

async fn start_resource(role: Role, config: ResourceConfig) -> ProvisionResult<Arc<dyn Resource>> {
    ensure_image(config.engine.as_ref(), &config.image).await?;
    let index = config.index;
    let resource = build_resource(role, config)?;
    debug!(idx = index, role = %role, "start container");
    resource.start().await?;
    Ok(resource)
}

/// Remove every container, then every network, labelled with run `name`.
///
/// Needs no state from the run that created them and is idempotent: with
/// nothing left to remove it succeeds. Removal failures of individual resources
/// do not stop their siblings; containers go first because a network with
/// attached containers refuses removal.
#[instrument(skip(engine), fields(provisioning_id = %name))]
pub async fn destroy(engine: Arc<dyn ContainerEngine>, name: &str) -> ProvisionResult<()> {
    let filter = LabelFilter::for_run(name);

    let containers = engine
        .list_containers(&filter)
        .await
        .map_err(ProvisionError::Lookup)?;
    let container_engine = Arc::clone(&engine);
    run_parallel(
        "removing containers",
        containers,
        move |container: ContainerSummary| {
            let engine = Arc::clone(&container_engine);
            async move {
                let label = container
                    .names
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_else(|| short_id(&container.id).to_string());
                debug!(id = %short_id(&container.id), names = ?container.names, "removing container");
                engine
                    .remove_container(&container.id, true)
                    .await
                    .map_err(|e| format!("container {label}: {e}"))?;
                emit_resource_removed("container", &container.id, &label);
                Ok::<(), String>(())
            }
        },
    )
    .await
    .map_err(ProvisionError::Teardown)?;

    let networks = engine
        .list_networks(&filter)
        .await
        .map_err(ProvisionError::Lookup)?;
    let network_engine = Arc::clone(&engine);
    run_parallel(
        "removing networks",
        networks,
        move |network: NetworkSummary| {
            let engine = Arc::clone(&network_engine);
            async move {
                debug!(id = %short_id(&network.id), name = %network.name, "removing network");
                engine
                    .remove_network(&network.id)
                    .await
                    .map_err(|e| format!("network {}: {e}", network.name))?;
                emit_resource_removed("network", &network.id, &network.name);
                Ok::<(), String>(())
            }
        },
    )
    .await
    .map_err(ProvisionError::Teardown)?;

    info!(name = %name, "network destroyed");
    Ok(())
}
