//! Per-node containers: transaction managers and Quorum nodes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::engine::{short_id, ContainerEngine, ContainerSpec, NetworkHandle};
use crate::error::{ProvisionError, ProvisionResult};
use crate::labels::{Labels, NODE_INDEX_LABEL, ROLE_LABEL};
use crate::obs::emit_resource_started;

/// Container role within a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    TxManager,
    Quorum,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::TxManager => "tx-manager",
            Role::Quorum => "quorum",
        }
    }

    fn hostname_prefix(&self) -> &'static str {
        match self {
            Role::TxManager => "txmanager",
            Role::Quorum => "node",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a container needs at construction time.
#[derive(Clone)]
pub struct ResourceConfig {
    pub index: usize,
    pub run_name: String,
    pub engine: Arc<dyn ContainerEngine>,
    pub network: NetworkHandle,
    pub image: String,
    pub config: BTreeMap<String, String>,
    pub labels: Labels,
}

impl fmt::Debug for ResourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceConfig")
            .field("index", &self.index)
            .field("run_name", &self.run_name)
            .field("network", &self.network)
            .field("image", &self.image)
            .field("config", &self.config)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

/// A startable, stoppable engine resource.
#[async_trait]
pub trait Resource: Send + Sync {
    fn name(&self) -> &str;

    fn role(&self) -> Role;

    fn index(&self) -> usize;

    fn image(&self) -> &str;

    /// Engine id once started.
    async fn id(&self) -> Option<String>;

    async fn start(&self) -> ProvisionResult<()>;

    async fn stop(&self) -> ProvisionResult<()>;
}

/// Shared create/start/stop logic for both roles.
struct ManagedContainer {
    role: Role,
    index: usize,
    engine: Arc<dyn ContainerEngine>,
    spec: ContainerSpec,
    id: Mutex<Option<String>>,
}

impl ManagedContainer {
    fn new(role: Role, config: ResourceConfig) -> ProvisionResult<Self> {
        let invalid = |reason: String| ProvisionError::InvalidResource {
            index: config.index,
            reason,
        };
        if config.run_name.is_empty() {
            return Err(invalid("run name is empty".to_string()));
        }
        if config.image.trim().is_empty() {
            return Err(invalid(format!("{role} image is empty")));
        }
        if let Some(key) = config
            .config
            .keys()
            .find(|k| k.is_empty() || k.contains('=') || k.contains(char::is_whitespace))
        {
            return Err(invalid(format!("config key {key:?} is not a valid option name")));
        }

        let mut labels = config.labels.clone();
        labels.insert(ROLE_LABEL.to_string(), role.as_str().to_string());
        labels.insert(NODE_INDEX_LABEL.to_string(), config.index.to_string());

        let spec = ContainerSpec {
            name: format!("{}-{}-{}", config.run_name, role, config.index),
            hostname: format!("{}{}", role.hostname_prefix(), config.index),
            image: config.image.clone(),
            network: config.network.name.clone(),
            args: config
                .config
                .iter()
                .map(|(k, v)| format!("--{k}={v}"))
                .collect(),
            env: vec![
                format!("PROVISIONING_ID={}", config.run_name),
                format!("NODE_INDEX={}", config.index),
            ],
            labels,
        };

        Ok(Self {
            role,
            index: config.index,
            engine: config.engine,
            spec,
            id: Mutex::new(None),
        })
    }

    async fn start(&self) -> ProvisionResult<()> {
        let mut slot = self.id.lock().await;
        if slot.is_some() {
            return Err(ProvisionError::AlreadyStarted {
                name: self.spec.name.clone(),
            });
        }
        let created = self.engine.create_container(&self.spec).await?;
        debug!(id = %short_id(&created), name = %self.spec.name, "container created");
        self.engine.start_container(&created).await?;
        emit_resource_started(self.role.as_str(), self.index, &created);
        *slot = Some(created);
        Ok(())
    }

    async fn stop(&self) -> ProvisionResult<()> {
        let slot = self.id.lock().await;
        let Some(id) = slot.as_deref() else {
            return Err(ProvisionError::NotStarted {
                name: self.spec.name.clone(),
            });
        };
        self.engine.stop_container(id).await?;
        Ok(())
    }
}

macro_rules! role_container {
    ($(#[$meta:meta])* $name:ident, $role:expr) => {
        $(#[$meta])*
        pub struct $name(ManagedContainer);

        impl $name {
            pub fn new(config: ResourceConfig) -> ProvisionResult<Self> {
                ManagedContainer::new($role, config).map(Self)
            }

            /// The create request this container sends to the engine.
            pub fn spec(&self) -> &ContainerSpec {
                &self.0.spec
            }
        }

        #[async_trait]
        impl Resource for $name {
            fn name(&self) -> &str {
                &self.0.spec.name
            }

            fn role(&self) -> Role {
                self.0.role
            }

            fn index(&self) -> usize {
                self.0.index
            }

            fn image(&self) -> &str {
                &self.0.spec.image
            }

            async fn id(&self) -> Option<String> {
                self.0.id.lock().await.clone()
            }

            async fn start(&self) -> ProvisionResult<()> {
                self.0.start().await
            }

            async fn stop(&self) -> ProvisionResult<()> {
                self.0.stop().await
            }
        }
    };
}

role_container!(
    /// Transaction manager container for one node.
    TxManagerContainer,
    Role::TxManager
);

role_container!(
    /// Quorum blockchain node container.
    NodeContainer,
    Role::Quorum
);

/// Build the container for `role`.
pub fn build_resource(role: Role, config: ResourceConfig) -> ProvisionResult<Arc<dyn Resource>> {
    let resource: Arc<dyn Resource> = match role {
        Role::TxManager => Arc::new(TxManagerContainer::new(config)?),
        Role::Quorum => Arc::new(NodeContainer::new(config)?),
    };
    Ok(resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryEngine;
    use crate::labels::{common_labels, PROVISIONING_ID_LABEL};

    async fn config_for(engine: Arc<MemoryEngine>, index: usize) -> ResourceConfig {
        let network = engine
            .create_network("devnet", &common_labels("devnet"))
            .await
            .unwrap();
        ResourceConfig {
            index,
            run_name: "devnet".to_string(),
            engine,
            network,
            image: "quorumengineering/tessera:0.7.3".to_string(),
            config: BTreeMap::from([
                ("port".to_string(), "9000".to_string()),
                ("debug".to_string(), "true".to_string()),
            ]),
            labels: common_labels("devnet"),
        }
    }

    #[tokio::test]
    async fn spec_carries_role_labels_and_sorted_args() {
        let engine = Arc::new(MemoryEngine::new());
        let tm = TxManagerContainer::new(config_for(engine, 2).await).unwrap();
        let spec = tm.spec();

        assert_eq!(spec.name, "devnet-tx-manager-2");
        assert_eq!(spec.hostname, "txmanager2");
        assert_eq!(spec.network, "devnet");
        assert_eq!(spec.args, vec!["--debug=true", "--port=9000"]);
        assert_eq!(spec.labels[PROVISIONING_ID_LABEL], "devnet");
        assert_eq!(spec.labels[ROLE_LABEL], "tx-manager");
        assert_eq!(spec.labels[NODE_INDEX_LABEL], "2");
        assert!(spec.env.contains(&"NODE_INDEX=2".to_string()));
    }

    #[tokio::test]
    async fn empty_image_is_rejected() {
        let engine = Arc::new(MemoryEngine::new());
        let mut config = config_for(engine, 0).await;
        config.image = String::new();
        let err = NodeContainer::new(config).err().unwrap();
        assert!(matches!(err, ProvisionError::InvalidResource { index: 0, .. }));
    }

    #[tokio::test]
    async fn bad_config_key_is_rejected() {
        let engine = Arc::new(MemoryEngine::new());
        let mut config = config_for(engine, 1).await;
        config.config.insert("bad key".to_string(), "x".to_string());
        let err = NodeContainer::new(config).err().unwrap();
        assert!(err.to_string().contains("\"bad key\""));
    }

    #[tokio::test]
    async fn start_then_stop() {
        let engine = Arc::new(MemoryEngine::new());
        let node = NodeContainer::new(config_for(Arc::clone(&engine), 0).await).unwrap();

        node.start().await.unwrap();
        let id = node.id().await.unwrap();
        assert!(engine.containers().iter().any(|c| c.id == id && c.running));

        node.stop().await.unwrap();
        assert!(!engine.container_by_name("devnet-quorum-0").unwrap().running);
    }

    #[tokio::test]
    async fn stop_before_start_is_an_error() {
        let engine = Arc::new(MemoryEngine::new());
        let node = NodeContainer::new(config_for(engine, 0).await).unwrap();
        let err = node.stop().await.unwrap_err();
        assert!(matches!(err, ProvisionError::NotStarted { .. }));
    }

    #[tokio::test]
    async fn second_start_is_an_error() {
        let engine = Arc::new(MemoryEngine::new());
        let tm = TxManagerContainer::new(config_for(engine, 0).await).unwrap();
        tm.start().await.unwrap();
        let err = tm.start().await.unwrap_err();
        assert!(matches!(err, ProvisionError::AlreadyStarted { .. }));
    }
}
