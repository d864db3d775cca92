//! Error types for qnet-core

use thiserror::Error;

use crate::executor::BatchError;

/// Errors reported by a container engine backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Could not reach the engine at all
    #[error("engine connection failed: {0}")]
    Connection(String),

    /// The referenced object does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// The engine refused the request because of the object's current state
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other engine-side fault
    #[error("engine API error: {0}")]
    Api(String),
}

impl From<bollard::errors::Error> for EngineError {
    fn from(err: bollard::errors::Error) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => EngineError::NotFound {
                kind: "object".to_string(),
                id: message,
            },
            bollard::errors::Error::DockerResponseServerError {
                status_code: 409,
                message,
            } => EngineError::Conflict(message),
            other => EngineError::Api(other.to_string()),
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors produced while provisioning or tearing down a network.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The provisioning configuration could not be parsed
    #[error("invalid configuration: {0}")]
    Config(String),

    /// IO error while reading configuration or writing an export
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Export report serialization error
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The run's network could not be created
    #[error("network {name}: {source}")]
    NetworkCreate {
        name: String,
        #[source]
        source: EngineError,
    },

    /// A resource group was started before the network existed
    #[error("network for {name} has not been created")]
    NetworkMissing { name: String },

    /// An image was absent locally and could not be pulled
    #[error("pullImage: {image} - {reason}")]
    ImagePull { image: String, reason: String },

    /// A resource configuration was rejected before touching the engine
    #[error("invalid resource configuration for node {index}: {reason}")]
    InvalidResource { index: usize, reason: String },

    /// `start` called on a resource that is already running
    #[error("container {name} already started")]
    AlreadyStarted { name: String },

    /// `stop` called on a resource that was never started
    #[error("container {name} has not been started")]
    NotStarted { name: String },

    /// Engine call failed outside of a batch
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Some resources of a group failed to start
    #[error("{group}: {ready}/{total} containers are ready\n{}", .errors.join("\n"))]
    GroupStart {
        group: String,
        ready: usize,
        total: usize,
        errors: Vec<String>,
    },

    /// Label-filtered query failed during teardown
    #[error("destroy: {0}")]
    Lookup(EngineError),

    /// Some labelled resources could not be removed
    #[error("destroy: {0}")]
    Teardown(BatchError),

    /// Some started resources could not be stopped
    #[error("stop: {0}")]
    Stop(BatchError),
}

/// Result type for provisioning operations
pub type ProvisionResult<T> = std::result::Result<T, ProvisionError>;
