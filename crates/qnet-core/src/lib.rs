//! qnet-core: provisioning of containerised Quorum test networks
//!
//! A provisioning run creates a labelled network, then starts a transaction
//! manager and a Quorum node container per declared node. Every resource
//! carries the run's `provisioning-id` label, which is all teardown needs to
//! find it again from a fresh process.
//!
//! ## Key Components
//!
//! - [`Provisioner`]: one provisioning run (network, tx managers, nodes)
//! - [`destroy`]: stateless, label-driven teardown
//! - [`run_parallel`]: fan-out/fan-in executor with aggregate errors
//! - [`ContainerEngine`]: engine seam, backed by [`DockerEngine`] or
//!   [`fakes::MemoryEngine`]

pub mod config;
pub mod docker;
pub mod engine;
mod error;
pub mod executor;
pub mod fakes;
pub mod image;
pub mod labels;
pub mod obs;
pub mod orchestrator;
pub mod report;
pub mod resource;
pub mod telemetry;

pub use config::{ConsensusConfig, ImageConfig, NodeDecl, ProvisionConfig};
pub use docker::DockerEngine;
pub use engine::{ContainerEngine, ContainerSpec, ContainerSummary, NetworkHandle, NetworkSummary};
pub use error::{EngineError, EngineResult, ProvisionError, ProvisionResult};
pub use executor::{run_parallel, run_parallel_collect, BatchError, BatchOutcome, BatchTally};
pub use image::{ensure_image, ImageStatus};
pub use labels::{common_labels, LabelFilter, Labels, PROVISIONING_ID_LABEL};
pub use obs::ProvisionSpan;
pub use orchestrator::{destroy, Provisioner};
pub use report::{ContainerEntry, ExportSink, NetworkReport};
pub use resource::{NodeContainer, Resource, ResourceConfig, Role, TxManagerContainer};
pub use telemetry::{init_tracing, level_from_verbosity};

/// qnet-core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
