//! Structured observability hooks for provisioning lifecycle events.
//!
//! This module provides:
//! - A run-scoped tracing span via the `ProvisionSpan` RAII guard
//! - Emission functions for network, batch and container events
//!
//! Batch events are emitted at `debug!`, resource events at `info!`.
//! Filter with `RUST_LOG`, e.g. `RUST_LOG=qnet_core=debug`.

use tracing::{debug, info};

use crate::engine::short_id;

/// RAII guard that enters a run-scoped span for the duration of an operation.
///
/// # Example
///
/// ```ignore
/// let _span = ProvisionSpan::enter("devnet", "up");
/// // every event below carries provisioning_id = "devnet"
/// ```
pub struct ProvisionSpan {
    _span: tracing::span::EnteredSpan,
}

impl ProvisionSpan {
    /// Create and enter a span tagged with the provisioning id and operation.
    pub fn enter(provisioning_id: &str, operation: &str) -> Self {
        let span = tracing::info_span!(
            "qnet.provision",
            provisioning_id = %provisioning_id,
            operation = %operation
        );
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a parallel batch was dispatched.
pub fn emit_batch_started(title: &str, total: usize) {
    debug!(event = "batch.started", title = %title, total = total);
}

/// Emit event: every task of a batch reported.
pub fn emit_batch_finished(title: &str, succeeded: usize, total: usize) {
    debug!(
        event = "batch.finished",
        title = %title,
        succeeded = succeeded,
        total = total,
    );
}

/// Emit event: the run's network exists.
pub fn emit_network_created(name: &str, id: &str) {
    info!(event = "network.created", name = %name, id = %short_id(id));
}

/// Emit event: a container was created and started.
pub fn emit_resource_started(role: &str, index: usize, id: &str) {
    info!(event = "resource.started", role = %role, index = index, id = %short_id(id));
}

/// Emit event: a labelled resource was removed during teardown.
pub fn emit_resource_removed(kind: &str, id: &str, name: &str) {
    info!(event = "resource.removed", kind = %kind, id = %short_id(id), name = %name);
}
