//! Ensure-present image provisioning.

use tracing::{debug, warn};

use crate::engine::ContainerEngine;
use crate::error::{ProvisionError, ProvisionResult};

/// What [`ensure_image`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    /// A local image already matched the reference.
    Present,
    /// The image was pulled.
    Pulled,
}

/// Pull `reference` unless a local image already matches it.
///
/// A failed lookup is treated like a miss. This is not a lock: two callers
/// racing on the same reference may both pull, which the engine tolerates.
pub async fn ensure_image(
    engine: &dyn ContainerEngine,
    reference: &str,
) -> ProvisionResult<ImageStatus> {
    match engine.list_images(reference).await {
        Ok(found) if !found.is_empty() => {
            debug!(image = %reference, "image present");
            return Ok(ImageStatus::Present);
        }
        Ok(_) => {}
        Err(e) => warn!(image = %reference, error = %e, "image lookup failed, pulling"),
    }

    debug!(image = %reference, "pulling image");
    engine
        .pull_image(reference)
        .await
        .map_err(|e| ProvisionError::ImagePull {
            image: reference.to_string(),
            reason: e.to_string(),
        })?;
    Ok(ImageStatus::Pulled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryEngine;

    #[tokio::test]
    async fn present_image_is_not_pulled() {
        let engine = MemoryEngine::new().with_image("quorum:2.2.1");
        let status = ensure_image(&engine, "quorum:2.2.1").await.unwrap();
        assert_eq!(status, ImageStatus::Present);
        assert!(engine.pulls().is_empty());
    }

    #[tokio::test]
    async fn missing_image_is_pulled_once() {
        let engine = MemoryEngine::new();
        assert_eq!(
            ensure_image(&engine, "tessera").await.unwrap(),
            ImageStatus::Pulled
        );
        assert_eq!(
            ensure_image(&engine, "tessera:latest").await.unwrap(),
            ImageStatus::Present
        );
        assert_eq!(engine.pulls(), vec!["tessera".to_string()]);
    }

    #[tokio::test]
    async fn lookup_error_falls_back_to_pull() {
        let engine = MemoryEngine::new().with_image("quorum:2.2.1");
        engine.fail_image_lookup();
        let status = ensure_image(&engine, "quorum:2.2.1").await.unwrap();
        assert_eq!(status, ImageStatus::Pulled);
        assert_eq!(engine.pulls().len(), 1);
    }

    #[tokio::test]
    async fn pull_failure_names_the_image() {
        let engine = MemoryEngine::new();
        engine.fail_pull("ghost:1.0");
        let err = ensure_image(&engine, "ghost:1.0").await.unwrap_err();
        assert!(err.to_string().starts_with("pullImage: ghost:1.0 - "));
    }
}
