//! The stop-if-running, remove-if-present, start-new sequence
//!
//! Holds the single invariant the deploy stage exists for: at most one
//! instance per name on the host, and a redeploy over any prior state,
//! running, stopped or absent, behaves the same way.

use super::{ContainerEngine, DeployError, InstanceSpec};
use tracing::{debug, info};

pub struct Supervisor<'a> {
    engine: &'a dyn ContainerEngine,
}

impl<'a> Supervisor<'a> {
    pub fn new(engine: &'a dyn ContainerEngine) -> Self {
        Self { engine }
    }

    /// Replaces whatever holds `spec.name` with a fresh instance of
    /// `spec.image`, returning the new instance id.
    ///
    /// The prior instance is looked up against the engine at call time,
    /// never from cached state. If the start step fails, the prior instance
    /// stays stopped; there is no automatic restart or rollback.
    pub async fn redeploy(&self, spec: &InstanceSpec) -> Result<String, DeployError> {
        match self.engine.find_instance(&spec.name).await? {
            Some(existing) => {
                info!(
                    instance = %spec.name,
                    running = existing.running,
                    image = %existing.image_ref,
                    "Replacing existing instance"
                );
                self.engine.stop_instance(&spec.name).await?;
                self.engine.remove_instance(&spec.name).await?;
            }
            None => {
                debug!(instance = %spec.name, "No prior instance to replace");
            }
        }

        if !self.engine.image_present(&spec.image).await? {
            return Err(DeployError::ImageNotFound(spec.image.reference()));
        }

        let id = self.engine.start_instance(spec).await?;
        info!(
            instance = %spec.name,
            id = %id,
            image = %spec.image,
            host_port = spec.host_port,
            container_port = spec.container_port,
            "Instance started"
        );
        Ok(id)
    }

    /// Stops and removes the named instance, tolerating absence.
    pub async fn teardown(&self, name: &str) -> Result<(), DeployError> {
        self.engine.stop_instance(name).await?;
        self.engine.remove_instance(name).await?;
        info!(instance = name, "Instance torn down");
        Ok(())
    }
}
