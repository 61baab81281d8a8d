//! Instance lifecycle management on a single host
//!
//! The [`ContainerEngine`] trait is the seam between the pipeline and the
//! container runtime: [`DockerEngine`] talks to the local Docker daemon via
//! bollard, [`MockEngine`] is an in-memory double for tests. The
//! [`Supervisor`] implements the stop-if-running, remove-if-present,
//! start-new sequence on top of either.

pub mod docker;
pub mod mock;
pub mod supervisor;

pub use docker::DockerEngine;
pub use mock::MockEngine;
pub use supervisor::Supervisor;

use crate::image::{ImageError, ImageRef};
use async_trait::async_trait;
use thiserror::Error;

/// Fatal errors from the deploy stage
#[derive(Debug, Error)]
pub enum DeployError {
    /// The image to start from is not in the local registry
    #[error("image '{0}' not found in the local registry")]
    ImageNotFound(String),

    /// The host port is held by a process outside this pipeline's instance
    #[error("host port {port} is already bound by another process")]
    PortInUse { port: u16 },

    /// The engine could not be reached at all
    #[error("container engine unavailable: {0}")]
    Unavailable(String),

    /// Any other engine-side failure
    #[error(transparent)]
    Engine(#[from] bollard::errors::Error),

    /// Failure injected or surfaced outside bollard (mock, preflight)
    #[error("{0}")]
    Other(String),
}

/// Everything needed to start one instance of an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSpec {
    /// Instance name, unique per host
    pub name: String,

    /// Image to run
    pub image: ImageRef,

    /// Host port bound to the container port
    pub host_port: u16,

    /// Port the service listens on inside the container
    pub container_port: u16,

    /// Per-run environment overrides (`KEY=value`), passed at start time
    /// rather than baked into the image
    pub env: Vec<String>,
}

/// Observed state of a named instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceStatus {
    /// Engine-assigned instance id
    pub id: String,

    /// Image reference the instance was created from
    pub image_ref: String,

    /// Engine-internal id of the backing image, when known
    pub image_id: Option<String>,

    /// Whether the instance is currently running
    pub running: bool,
}

/// One image in the local registry, as listed for cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    /// Engine-internal image id
    pub id: String,

    /// All `name:tag` references pointing at this image
    pub repo_tags: Vec<String>,
}

/// Container runtime operations the pipeline depends on
///
/// Instance lookups go to the engine every time; nothing here caches state
/// across pipeline runs.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Checks the engine is reachable.
    async fn ping(&self) -> Result<(), DeployError>;

    /// Builds an image from a gzipped tar context and registers it under
    /// `image`, replacing any prior image with the same tag.
    async fn build_image(&self, image: &ImageRef, context: Vec<u8>) -> Result<(), ImageError>;

    /// Whether `image` resolves in the local registry.
    async fn image_present(&self, image: &ImageRef) -> Result<bool, DeployError>;

    /// Lists local images whose repository matches `name`.
    async fn list_images(&self, name: &str) -> Result<Vec<ImageSummary>, DeployError>;

    /// Removes one image by reference or id.
    async fn remove_image(&self, reference: &str) -> Result<(), DeployError>;

    /// Looks up an instance by name, in any state.
    async fn find_instance(&self, name: &str) -> Result<Option<InstanceStatus>, DeployError>;

    /// Stops a named instance; an already-stopped or missing instance is
    /// success, not failure.
    async fn stop_instance(&self, name: &str) -> Result<(), DeployError>;

    /// Removes a named instance; a missing instance is success, not failure.
    async fn remove_instance(&self, name: &str) -> Result<(), DeployError>;

    /// Creates and starts a new detached instance, returning its id.
    async fn start_instance(&self, spec: &InstanceSpec) -> Result<String, DeployError>;

    /// Returns the last `tail` lines of an instance's output, for
    /// diagnostics on failure.
    async fn instance_logs(&self, name: &str, tail: usize) -> Result<String, DeployError>;
}
