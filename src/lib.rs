//! drydock - single-host Docker redeploy pipeline
//!
//! This library implements a small deployment pipeline for a containerized
//! HTTP service: build an artifact, wrap it into a tagged image, replace
//! the named running instance with one started from that image, verify the
//! deployment with an HTTP probe, and reclaim superseded storage.
//!
//! # Core Concepts
//!
//! - **Artifact**: the immutable, verified output of the build command
//! - **Image**: an immutable `name:tag` bundle of base runtime, one
//!   artifact and a fixed launch command
//! - **Instance**: a named running (or stopped) execution of an image,
//!   bound to a host port; at most one per name on a host
//! - **Pipeline run**: one build → image → deploy → verify → cleanup
//!   sequence, strictly sequential, each stage gating the next
//!
//! # Example Usage
//!
//! ```ignore
//! use drydock::{DrydockConfig, PipelineOrchestrator};
//! use drydock::runtime::DockerEngine;
//!
//! async fn redeploy() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DrydockConfig::load(None)?;
//!     config.validate()?;
//!
//!     let engine = DockerEngine::connect().await?;
//!     let report = PipelineOrchestrator::new(&config, &engine)
//!         .execute()
//!         .await;
//!
//!     println!("run {} finished: {}", report.run_id, report.state);
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`artifact`]: build command execution and artifact verification
//! - [`image`]: Dockerfile rendering, build context packing, image tags
//! - [`runtime`]: the container engine seam and the instance supervisor
//! - [`verify`]: post-deploy health probing
//! - [`cleanup`]: best-effort storage reclaim
//! - [`pipeline`]: orchestration, run state, deploy lock, run records

// Public modules
pub mod artifact;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod image;
pub mod pipeline;
pub mod progress;
pub mod runtime;
pub mod util;
pub mod verify;

// Re-export key types for convenient access
pub use artifact::{Artifact, ArtifactBuilder, BuildError};
pub use cleanup::{CleanupAgent, CleanupReport};
pub use config::{ConfigError, DrydockConfig};
pub use image::{ImageBuilder, ImageError, ImageRef, ImageSpec};
pub use pipeline::{
    DeployLock, LockError, PipelineOrchestrator, RecordStore, RunReport, RunState, Stage,
};
pub use runtime::{ContainerEngine, DeployError, DockerEngine, InstanceSpec, Supervisor};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};
pub use verify::{HealthVerifier, Product, VerifyOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
