//! Assembling the deployment unit
//!
//! An image is the immutable bundle of base runtime, exactly one artifact,
//! a launch command and an exposed port. The launch command is fixed here,
//! at build time; per-run overrides travel as environment variables at
//! instance start. The exposed port is metadata only, binding happens in
//! the deploy stage.

use super::reference::ImageRef;
use crate::artifact::{Artifact, SelectError};
use crate::image::ImageRefError;
use crate::runtime::ContainerEngine;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use thiserror::Error;
use tracing::{debug, info};

/// Directory the artifact lands in inside the image
const IMAGE_APP_DIR: &str = "/app";

/// Placeholder in the entrypoint that expands to the in-image artifact path
const ARTIFACT_PLACEHOLDER: &str = "{artifact}";

/// Fatal errors from the image stage
#[derive(Debug, Error)]
pub enum ImageError {
    /// Artifact glob resolved to zero or several files
    #[error(transparent)]
    Selection(#[from] SelectError),

    /// The image reference itself was malformed
    #[error(transparent)]
    InvalidReference(#[from] ImageRefError),

    /// Assembling the build context failed
    #[error("failed to assemble build context: {0}")]
    Context(#[from] std::io::Error),

    /// The engine refused or aborted the build
    #[error("engine rejected build of {image}: {message}")]
    BuildRejected { image: String, message: String },
}

/// Everything fixed at image-build time
#[derive(Debug, Clone)]
pub struct ImageSpec {
    /// Tag the image registers under
    pub reference: ImageRef,

    /// Base runtime layer
    pub base_image: String,

    /// Port the service listens on, declared as metadata
    pub expose_port: u16,

    /// Launch command; `{artifact}` expands to the artifact path inside
    /// the image
    pub entrypoint: Vec<String>,
}

impl ImageSpec {
    /// Renders the Dockerfile for this spec around one artifact file.
    pub fn render_dockerfile(&self, artifact_file: &str) -> String {
        let artifact_path = format!("{}/{}", IMAGE_APP_DIR, artifact_file);
        let entrypoint: Vec<String> = self
            .entrypoint
            .iter()
            .map(|part| part.replace(ARTIFACT_PLACEHOLDER, &artifact_path))
            .collect();
        // ENTRYPOINT in exec form so the service is pid 1 and signals reach it
        let entrypoint_json =
            serde_json::to_string(&entrypoint).unwrap_or_else(|_| "[]".to_string());

        format!(
            "FROM {base}\n\
             WORKDIR {dir}\n\
             COPY {file} {path}\n\
             EXPOSE {port}\n\
             ENTRYPOINT {entrypoint}\n",
            base = self.base_image,
            dir = IMAGE_APP_DIR,
            file = artifact_file,
            path = artifact_path,
            port = self.expose_port,
            entrypoint = entrypoint_json,
        )
    }
}

/// Builds the tagged image from one verified artifact
pub struct ImageBuilder<'a> {
    engine: &'a dyn ContainerEngine,
}

impl<'a> ImageBuilder<'a> {
    pub fn new(engine: &'a dyn ContainerEngine) -> Self {
        Self { engine }
    }

    /// Packs `{Dockerfile, artifact}` into a gzipped tar context and hands
    /// it to the engine, registering the image under `spec.reference` and
    /// replacing any prior image with the same tag.
    pub async fn build(&self, spec: &ImageSpec, artifact: &Artifact) -> Result<(), ImageError> {
        let dockerfile = spec.render_dockerfile(&artifact.file_name());
        debug!(image = %spec.reference, "Rendered Dockerfile:\n{}", dockerfile);

        let context = build_context(&dockerfile, artifact)?;
        info!(
            image = %spec.reference,
            context_bytes = context.len(),
            artifact = %artifact.path.display(),
            "Building image"
        );

        self.engine.build_image(&spec.reference, context).await?;

        info!(image = %spec.reference, "Image registered");
        Ok(())
    }
}

/// Packs the Dockerfile and the artifact into a gzipped tar archive.
pub fn build_context(dockerfile: &str, artifact: &Artifact) -> Result<Vec<u8>, std::io::Error> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_size(dockerfile.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, "Dockerfile", dockerfile.as_bytes())?;

    let mut file = File::open(&artifact.path)?;
    builder.append_file(artifact.file_name(), &mut file)?;

    let encoder = builder.into_inner()?;
    encoder.finish()
}
