//! Running the build command and verifying its output
//!
//! The builder owns the first pipeline stage: run the configured build
//! command in the source tree, then prove that exactly one non-empty
//! artifact exists before anything downstream is allowed to run. A failed
//! build must never leave output a later stage could mistake for a valid
//! artifact, so verification happens here rather than in the image stage.

use super::select::{select_artifact, SelectError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// How many trailing lines of build output to keep for diagnostics
const OUTPUT_TAIL_LINES: usize = 25;

/// Errors from the build stage, all fatal to the pipeline
#[derive(Debug, Error)]
pub enum BuildError {
    /// The build command could not be spawned at all
    #[error("failed to spawn build command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The build command exited non-zero
    #[error("build command '{command}' failed ({status}):\n{output_tail}")]
    CommandFailed {
        command: String,
        status: String,
        output_tail: String,
    },

    /// No usable artifact after a successful build
    #[error(transparent)]
    Selection(#[from] SelectError),

    /// The artifact exists but is empty
    #[error("artifact {} is empty", .path.display())]
    EmptyArtifact { path: PathBuf },

    /// The artifact could not be read back for verification
    #[error("failed to read artifact {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An immutable, verified build output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Absolute or workdir-relative path of the build output
    pub path: PathBuf,

    /// Size in bytes, guaranteed non-zero
    pub size_bytes: u64,

    /// Hex-encoded sha256 of the file contents
    pub digest: String,

    /// When verification completed
    pub built_at: DateTime<Utc>,
}

impl Artifact {
    /// The artifact's file name, for embedding into an image.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string())
    }
}

/// Runs the build command and verifies the resulting artifact
pub struct ArtifactBuilder {
    workdir: PathBuf,
    command: Vec<String>,
    artifact_glob: String,
}

impl ArtifactBuilder {
    pub fn new(workdir: PathBuf, command: Vec<String>, artifact_glob: String) -> Self {
        Self {
            workdir,
            command,
            artifact_glob,
        }
    }

    /// Runs the configured build command, then resolves and verifies the
    /// artifact. Any failure aborts before containerization.
    pub async fn build(&self) -> Result<Artifact, BuildError> {
        let command_display = self.command.join(" ");
        let program = self.command.first().ok_or_else(|| BuildError::Spawn {
            command: command_display.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty build command"),
        })?;
        info!(command = %command_display, workdir = %self.workdir.display(), "Running build command");

        let output = Command::new(program)
            .args(&self.command[1..])
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| BuildError::Spawn {
                command: command_display.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(BuildError::CommandFailed {
                command: command_display,
                status: output.status.to_string(),
                output_tail: tail_lines(&combined, OUTPUT_TAIL_LINES),
            });
        }

        debug!("Build command succeeded, verifying artifact");
        self.verify().await
    }

    /// Resolves the artifact glob and verifies existence, non-zero size and
    /// digest without running the build. Used both after a build and when a
    /// pre-built artifact is handed straight to the image stage.
    pub async fn verify(&self) -> Result<Artifact, BuildError> {
        let path = select_artifact(&self.workdir, &self.artifact_glob)?;

        let contents = tokio::fs::read(&path)
            .await
            .map_err(|source| BuildError::Unreadable {
                path: path.clone(),
                source,
            })?;

        if contents.is_empty() {
            return Err(BuildError::EmptyArtifact { path });
        }

        let digest = hex::encode(Sha256::digest(&contents));
        let artifact = Artifact {
            size_bytes: contents.len() as u64,
            path,
            digest,
            built_at: Utc::now(),
        };

        info!(
            artifact = %artifact.path.display(),
            size_bytes = artifact.size_bytes,
            digest = %artifact.digest,
            "Artifact verified"
        );

        Ok(artifact)
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
