//! Docker implementation of the container engine
//!
//! Thin mapping from the [`ContainerEngine`] operations onto the local
//! Docker daemon via bollard. Tolerated status codes (304 on stop, 404 on
//! stop/remove) encode the supervisor's idempotency guarantee: a re-run
//! from a clean or partially-failed prior state succeeds without manual
//! intervention.

use super::{ContainerEngine, DeployError, ImageSummary, InstanceSpec, InstanceStatus};
use crate::image::{ImageError, ImageRef};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::image::{BuildImageOptions, ListImagesOptions, RemoveImageOptions};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

const DOCKER_SOCKET_PATH: &str = "/var/run/docker.sock";

/// Seconds the engine waits for a graceful stop before killing
const STOP_TIMEOUT_SECS: i64 = 10;

/// [`ContainerEngine`] backed by the local Docker daemon
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connects to the local daemon and verifies it responds.
    pub async fn connect() -> Result<Self, DeployError> {
        if !Path::new(DOCKER_SOCKET_PATH).exists() {
            return Err(DeployError::Unavailable(format!(
                "docker socket not found at {}",
                DOCKER_SOCKET_PATH
            )));
        }

        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DeployError::Unavailable(e.to_string()))?;

        match docker.version().await {
            Ok(v) => {
                debug!(
                    api_version = v.api_version.as_deref().unwrap_or("unknown"),
                    "Connected to Docker daemon"
                );
                Ok(Self { docker })
            }
            Err(e) => Err(DeployError::Unavailable(e.to_string())),
        }
    }

    /// Whether a usable Docker daemon is reachable on this host.
    pub async fn available() -> bool {
        Self::connect().await.is_ok()
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn ping(&self) -> Result<(), DeployError> {
        self.docker
            .version()
            .await
            .map(|_| ())
            .map_err(|e| DeployError::Unavailable(e.to_string()))
    }

    async fn build_image(&self, image: &ImageRef, context: Vec<u8>) -> Result<(), ImageError> {
        let options = BuildImageOptions::<String> {
            dockerfile: "Dockerfile".to_string(),
            t: image.reference(),
            rm: true,
            ..Default::default()
        };

        let mut stream =
            self.docker
                .build_image(options, None, Some(bytes::Bytes::from(context)));

        while let Some(item) = stream.next().await {
            let info = item.map_err(|e| ImageError::BuildRejected {
                image: image.reference(),
                message: e.to_string(),
            })?;

            if let Some(message) = info.error {
                return Err(ImageError::BuildRejected {
                    image: image.reference(),
                    message,
                });
            }
            if let Some(line) = info.stream {
                let line = line.trim_end();
                if !line.is_empty() {
                    debug!(image = %image, "{}", line);
                }
            }
        }

        // The registry must actually resolve the tag before this stage passes
        self.docker
            .inspect_image(&image.reference())
            .await
            .map_err(|e| ImageError::BuildRejected {
                image: image.reference(),
                message: format!("image not resolvable after build: {}", e),
            })?;

        Ok(())
    }

    async fn image_present(&self, image: &ImageRef) -> Result<bool, DeployError> {
        match self.docker.inspect_image(&image.reference()).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_images(&self, name: &str) -> Result<Vec<ImageSummary>, DeployError> {
        let mut filters = HashMap::new();
        filters.insert("reference".to_string(), vec![name.to_string()]);

        let images = self
            .docker
            .list_images(Some(ListImagesOptions::<String> {
                all: false,
                filters,
                ..Default::default()
            }))
            .await?;

        Ok(images
            .into_iter()
            .map(|summary| ImageSummary {
                id: summary.id,
                repo_tags: summary.repo_tags,
            })
            .collect())
    }

    async fn remove_image(&self, reference: &str) -> Result<(), DeployError> {
        self.docker
            .remove_image(
                reference,
                Some(RemoveImageOptions {
                    force: false,
                    ..Default::default()
                }),
                None,
            )
            .await?;
        Ok(())
    }

    async fn find_instance(&self, name: &str) -> Result<Option<InstanceStatus>, DeployError> {
        match self.docker.inspect_container(name, None).await {
            Ok(inspect) => {
                let running = inspect
                    .state
                    .as_ref()
                    .and_then(|s| s.running)
                    .unwrap_or(false);
                let image_ref = inspect
                    .config
                    .as_ref()
                    .and_then(|c| c.image.clone())
                    .unwrap_or_default();

                Ok(Some(InstanceStatus {
                    id: inspect.id.unwrap_or_else(|| name.to_string()),
                    image_ref,
                    image_id: inspect.image,
                    running,
                }))
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn stop_instance(&self, name: &str) -> Result<(), DeployError> {
        match self
            .docker
            .stop_container(name, Some(StopContainerOptions { t: STOP_TIMEOUT_SECS }))
            .await
        {
            Ok(()) => Ok(()),
            // 304: already stopped; 404: never existed. Both fine.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304 | 404,
                ..
            }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_instance(&self, name: &str) -> Result<(), DeployError> {
        match self
            .docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: false,
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn start_instance(&self, spec: &InstanceSpec) -> Result<String, DeployError> {
        let container_port_key = format!("{}/tcp", spec.container_port);

        let config = Config {
            image: Some(spec.image.reference()),
            env: (!spec.env.is_empty()).then(|| spec.env.clone()),
            exposed_ports: Some(
                [(container_port_key.clone(), HashMap::new())]
                    .into_iter()
                    .collect(),
            ),
            host_config: Some(bollard::service::HostConfig {
                port_bindings: Some(
                    [(
                        container_port_key,
                        Some(vec![bollard::service::PortBinding {
                            host_ip: None,
                            host_port: Some(spec.host_port.to_string()),
                        }]),
                    )]
                    .into_iter()
                    .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: spec.name.clone(),
                    platform: None,
                }),
                config,
            )
            .await?;

        if let Err(e) = self
            .docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
        {
            // Don't leave the never-started container holding the name
            let _ = self
                .docker
                .remove_container(
                    &created.id,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await;

            return Err(map_start_error(e, spec.host_port));
        }

        Ok(created.id)
    }

    async fn instance_logs(&self, name: &str, tail: usize) -> Result<String, DeployError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        let mut log_stream = self.docker.logs(name, Some(options));
        let mut output = String::new();

        while let Some(log) = log_stream.next().await {
            match log {
                Ok(line) => output.push_str(&line.to_string()),
                Err(e) => {
                    warn!(instance = name, error = %e, "Failed to read instance logs");
                    break;
                }
            }
        }

        Ok(output)
    }
}

fn map_start_error(error: bollard::errors::Error, host_port: u16) -> DeployError {
    if let bollard::errors::Error::DockerResponseServerError { ref message, .. } = error {
        if message.contains("port is already allocated") || message.contains("address already in use")
        {
            return DeployError::PortInUse { port: host_port };
        }
    }
    error.into()
}
