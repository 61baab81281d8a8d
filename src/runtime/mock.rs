//! In-memory engine double for tests
//!
//! Keeps a registry of images and instances behind a mutex and records every
//! mutating operation in an ordered journal so tests can assert sequencing
//! (stop before remove before start). Failure injection covers the paths
//! the real daemon can take: missing images, bound ports, rejected builds.

use super::{ContainerEngine, DeployError, ImageSummary, InstanceSpec, InstanceStatus};
use crate::image::{ImageError, ImageRef};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct MockInstance {
    pub id: String,
    pub image_ref: String,
    pub image_id: String,
    pub host_port: u16,
    pub running: bool,
}

#[derive(Default)]
struct MockState {
    /// reference -> image id
    images: HashMap<String, String>,
    instances: HashMap<String, MockInstance>,
    /// Ports held by processes outside this pipeline
    external_ports: HashSet<u16>,
    build_error: Option<String>,
    remove_image_error: Option<String>,
    logs: HashMap<String, String>,
    events: Vec<String>,
    next_id: u64,
}

impl MockState {
    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// [`ContainerEngine`] double backed by in-memory state
#[derive(Default)]
pub struct MockEngine {
    state: Mutex<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an image as already present in the local registry.
    pub fn add_image(&self, reference: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state.fresh_id("img");
        state.images.insert(reference.to_string(), id);
    }

    /// Seeds a running instance, as left behind by a prior pipeline run.
    pub fn add_running_instance(&self, name: &str, image_ref: &str, host_port: u16) {
        let mut state = self.state.lock().unwrap();
        let image_id = state
            .images
            .get(image_ref)
            .cloned()
            .unwrap_or_else(|| "img-untracked".to_string());
        let id = state.fresh_id("inst");
        state.instances.insert(
            name.to_string(),
            MockInstance {
                id,
                image_ref: image_ref.to_string(),
                image_id,
                host_port,
                running: true,
            },
        );
    }

    /// Marks a host port as bound by an unrelated process.
    pub fn bind_external_port(&self, port: u16) {
        self.state.lock().unwrap().external_ports.insert(port);
    }

    /// Makes every subsequent image build fail with `message`.
    pub fn fail_builds(&self, message: &str) {
        self.state.lock().unwrap().build_error = Some(message.to_string());
    }

    /// Makes every subsequent image removal fail with `message`.
    pub fn fail_image_removals(&self, message: &str) {
        self.state.lock().unwrap().remove_image_error = Some(message.to_string());
    }

    /// Sets the log text returned for a named instance.
    pub fn set_logs(&self, name: &str, text: &str) {
        self.state
            .lock()
            .unwrap()
            .logs
            .insert(name.to_string(), text.to_string());
    }

    /// Ordered journal of mutating operations.
    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn instance(&self, name: &str) -> Option<MockInstance> {
        self.state.lock().unwrap().instances.get(name).cloned()
    }

    pub fn running_instance_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .instances
            .values()
            .filter(|i| i.running)
            .count()
    }

    pub fn image_references(&self) -> Vec<String> {
        let mut refs: Vec<String> = self.state.lock().unwrap().images.keys().cloned().collect();
        refs.sort();
        refs
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn ping(&self) -> Result<(), DeployError> {
        Ok(())
    }

    async fn build_image(&self, image: &ImageRef, context: Vec<u8>) -> Result<(), ImageError> {
        let mut state = self.state.lock().unwrap();

        if let Some(message) = &state.build_error {
            return Err(ImageError::BuildRejected {
                image: image.reference(),
                message: message.clone(),
            });
        }
        if context.is_empty() {
            return Err(ImageError::BuildRejected {
                image: image.reference(),
                message: "empty build context".to_string(),
            });
        }

        let id = state.fresh_id("img");
        state.events.push(format!("build {}", image.reference()));
        state.images.insert(image.reference(), id);
        Ok(())
    }

    async fn image_present(&self, image: &ImageRef) -> Result<bool, DeployError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .images
            .contains_key(&image.reference()))
    }

    async fn list_images(&self, name: &str) -> Result<Vec<ImageSummary>, DeployError> {
        let state = self.state.lock().unwrap();
        let prefix = format!("{}:", name);

        let mut by_id: HashMap<String, Vec<String>> = HashMap::new();
        for (reference, id) in &state.images {
            if reference.starts_with(&prefix) {
                by_id.entry(id.clone()).or_default().push(reference.clone());
            }
        }

        let mut summaries: Vec<ImageSummary> = by_id
            .into_iter()
            .map(|(id, mut repo_tags)| {
                repo_tags.sort();
                ImageSummary { id, repo_tags }
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    async fn remove_image(&self, reference: &str) -> Result<(), DeployError> {
        let mut state = self.state.lock().unwrap();

        if let Some(message) = &state.remove_image_error {
            return Err(DeployError::Other(message.clone()));
        }

        if state.images.remove(reference).is_none() {
            // Also accept removal by image id
            let matched: Vec<String> = state
                .images
                .iter()
                .filter(|(_, id)| id.as_str() == reference)
                .map(|(reference, _)| reference.clone())
                .collect();
            if matched.is_empty() {
                return Err(DeployError::Other(format!("no such image: {}", reference)));
            }
            for reference in matched {
                state.images.remove(&reference);
            }
        }

        state.events.push(format!("rmi {}", reference));
        Ok(())
    }

    async fn find_instance(&self, name: &str) -> Result<Option<InstanceStatus>, DeployError> {
        Ok(self.state.lock().unwrap().instances.get(name).map(|i| {
            InstanceStatus {
                id: i.id.clone(),
                image_ref: i.image_ref.clone(),
                image_id: Some(i.image_id.clone()),
                running: i.running,
            }
        }))
    }

    async fn stop_instance(&self, name: &str) -> Result<(), DeployError> {
        let mut state = self.state.lock().unwrap();
        if let Some(instance) = state.instances.get_mut(name) {
            instance.running = false;
        }
        // Stopping a missing or stopped instance is success by contract
        state.events.push(format!("stop {}", name));
        Ok(())
    }

    async fn remove_instance(&self, name: &str) -> Result<(), DeployError> {
        let mut state = self.state.lock().unwrap();
        state.instances.remove(name);
        state.events.push(format!("remove {}", name));
        Ok(())
    }

    async fn start_instance(&self, spec: &InstanceSpec) -> Result<String, DeployError> {
        let mut state = self.state.lock().unwrap();

        let image_id = match state.images.get(&spec.image.reference()) {
            Some(id) => id.clone(),
            None => return Err(DeployError::ImageNotFound(spec.image.reference())),
        };

        if state.instances.contains_key(&spec.name) {
            return Err(DeployError::Other(format!(
                "instance name '{}' already in use",
                spec.name
            )));
        }

        let port_taken = state.external_ports.contains(&spec.host_port)
            || state
                .instances
                .values()
                .any(|i| i.running && i.host_port == spec.host_port);
        if port_taken {
            return Err(DeployError::PortInUse {
                port: spec.host_port,
            });
        }

        let id = state.fresh_id("inst");
        state.events.push(format!("start {}", spec.name));
        state.instances.insert(
            spec.name.clone(),
            MockInstance {
                id: id.clone(),
                image_ref: spec.image.reference(),
                image_id,
                host_port: spec.host_port,
                running: true,
            },
        );
        Ok(id)
    }

    async fn instance_logs(&self, name: &str, _tail: usize) -> Result<String, DeployError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .logs
            .get(name)
            .cloned()
            .unwrap_or_default())
    }
}
