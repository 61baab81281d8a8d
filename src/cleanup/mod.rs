//! Best-effort storage reclaim after a run
//!
//! Removes superseded images and build outputs while never touching the
//! image backing the currently running instance, nor the reference the
//! pipeline is configured to deploy. Every failure here is a warning; the
//! cleanup stage never changes the pipeline outcome.

use crate::artifact::matching_files;
use crate::image::ImageRef;
use crate::runtime::ContainerEngine;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What the cleanup pass reclaimed and what it could not
#[derive(Debug, Default, Clone)]
pub struct CleanupReport {
    pub removed_images: Vec<String>,
    pub removed_artifacts: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Superseded build outputs to prune alongside images
#[derive(Debug, Clone)]
pub struct ArtifactPrune {
    /// Source tree root the pattern is resolved against
    pub root: PathBuf,

    /// Glob matching build outputs
    pub pattern: String,

    /// The artifact backing the current deployment; never removed
    pub keep: Option<PathBuf>,
}

/// Reclaims storage from images and artifacts no longer referenced
pub struct CleanupAgent<'a> {
    engine: &'a dyn ContainerEngine,
}

impl<'a> CleanupAgent<'a> {
    pub fn new(engine: &'a dyn ContainerEngine) -> Self {
        Self { engine }
    }

    /// Runs one reclaim pass.
    ///
    /// `image_name` scopes the sweep to this pipeline's repository,
    /// `keep_reference` is the tag the pipeline deploys, `instance` names
    /// the instance whose backing image is always protected.
    pub async fn run(
        &self,
        image_name: &str,
        keep_reference: &ImageRef,
        instance: &str,
        artifacts: Option<&ArtifactPrune>,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();

        // Fresh lookup; the backing image is whatever runs right now
        let backing = match self.engine.find_instance(instance).await {
            Ok(status) => status.filter(|s| s.running),
            Err(e) => {
                report.warn(format!("cleanup: instance lookup failed: {}", e));
                None
            }
        };

        let images = match self.engine.list_images(image_name).await {
            Ok(images) => images,
            Err(e) => {
                report.warn(format!("cleanup: image listing failed: {}", e));
                Vec::new()
            }
        };

        for summary in images {
            let backs_running = backing.as_ref().is_some_and(|b| {
                b.image_id.as_deref() == Some(summary.id.as_str())
                    || summary.repo_tags.iter().any(|t| t == &b.image_ref)
            });
            let is_current_target = summary
                .repo_tags
                .iter()
                .any(|t| t == &keep_reference.reference());

            if backs_running || is_current_target {
                debug!(image = %summary.id, "Protected from cleanup");
                continue;
            }

            let targets: Vec<String> = if summary.repo_tags.is_empty() {
                vec![summary.id.clone()]
            } else {
                summary.repo_tags.clone()
            };
            for target in targets {
                match self.engine.remove_image(&target).await {
                    Ok(()) => {
                        info!(image = %target, "Removed superseded image");
                        report.removed_images.push(target);
                    }
                    Err(e) => report.warn(format!("cleanup: failed to remove {}: {}", target, e)),
                }
            }
        }

        if let Some(prune) = artifacts {
            self.prune_artifacts(prune, &mut report);
        }

        info!(
            removed_images = report.removed_images.len(),
            removed_artifacts = report.removed_artifacts.len(),
            warnings = report.warnings.len(),
            "Cleanup pass finished"
        );
        report
    }

    fn prune_artifacts(&self, prune: &ArtifactPrune, report: &mut CleanupReport) {
        let matches = match matching_files(&prune.root, &prune.pattern) {
            Ok(matches) => matches,
            Err(e) => {
                report.warn(format!("cleanup: artifact listing failed: {}", e));
                return;
            }
        };

        for path in matches {
            if prune.keep.as_deref() == Some(path.as_path()) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!(artifact = %path.display(), "Removed superseded artifact");
                    report.removed_artifacts.push(path);
                }
                Err(e) => report.warn(format!(
                    "cleanup: failed to remove {}: {}",
                    path.display(),
                    e
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockEngine;
    use tempfile::TempDir;

    fn keep() -> ImageRef {
        "svc:1.0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_never_removes_backing_image() {
        let engine = MockEngine::new();
        engine.add_image("svc:0.9");
        engine.add_image("svc:1.0");
        engine.add_running_instance("svc", "svc:1.0", 9090);

        let report = CleanupAgent::new(&engine)
            .run("svc", &keep(), "svc", None)
            .await;

        assert_eq!(report.removed_images, vec!["svc:0.9"]);
        assert_eq!(engine.image_references(), vec!["svc:1.0"]);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_keeps_configured_target_without_running_instance() {
        let engine = MockEngine::new();
        engine.add_image("svc:0.9");
        engine.add_image("svc:1.0");

        let report = CleanupAgent::new(&engine)
            .run("svc", &keep(), "svc", None)
            .await;

        assert_eq!(report.removed_images, vec!["svc:0.9"]);
        assert_eq!(engine.image_references(), vec!["svc:1.0"]);
    }

    #[tokio::test]
    async fn test_other_repositories_untouched() {
        let engine = MockEngine::new();
        engine.add_image("svc:1.0");
        engine.add_image("unrelated:3.2");

        CleanupAgent::new(&engine)
            .run("svc", &keep(), "svc", None)
            .await;

        assert!(engine
            .image_references()
            .contains(&"unrelated:3.2".to_string()));
    }

    #[tokio::test]
    async fn test_removal_failure_is_a_warning_not_an_error() {
        let engine = MockEngine::new();
        engine.add_image("svc:0.8");
        engine.add_image("svc:1.0");
        engine.fail_image_removals("image is in use");

        let report = CleanupAgent::new(&engine)
            .run("svc", &keep(), "svc", None)
            .await;

        assert!(!report.is_clean());
        assert!(report.removed_images.is_empty());
    }

    #[tokio::test]
    async fn test_artifact_pruning_keeps_current() {
        let engine = MockEngine::new();
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target/app-1.0.jar"), b"old").unwrap();
        std::fs::write(dir.path().join("target/app-1.1.jar"), b"new").unwrap();

        let current = dir.path().join("target/app-1.1.jar");
        let prune = ArtifactPrune {
            root: dir.path().to_path_buf(),
            pattern: "target/*.jar".to_string(),
            keep: Some(current.clone()),
        };

        let report = CleanupAgent::new(&engine)
            .run("svc", &keep(), "svc", Some(&prune))
            .await;

        assert_eq!(report.removed_artifacts.len(), 1);
        assert!(current.exists());
        assert!(!dir.path().join("target/app-1.0.jar").exists());
    }
}
