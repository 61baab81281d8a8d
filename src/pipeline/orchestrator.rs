//! Sequential execution of the five pipeline stages
//!
//! Build → Image → Deploy → Verify → Cleanup, each stage gating the next.
//! A fatal error records diagnostics and jumps the run to FAILED, skipping
//! the remaining fatal-capable stages; cleanup still runs best-effort.
//! Verify never fails the run: a bad probe downgrades to degraded success,
//! and no rollback is attempted because none exists in this design.

use super::lock::DeployLock;
use super::report::{RecordStore, RunReport};
use super::state::{RunState, Stage};
use crate::artifact::{Artifact, ArtifactBuilder};
use crate::cleanup::{ArtifactPrune, CleanupAgent};
use crate::config::DrydockConfig;
use crate::image::{ImageBuilder, ImageSpec};
use crate::progress::{ProgressEvent, ProgressHandler};
use crate::runtime::{ContainerEngine, InstanceSpec, Supervisor};
use crate::verify::{HealthVerifier, VerifyOutcome};
use std::time::Instant;
use tracing::{info, warn};

/// Lines of instance output captured as diagnostics on deploy failure
const DIAGNOSTIC_LOG_TAIL: usize = 50;

pub struct PipelineOrchestrator<'a> {
    config: &'a DrydockConfig,
    engine: &'a dyn ContainerEngine,
    progress: Option<&'a dyn ProgressHandler>,
    /// Per-run environment overrides passed at instance start
    env: Vec<String>,
}

impl<'a> PipelineOrchestrator<'a> {
    pub fn new(config: &'a DrydockConfig, engine: &'a dyn ContainerEngine) -> Self {
        Self {
            config,
            engine,
            progress: None,
            env: Vec::new(),
        }
    }

    pub fn with_progress(mut self, handler: &'a dyn ProgressHandler) -> Self {
        self.progress = Some(handler);
        self
    }

    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    /// Runs the full pipeline and returns the run report. Fatal errors are
    /// embedded in the report rather than returned; the exit code comes
    /// from [`RunReport::exit_code`].
    pub async fn execute(&self) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::new(&self.config.instance, self.config.image.to_string());

        info!(
            run_id = %report.run_id,
            instance = %self.config.instance,
            image = %self.config.image,
            "Starting pipeline run"
        );
        self.emit(ProgressEvent::Started {
            run_id: report.run_id.to_string(),
            instance: self.config.instance.clone(),
            image: self.config.image.to_string(),
        });

        // One run per instance name at a time; a held lock means another
        // run has not reached a terminal state yet
        let _lock = match DeployLock::acquire(&self.config.state_dir, &self.config.instance) {
            Ok(lock) => lock,
            Err(e) => {
                self.emit(ProgressEvent::StageFailed {
                    stage: Stage::Deploy,
                    error: e.to_string(),
                });
                report.fail(Stage::Deploy, e.to_string(), None);
                // Skip cleanup: the lock holder owns the runtime right now
                return self.finish(report, start);
            }
        };

        // Build
        report.transition(RunState::Building);
        self.emit(ProgressEvent::StageStarted { stage: Stage::Build });
        let stage_start = Instant::now();
        let builder = ArtifactBuilder::new(
            self.config.workdir.clone(),
            self.config.build_command.clone(),
            self.config.artifact_glob.clone(),
        );
        let artifact = match builder.build().await {
            Ok(artifact) => {
                self.emit(ProgressEvent::StageCompleted {
                    stage: Stage::Build,
                    duration: stage_start.elapsed(),
                });
                artifact
            }
            Err(e) => {
                self.emit(ProgressEvent::StageFailed {
                    stage: Stage::Build,
                    error: e.to_string(),
                });
                report.fail(Stage::Build, e.to_string(), None);
                self.run_cleanup(&mut report, None).await;
                return self.finish(report, start);
            }
        };
        report.artifact_digest = Some(artifact.digest.clone());

        // Image
        report.transition(RunState::Imaging);
        self.emit(ProgressEvent::StageStarted { stage: Stage::Image });
        let stage_start = Instant::now();
        let image_spec = ImageSpec {
            reference: self.config.image.clone(),
            base_image: self.config.base_image.clone(),
            expose_port: self.config.container_port,
            entrypoint: self.config.entrypoint.clone(),
        };
        match ImageBuilder::new(self.engine).build(&image_spec, &artifact).await {
            Ok(()) => self.emit(ProgressEvent::StageCompleted {
                stage: Stage::Image,
                duration: stage_start.elapsed(),
            }),
            Err(e) => {
                self.emit(ProgressEvent::StageFailed {
                    stage: Stage::Image,
                    error: e.to_string(),
                });
                report.fail(Stage::Image, e.to_string(), None);
                self.run_cleanup(&mut report, Some(&artifact)).await;
                return self.finish(report, start);
            }
        }

        // Deploy
        report.transition(RunState::Deploying);
        self.emit(ProgressEvent::StageStarted {
            stage: Stage::Deploy,
        });
        let stage_start = Instant::now();
        let instance_spec = InstanceSpec {
            name: self.config.instance.clone(),
            image: self.config.image.clone(),
            host_port: self.config.host_port,
            container_port: self.config.container_port,
            env: self.env.clone(),
        };
        match Supervisor::new(self.engine).redeploy(&instance_spec).await {
            Ok(_id) => self.emit(ProgressEvent::StageCompleted {
                stage: Stage::Deploy,
                duration: stage_start.elapsed(),
            }),
            Err(e) => {
                let diagnostics = self
                    .engine
                    .instance_logs(&self.config.instance, DIAGNOSTIC_LOG_TAIL)
                    .await
                    .ok()
                    .filter(|logs| !logs.is_empty());
                self.emit(ProgressEvent::StageFailed {
                    stage: Stage::Deploy,
                    error: e.to_string(),
                });
                report.fail(Stage::Deploy, e.to_string(), diagnostics);
                self.run_cleanup(&mut report, Some(&artifact)).await;
                return self.finish(report, start);
            }
        }

        // Verify: soft-fail by design, never rolls back
        report.transition(RunState::Verifying);
        self.emit(ProgressEvent::StageStarted {
            stage: Stage::Verify,
        });
        let stage_start = Instant::now();
        let verifier = HealthVerifier::new(
            "127.0.0.1",
            self.config.host_port,
            self.config.liveness_path.clone(),
            self.config.catalog_path.clone(),
            self.config.grace_period(),
            self.config.probe_timeout(),
        );
        match verifier.verify().await {
            VerifyOutcome::Healthy { latency, products } => {
                info!(
                    latency_ms = latency.as_millis() as u64,
                    products = products,
                    "Deployment verified"
                );
                self.emit(ProgressEvent::StageCompleted {
                    stage: Stage::Verify,
                    duration: stage_start.elapsed(),
                });
            }
            VerifyOutcome::Degraded { reason } => {
                self.emit(ProgressEvent::StageWarning {
                    stage: Stage::Verify,
                    message: reason.clone(),
                });
                report.warn(Stage::Verify, reason);
            }
        }

        // Cleanup, best-effort
        self.run_cleanup(&mut report, Some(&artifact)).await;

        report.transition(RunState::Succeeded);
        self.finish(report, start)
    }

    /// Reclaims superseded images (and, when an artifact was produced,
    /// superseded build outputs). Warnings only; never changes the outcome.
    async fn run_cleanup(&self, report: &mut RunReport, artifact: Option<&Artifact>) {
        self.emit(ProgressEvent::StageStarted {
            stage: Stage::Cleanup,
        });
        let stage_start = Instant::now();

        let prune = artifact.map(|artifact| ArtifactPrune {
            root: self.config.workdir.clone(),
            pattern: self.config.artifact_glob.clone(),
            keep: Some(artifact.path.clone()),
        });

        let cleanup_report = CleanupAgent::new(self.engine)
            .run(
                &self.config.image.name,
                &self.config.image,
                &self.config.instance,
                prune.as_ref(),
            )
            .await;

        for warning in cleanup_report.warnings {
            self.emit(ProgressEvent::StageWarning {
                stage: Stage::Cleanup,
                message: warning.clone(),
            });
            report.warn(Stage::Cleanup, warning);
        }

        self.emit(ProgressEvent::StageCompleted {
            stage: Stage::Cleanup,
            duration: stage_start.elapsed(),
        });
    }

    /// Stamps, persists and announces the terminal report.
    fn finish(&self, mut report: RunReport, start: Instant) -> RunReport {
        report.finish();

        if let Err(e) = RecordStore::new(&self.config.state_dir).save(&report) {
            warn!(error = %e, "Failed to persist deployment record");
        }

        self.emit(ProgressEvent::Completed {
            state: report.state,
            total_time: start.elapsed(),
        });
        info!(
            run_id = %report.run_id,
            state = %report.state,
            warnings = report.warnings.len(),
            "Pipeline run finished"
        );
        report
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(handler) = self.progress {
            handler.on_progress(&event);
        }
    }
}
