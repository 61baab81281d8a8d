//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use crate::pipeline::state::RunState;
use tracing::{info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started {
                run_id,
                instance,
                image,
            } => {
                info!(run_id = %run_id, instance = %instance, image = %image, "Starting pipeline run");
            }
            ProgressEvent::StageStarted { stage } => {
                info!(stage = %stage, "Starting stage");
            }
            ProgressEvent::StageCompleted { stage, duration } => {
                info!(
                    stage = %stage,
                    duration_ms = duration.as_millis() as u64,
                    "Stage complete"
                );
            }
            ProgressEvent::StageWarning { stage, message } => {
                warn!(stage = %stage, "{}", message);
            }
            ProgressEvent::StageFailed { stage, error } => {
                warn!(stage = %stage, error = %error, "Stage failed");
            }
            ProgressEvent::Completed { state, total_time } => {
                if *state == RunState::Failed {
                    warn!(
                        state = %state,
                        total_time_ms = total_time.as_millis() as u64,
                        "Pipeline run finished"
                    );
                } else {
                    info!(
                        state = %state,
                        total_time_ms = total_time.as_millis() as u64,
                        "Pipeline run finished"
                    );
                }
            }
        }
    }
}
