//! Run reports and their persistence
//!
//! A [`RunReport`] is the deployment record: the outcome of the most recent
//! pipeline run plus the identity of the instance it produced. The
//! [`RecordStore`] persists the latest report as JSON in the state
//! directory so `drydock status` can answer across process boundaries.

use super::state::{RunState, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// A non-fatal issue collected during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWarning {
    pub stage: Stage,
    pub message: String,
}

/// Details of the fatal error that ended a failed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub stage: Stage,
    pub message: String,

    /// Last known output of the affected stage, when capturable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

/// The record of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub instance: String,
    pub image: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_digest: Option<String>,

    pub state: RunState,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,

    pub warnings: Vec<RunWarning>,

    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn new(instance: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            instance: instance.into(),
            image: image.into(),
            artifact_digest: None,
            state: RunState::Pending,
            failure: None,
            warnings: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Moves the run to `next`, logging (but not panicking on) an illegal
    /// transition so a bug cannot take the pipeline down mid-run.
    pub fn transition(&mut self, next: RunState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Illegal state transition");
        }
        self.state = next;
    }

    /// Records a non-fatal warning against a stage.
    pub fn warn(&mut self, stage: Stage, message: impl Into<String>) {
        self.warnings.push(RunWarning {
            stage,
            message: message.into(),
        });
    }

    /// Records the fatal failure and moves the run to FAILED.
    pub fn fail(&mut self, stage: Stage, message: impl Into<String>, diagnostics: Option<String>) {
        self.failure = Some(FailureDetail {
            stage,
            message: message.into(),
            diagnostics,
        });
        self.transition(RunState::Failed);
    }

    /// Stamps the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// A run that succeeded but carries warnings.
    pub fn is_degraded(&self) -> bool {
        self.state == RunState::Succeeded && !self.warnings.is_empty()
    }

    /// Process exit code for this outcome: non-zero only for fatal errors.
    pub fn exit_code(&self) -> i32 {
        match self.state {
            RunState::Failed => 1,
            _ => 0,
        }
    }
}

/// Errors from reading or writing deployment records
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to access record at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record at {} did not decode: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persists the most recent run report in the state directory
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join("last-run.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `report` as the latest record, creating the state directory
    /// as needed.
    pub fn save(&self, report: &RunReport) -> Result<(), RecordError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| RecordError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(report).map_err(|source| RecordError::Decode {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|source| RecordError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Loads the latest record, or `None` when no run has been recorded.
    pub fn load(&self) -> Result<Option<RunReport>, RecordError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(RecordError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let report = serde_json::from_str(&raw).map_err(|source| RecordError::Decode {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(report))
    }
}
