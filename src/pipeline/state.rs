//! Run states and stage identifiers
//!
//! One pipeline run moves PENDING → BUILDING → IMAGING → DEPLOYING →
//! VERIFYING → {SUCCEEDED, FAILED}. Any stage's fatal error goes straight
//! to FAILED; a verify soft-failure still reaches SUCCEEDED with a recorded
//! warning.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Build,
    Image,
    Deploy,
    Verify,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Build => "build",
            Stage::Image => "image",
            Stage::Deploy => "deploy",
            Stage::Verify => "verify",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// State of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Pending,
    Building,
    Imaging,
    Deploying,
    Verifying,
    Succeeded,
    Failed,
}

impl RunState {
    /// Whether the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        if self.is_terminal() {
            return false;
        }
        // Every non-terminal state may fail fatally
        if next == RunState::Failed {
            return true;
        }
        matches!(
            (self, next),
            (RunState::Pending, RunState::Building)
                | (RunState::Building, RunState::Imaging)
                | (RunState::Imaging, RunState::Deploying)
                | (RunState::Deploying, RunState::Verifying)
                | (RunState::Verifying, RunState::Succeeded)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Pending => "PENDING",
            RunState::Building => "BUILDING",
            RunState::Imaging => "IMAGING",
            RunState::Deploying => "DEPLOYING",
            RunState::Verifying => "VERIFYING",
            RunState::Succeeded => "SUCCEEDED",
            RunState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
