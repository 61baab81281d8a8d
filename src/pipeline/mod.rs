//! The deployment pipeline: build, image, deploy, verify, cleanup
//!
//! Strictly sequential stages, each gating the next. Fatal errors abort the
//! remaining fatal-capable stages and surface diagnostics; verify and
//! cleanup failures are warnings collected into the run report.

pub mod lock;
pub mod orchestrator;
pub mod report;
pub mod state;

pub use lock::{DeployLock, LockError};
pub use orchestrator::PipelineOrchestrator;
pub use report::{FailureDetail, RecordStore, RunReport, RunWarning};
pub use state::{RunState, Stage};
