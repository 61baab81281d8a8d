//! Progress handler trait and events

use crate::pipeline::state::{RunState, Stage};
use std::time::Duration;

/// Events emitted as a pipeline run moves through its stages
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run started
    Started {
        run_id: String,
        instance: String,
        image: String,
    },

    /// A stage began executing
    StageStarted { stage: Stage },

    /// A stage finished successfully
    StageCompleted { stage: Stage, duration: Duration },

    /// A stage raised a non-fatal warning
    StageWarning { stage: Stage, message: String },

    /// A stage failed fatally
    StageFailed { stage: Stage, error: String },

    /// The run reached a terminal state
    Completed {
        state: RunState,
        total_time: Duration,
    },
}

/// Trait for handling progress events during a pipeline run
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {
        // Intentionally empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ProgressHandler for CountingHandler {
        fn on_progress(&self, _event: &ProgressEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_handler() {
        let handler = NoOpHandler;
        handler.on_progress(&ProgressEvent::StageStarted {
            stage: Stage::Build,
        });
    }

    #[test]
    fn test_events_are_delivered() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            count: count.clone(),
        };

        handler.on_progress(&ProgressEvent::Started {
            run_id: "r1".to_string(),
            instance: "svc".to_string(),
            image: "svc:1.0".to_string(),
        });
        handler.on_progress(&ProgressEvent::StageCompleted {
            stage: Stage::Deploy,
            duration: Duration::from_millis(120),
        });
        handler.on_progress(&ProgressEvent::Completed {
            state: RunState::Succeeded,
            total_time: Duration::from_secs(4),
        });

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_event_debug() {
        let event = ProgressEvent::StageFailed {
            stage: Stage::Build,
            error: "compile error".to_string(),
        };
        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("StageFailed"));
        assert!(debug_str.contains("Build"));
    }
}
