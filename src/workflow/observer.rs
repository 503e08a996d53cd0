use super::Stage;
use crate::state::EssayState;
use std::time::Duration;
use tracing::{debug, info};

/// Receives stage boundaries from the engine. Observers cannot touch the state
/// and cannot fail the run.
pub trait ProgressObserver: Send + Sync {
    fn stage_started(&self, _stage: Stage, _state: &EssayState) {}

    fn stage_completed(&self, _stage: Stage, _state: &EssayState, _elapsed: Duration) {}
}

/// Reports progress through `tracing`
pub struct LoggingObserver {
    tracking: bool,
}

impl LoggingObserver {
    pub fn new(tracking: bool) -> Self {
        Self { tracking }
    }
}

impl ProgressObserver for LoggingObserver {
    fn stage_started(&self, stage: Stage, state: &EssayState) {
        info!(stage = %stage, revision = state.revision_count(), "Stage started");
    }

    fn stage_completed(&self, stage: Stage, state: &EssayState, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        match stage {
            Stage::Write | Stage::Cite => info!(
                stage = %stage,
                words = state.word_count(),
                citations = state.citations.len(),
                elapsed_ms,
                "Stage completed"
            ),
            Stage::Review => info!(
                stage = %stage,
                score = state.review_score().unwrap_or_default(),
                revision = state.revision_count(),
                elapsed_ms,
                "Stage completed"
            ),
            _ => debug!(stage = %stage, elapsed_ms, "Stage completed"),
        }

        if self.tracking {
            info!(
                target: "essay_agents::tracking",
                stage = %stage,
                revision = state.revision_count(),
                elapsed_ms,
                "stage timing"
            );
        }
    }
}
