use super::{next_stage, FinalizeReason, ProgressObserver, RevisionPolicy, Stage};
use crate::agents::AgentSet;
use crate::state::EssayState;
use crate::types::{AppError, AppResult};
use std::time::Instant;
use tracing::{info, warn};

/// What a completed run hands back to the driver
#[derive(Debug)]
pub struct WorkflowOutcome {
    pub state: EssayState,
    /// Every stage executed, in order
    pub stages_visited: Vec<Stage>,
    pub write_passes: u32,
    pub finalize_reason: FinalizeReason,
}

impl WorkflowOutcome {
    pub fn final_essay(&self) -> Option<&str> {
        self.state.final_essay.as_deref()
    }
}

/// Drives the agents through the stage machine. The engine is the only
/// writer of [`EssayState`].
pub struct WorkflowEngine {
    agents: AgentSet,
    policy: RevisionPolicy,
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl WorkflowEngine {
    pub fn new(agents: AgentSet, policy: RevisionPolicy) -> Self {
        Self {
            agents,
            policy,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub async fn run(&self, mut state: EssayState) -> AppResult<WorkflowOutcome> {
        let max_write_passes = self.policy.max_revision_cycles + 1;
        let mut stage = Stage::Research;
        let mut stages_visited = Vec::new();
        let mut write_passes = 0u32;
        let mut finalize_reason = None;

        while let Some(kind) = stage.agent() {
            if stage == Stage::Write {
                write_passes += 1;
                if write_passes > max_write_passes {
                    return Err(AppError::Internal(format!(
                        "write pass {} exceeds the limit of {}",
                        write_passes, max_write_passes
                    ))
                    .at_stage(stage));
                }
            }

            for observer in &self.observers {
                observer.stage_started(stage, &state);
            }
            let started = Instant::now();

            let agent = self.agents.get(kind);
            if agent.kind() != kind {
                return Err(AppError::Internal(format!(
                    "{} agent registered in the {} slot",
                    agent.kind(),
                    kind
                ))
                .at_stage(stage));
            }
            let delta = agent.run(&state).await.map_err(|e| e.at_stage(stage))?;
            if delta.is_empty() {
                warn!(stage = %stage, "Agent returned an empty delta");
            }
            state.apply(delta).map_err(|e| e.at_stage(stage))?;
            stages_visited.push(stage);

            let elapsed = started.elapsed();
            for observer in &self.observers {
                observer.stage_completed(stage, &state, elapsed);
            }

            let next = next_stage(stage, &state, &self.policy);
            if stage == Stage::Review {
                match self.policy.decide(state.review_score(), state.revision_count()) {
                    Some(reason) => {
                        info!(
                            score = state.review_score().unwrap_or_default(),
                            threshold = self.policy.threshold,
                            revisions = state.revision_count(),
                            reason = %reason,
                            "Finalizing draft"
                        );
                        finalize_reason = Some(reason);
                    }
                    None => {
                        state.begin_revision();
                        info!(
                            score = state.review_score().unwrap_or_default(),
                            threshold = self.policy.threshold,
                            revision = state.revision_count(),
                            "Score below threshold, revising"
                        );
                    }
                }
            }
            stage = next;
        }

        let finalize_reason = finalize_reason
            .ok_or_else(|| AppError::Internal("run ended without a review decision".to_string()))?;
        if state.final_essay.is_none() {
            return Err(AppError::Internal("run ended without a final essay".to_string()));
        }

        info!(
            write_passes,
            revisions = state.revision_count(),
            reason = %finalize_reason,
            "Workflow complete"
        );
        Ok(WorkflowOutcome {
            state,
            stages_visited,
            write_passes,
            finalize_reason,
        })
    }
}
