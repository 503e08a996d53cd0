//! Workflow Engine
//!
//! The pipeline is an explicit finite-state machine:
//!
//! ```text
//! Research → Outline → Write → Cite → Review ─┬─→ Edit → Done
//!                        ▲                    │
//!                        └─── score too low ──┘
//! ```
//!
//! The only conditional edge leaves `Review`. It goes back to `Write` while the
//! score is under the threshold and the revision budget is not spent, and on
//! to `Edit` otherwise. [`next_stage`] holds that decision and nothing else.

pub mod checkpoint;
pub mod engine;
pub mod observer;

pub use checkpoint::CheckpointObserver;
pub use engine::{WorkflowEngine, WorkflowOutcome};
pub use observer::{LoggingObserver, ProgressObserver};

use crate::agents::AgentKind;
use crate::config::ReviewConfig;
use crate::state::EssayState;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Research,
    Outline,
    Write,
    Cite,
    Review,
    Edit,
    Done,
}

impl Stage {
    /// The agent that runs in this stage; `Done` has none
    pub fn agent(self) -> Option<AgentKind> {
        match self {
            Stage::Research => Some(AgentKind::Research),
            Stage::Outline => Some(AgentKind::Outline),
            Stage::Write => Some(AgentKind::Writer),
            Stage::Cite => Some(AgentKind::Citation),
            Stage::Review => Some(AgentKind::Review),
            Stage::Edit => Some(AgentKind::Editor),
            Stage::Done => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Research => "research",
            Stage::Outline => "outline",
            Stage::Write => "write",
            Stage::Cite => "cite",
            Stage::Review => "review",
            Stage::Edit => "edit",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the run left the revision loop. Neither case is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeReason {
    /// The review score reached the threshold
    ScoreAccepted,
    /// The threshold was never reached; the last draft is finalized as is
    RevisionBudgetExhausted,
}

impl fmt::Display for FinalizeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeReason::ScoreAccepted => write!(f, "score accepted"),
            FinalizeReason::RevisionBudgetExhausted => write!(f, "revision budget exhausted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevisionPolicy {
    pub threshold: f64,
    pub max_revision_cycles: u32,
}

impl RevisionPolicy {
    pub fn new(threshold: f64, max_revision_cycles: u32) -> Self {
        Self {
            threshold,
            max_revision_cycles,
        }
    }

    pub fn from_config(review: &ReviewConfig) -> Self {
        Self::new(review.threshold, review.max_revision_cycles)
    }

    /// `Some` when the draft should be finalized, `None` when it should be revised.
    /// A missing score counts as 0.0.
    pub fn decide(&self, score: Option<f64>, revision_count: u32) -> Option<FinalizeReason> {
        if score.unwrap_or(0.0) >= self.threshold {
            Some(FinalizeReason::ScoreAccepted)
        } else if revision_count >= self.max_revision_cycles {
            Some(FinalizeReason::RevisionBudgetExhausted)
        } else {
            None
        }
    }
}

/// The transition function of the pipeline
pub fn next_stage(stage: Stage, state: &EssayState, policy: &RevisionPolicy) -> Stage {
    match stage {
        Stage::Research => Stage::Outline,
        Stage::Outline => Stage::Write,
        Stage::Write => Stage::Cite,
        Stage::Cite => Stage::Review,
        Stage::Review => match policy.decide(state.review_score(), state.revision_count()) {
            Some(_) => Stage::Edit,
            None => Stage::Write,
        },
        Stage::Edit | Stage::Done => Stage::Done,
    }
}
