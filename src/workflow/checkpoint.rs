//! Debug checkpoints
//!
//! When enabled, the state is written to `<output_stem>_checkpoints/` after
//! the stages that change the draft, plus a readable Markdown copy of the
//! draft itself. Checkpoints are for inspection only; runs never resume
//! from them.

use super::{ProgressObserver, Stage};
use crate::state::EssayState;
use crate::types::AppResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize)]
struct Checkpoint<'a> {
    stage: Stage,
    revision: u32,
    saved_at: DateTime<Utc>,
    state: &'a EssayState,
}

pub struct CheckpointObserver {
    dir: PathBuf,
}

impl CheckpointObserver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Checkpoints for `essay.md` go to `essay_checkpoints/` beside it
    pub fn for_output(output: &Path) -> Self {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "essay".to_string());
        let parent = output.parent().unwrap_or_else(|| Path::new(""));
        Self::new(parent.join(format!("{}_checkpoints", stem)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn save(&self, stage: Stage, state: &EssayState) -> AppResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let revision = state.revision_count();

        let checkpoint = Checkpoint {
            stage,
            revision,
            saved_at: Utc::now(),
            state,
        };
        let json_path = self
            .dir
            .join(format!("checkpoint_{}_rev{}.json", stage, revision));
        std::fs::write(&json_path, serde_json::to_string_pretty(&checkpoint)?)?;
        debug!(path = %json_path.display(), "Checkpoint saved");

        if matches!(stage, Stage::Write | Stage::Cite | Stage::Review) {
            let draft_path = self.dir.join(format!("draft_{}_rev{}.md", stage, revision));
            std::fs::write(&draft_path, state.compiled_draft())?;
        }
        Ok(())
    }
}

impl ProgressObserver for CheckpointObserver {
    fn stage_completed(&self, stage: Stage, state: &EssayState, _elapsed: Duration) {
        if !matches!(stage, Stage::Outline | Stage::Write | Stage::Cite | Stage::Review) {
            return;
        }
        if let Err(e) = self.save(stage, state) {
            warn!(stage = %stage, error = %e, "Could not write checkpoint");
        }
    }
}
