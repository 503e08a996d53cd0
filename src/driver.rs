//! Run Driver
//!
//! One end-to-end invocation: validate the inputs, load the literature, check
//! the model server, run the workflow and write the essay. Nothing is written
//! to the output path unless the whole run succeeds.

use crate::agents::AgentSet;
use crate::config::Config;
use crate::documents::{load_literature, DefaultExtractor, TextExtractor};
use crate::llm::{InvokerSettings, LLMAdapter, ModelInvoker, OllamaAdapter};
use crate::state::EssayState;
use crate::types::{AppError, AppResult};
use crate::workflow::{
    CheckpointObserver, FinalizeReason, LoggingObserver, RevisionPolicy, WorkflowEngine,
};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub topic: String,
    pub criteria_path: PathBuf,
    pub literature_dir: PathBuf,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub output_path: PathBuf,
    pub title: String,
    pub word_count: usize,
    pub sections: usize,
    pub citations: usize,
    pub sources_loaded: usize,
    pub files_skipped: usize,
    pub write_passes: u32,
    pub revision_cycles: u32,
    pub final_score: Option<f64>,
    pub finalize_reason: FinalizeReason,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Essay written to {}", self.output_path.display())?;
        writeln!(f, "  Title:           {}", self.title)?;
        writeln!(f, "  Words:           {} in {} sections", self.word_count, self.sections)?;
        writeln!(f, "  Citations:       {} from {} sources", self.citations, self.sources_loaded)?;
        if self.files_skipped > 0 {
            writeln!(f, "  Files skipped:   {}", self.files_skipped)?;
        }
        writeln!(f, "  Revision cycles: {}", self.revision_cycles)?;
        match self.final_score {
            Some(score) => writeln!(f, "  Final score:     {:.2} ({})", score, self.finalize_reason)?,
            None => writeln!(f, "  Final score:     n/a ({})", self.finalize_reason)?,
        }
        write!(f, "  Elapsed:         {:.1}s", self.elapsed.as_secs_f64())
    }
}

/// Run against the configured Ollama server
pub async fn run(request: &RunRequest, config: &Config) -> AppResult<RunSummary> {
    let adapter = Arc::new(OllamaAdapter::new(&config.ollama.base_url, &config.ollama.model));
    run_with_adapter(request, config, adapter, Arc::new(DefaultExtractor)).await
}

/// Run with an explicit model backend and text extractor
pub async fn run_with_adapter(
    request: &RunRequest,
    config: &Config,
    adapter: Arc<dyn LLMAdapter>,
    extractor: Arc<dyn TextExtractor>,
) -> AppResult<RunSummary> {
    let run_id = Uuid::new_v4();
    let span = info_span!("essay_run", run_id = %run_id);
    execute(run_id, request, config, adapter, extractor)
        .instrument(span)
        .await
}

async fn execute(
    run_id: Uuid,
    request: &RunRequest,
    config: &Config,
    adapter: Arc<dyn LLMAdapter>,
    extractor: Arc<dyn TextExtractor>,
) -> AppResult<RunSummary> {
    let started_at = Utc::now();
    let clock = Instant::now();

    let topic = request.topic.trim();
    if topic.is_empty() {
        return Err(AppError::Input("The topic must not be empty".to_string()));
    }
    config.validate()?;
    let criteria = read_criteria(&request.criteria_path)?;
    info!(topic = %topic, model = %config.ollama.model, "Starting essay run");

    let literature_dir = request.literature_dir.clone();
    let chunking = config.chunking.clone();
    let literature = tokio::task::spawn_blocking(move || {
        load_literature(&literature_dir, &chunking, extractor.as_ref())
    })
    .await
    .map_err(|e| AppError::Internal(format!("literature loading task failed: {}", e)))??;
    info!(
        sources = literature.sources.len(),
        chunks = literature.chunks.len(),
        skipped = literature.skipped.len(),
        "Literature loaded"
    );
    let sources_loaded = literature.sources.len();
    let files_skipped = literature.skipped.len();

    let state = EssayState::new(topic, criteria, literature.chunks, literature.sources)?;

    if config.ollama.preflight {
        adapter
            .health_check()
            .await
            .map_err(|e| AppError::ModelUnavailable {
                attempts: 1,
                reason: e.to_string(),
            })?;
        info!(backend = adapter.name(), "Model server reachable");
    }

    let invoker = ModelInvoker::new(adapter, InvokerSettings::from_config(config));
    let mut engine = WorkflowEngine::new(
        AgentSet::from_config(invoker, config),
        RevisionPolicy::from_config(&config.review),
    )
    .with_observer(Box::new(LoggingObserver::new(config.tracking.enabled)));
    if config.checkpoints.enabled {
        let checkpoints = CheckpointObserver::for_output(&request.output_path);
        info!(dir = %checkpoints.dir().display(), "Debug checkpoints enabled");
        engine = engine.with_observer(Box::new(checkpoints));
    }

    let outcome = engine.run(state).await?;
    let essay = outcome
        .final_essay()
        .ok_or_else(|| AppError::Internal("the run produced no essay".to_string()))?;
    write_output(&request.output_path, essay)?;

    let state = &outcome.state;
    let summary = RunSummary {
        run_id,
        started_at,
        elapsed: clock.elapsed(),
        output_path: request.output_path.clone(),
        title: essay
            .lines()
            .next()
            .map(|line| line.trim_start_matches('#').trim().to_string())
            .unwrap_or_default(),
        word_count: state.word_count(),
        sections: state.sections.len(),
        citations: state.citations.len(),
        sources_loaded,
        files_skipped,
        write_passes: outcome.write_passes,
        revision_cycles: state.revision_count(),
        final_score: state.review_score(),
        finalize_reason: outcome.finalize_reason,
    };
    info!(
        output = %summary.output_path.display(),
        words = summary.word_count,
        revisions = summary.revision_cycles,
        reason = %summary.finalize_reason,
        "Essay run complete"
    );
    Ok(summary)
}

fn read_criteria(path: &Path) -> AppResult<String> {
    let criteria = std::fs::read_to_string(path).map_err(|e| {
        AppError::Input(format!("Cannot read criteria file {}: {}", path.display(), e))
    })?;
    if criteria.trim().is_empty() {
        return Err(AppError::Input(format!(
            "Criteria file {} is empty",
            path.display()
        )));
    }
    Ok(criteria.trim().to_string())
}

/// Write through a sibling temp file so a failed write leaves no partial essay
fn write_output(path: &Path, essay: &str) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut temp = path.as_os_str().to_owned();
    temp.push(".partial");
    let temp = PathBuf::from(temp);

    std::fs::write(&temp, essay)?;
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(e.into());
    }
    Ok(())
}
