use async_trait::async_trait;
use essay_agents::agents::{AgentKind, AgentSet, EssayAgent};
use essay_agents::documents::{LiteratureChunk, SourceDocument};
use essay_agents::state::{
    DraftSection, EssayState, Outline, OutlineSection, ResearchNotes, ReviewFeedback, StateDelta,
};
use essay_agents::types::{AppError, AppResult};
use essay_agents::workflow::{FinalizeReason, RevisionPolicy, Stage, WorkflowEngine};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Test double returning a fixed delta built from the current state
struct StubAgent {
    kind: AgentKind,
    calls: Arc<AtomicU32>,
    respond: Box<dyn Fn(&EssayState) -> AppResult<StateDelta> + Send + Sync>,
}

#[async_trait]
impl EssayAgent for StubAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn run(&self, state: &EssayState) -> AppResult<StateDelta> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(state)
    }
}

fn stub(
    kind: AgentKind,
    calls: &Arc<AtomicU32>,
    respond: impl Fn(&EssayState) -> AppResult<StateDelta> + Send + Sync + 'static,
) -> Box<dyn EssayAgent> {
    Box::new(StubAgent {
        kind,
        calls: calls.clone(),
        respond: Box::new(respond),
    })
}

fn outline() -> Outline {
    Outline {
        title: "On Attention".to_string(),
        sections: vec![
            OutlineSection {
                id: "s01".to_string(),
                title: "Mechanism".to_string(),
                description: "How it works".to_string(),
                target_words: 200,
            },
            OutlineSection {
                id: "s02".to_string(),
                title: "Impact".to_string(),
                description: "What it changed".to_string(),
                target_words: 200,
            },
        ],
    }
}

struct Harness {
    agents: AgentSet,
    writer_calls: Arc<AtomicU32>,
    outline_calls: Arc<AtomicU32>,
    editor_calls: Arc<AtomicU32>,
}

/// Agents that always succeed; the reviewer hands out `scores` in order, repeating the last
fn harness(scores: &[f64]) -> Harness {
    let counter = || Arc::new(AtomicU32::new(0));
    let (research, outline_calls, writer_calls, citation, review, editor_calls) =
        (counter(), counter(), counter(), counter(), counter(), counter());
    let scores = Arc::new(Mutex::new(scores.iter().copied().collect::<VecDeque<f64>>()));
    let pass = writer_calls.clone();

    let agents = AgentSet {
        research: stub(AgentKind::Research, &research, |_| {
            Ok(StateDelta {
                research_notes: Some(ResearchNotes {
                    themes: vec!["attention".to_string()],
                    ..Default::default()
                }),
                ..Default::default()
            })
        }),
        outline: stub(AgentKind::Outline, &outline_calls, |_| {
            Ok(StateDelta {
                outline: Some(outline()),
                ..Default::default()
            })
        }),
        writer: stub(AgentKind::Writer, &writer_calls, move |state| {
            let pass = pass.load(Ordering::SeqCst);
            let sections = state
                .outline
                .as_ref()
                .unwrap()
                .sections
                .iter()
                .map(|s| DraftSection {
                    section_id: s.id.clone(),
                    title: s.title.clone(),
                    text: format!("Pass {} text for {}.", pass, s.title),
                })
                .collect();
            Ok(StateDelta {
                sections: Some(sections),
                citations: Some(Vec::new()),
                ..Default::default()
            })
        }),
        citation: stub(AgentKind::Citation, &citation, |_| {
            Ok(StateDelta {
                citations: Some(Vec::new()),
                ..Default::default()
            })
        }),
        review: stub(AgentKind::Review, &review, move |_| {
            let mut scores = scores.lock().unwrap();
            let score = if scores.len() > 1 {
                scores.pop_front().unwrap()
            } else {
                *scores.front().unwrap()
            };
            Ok(StateDelta {
                review_feedback: Some(ReviewFeedback {
                    score,
                    comments: vec!["Go deeper".to_string()],
                    strengths: vec![],
                }),
                ..Default::default()
            })
        }),
        editor: stub(AgentKind::Editor, &editor_calls, |state| {
            Ok(StateDelta {
                final_essay: Some(format!("# Essay\n\n{}", state.compiled_draft())),
                ..Default::default()
            })
        }),
    };

    Harness {
        agents,
        writer_calls,
        outline_calls,
        editor_calls,
    }
}

fn initial_state() -> EssayState {
    EssayState::new(
        "Attention",
        "Be precise",
        vec![LiteratureChunk::new("a.txt", 0, "Attention is all you need.")],
        vec![SourceDocument::new("a.txt")],
    )
    .unwrap()
}

#[tokio::test]
async fn test_high_first_score_means_single_pass() {
    let h = harness(&[0.95]);
    let engine = WorkflowEngine::new(h.agents, RevisionPolicy::new(0.7, 2));

    let outcome = engine.run(initial_state()).await.unwrap();

    assert_eq!(outcome.state.revision_count(), 0);
    assert_eq!(outcome.write_passes, 1);
    assert_eq!(h.writer_calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.finalize_reason, FinalizeReason::ScoreAccepted);
    assert_eq!(
        outcome.stages_visited,
        vec![Stage::Research, Stage::Outline, Stage::Write, Stage::Cite, Stage::Review, Stage::Edit]
    );
}

#[tokio::test]
async fn test_one_revision_then_accept() {
    let h = harness(&[0.5, 0.9]);
    let engine = WorkflowEngine::new(h.agents, RevisionPolicy::new(0.7, 2));

    let outcome = engine.run(initial_state()).await.unwrap();

    assert_eq!(outcome.state.revision_count(), 1);
    assert_eq!(h.writer_calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.finalize_reason, FinalizeReason::ScoreAccepted);
    assert!(outcome.final_essay().unwrap().contains("Pass 2 text"));
}

#[tokio::test]
async fn test_low_scores_exhaust_the_budget() {
    let h = harness(&[0.3, 0.3, 0.3]);
    let engine = WorkflowEngine::new(h.agents, RevisionPolicy::new(0.7, 2));

    let outcome = engine.run(initial_state()).await.unwrap();

    assert_eq!(outcome.state.revision_count(), 2);
    assert_eq!(h.writer_calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.finalize_reason, FinalizeReason::RevisionBudgetExhausted);
    assert!(outcome.final_essay().is_some());
}

#[tokio::test]
async fn test_zero_scores_always_terminate() {
    for max_cycles in 0..=4 {
        let h = harness(&[0.0]);
        let engine = WorkflowEngine::new(h.agents, RevisionPolicy::new(0.7, max_cycles));

        let outcome = engine.run(initial_state()).await.unwrap();

        assert_eq!(outcome.state.revision_count(), max_cycles);
        assert_eq!(outcome.write_passes, max_cycles + 1);
        assert_eq!(h.editor_calls.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn test_outline_is_stable_across_revisions() {
    let h = harness(&[0.1, 0.2, 0.3]);
    let engine = WorkflowEngine::new(h.agents, RevisionPolicy::new(0.7, 2));

    let outcome = engine.run(initial_state()).await.unwrap();

    assert_eq!(h.outline_calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.state.outline, Some(outline()));
    let ids: Vec<&str> = outcome.state.sections.iter().map(|s| s.section_id.as_str()).collect();
    assert_eq!(ids, vec!["s01", "s02"]);
}

#[tokio::test]
async fn test_agent_failure_names_its_stage() {
    let mut h = harness(&[0.9]);
    let citation_calls = Arc::new(AtomicU32::new(0));
    h.agents.citation = stub(AgentKind::Citation, &citation_calls, |_| {
        Err(AppError::malformed("citation s01", "not json"))
    });
    let engine = WorkflowEngine::new(h.agents, RevisionPolicy::new(0.7, 2));

    let err = engine.run(initial_state()).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Cite));
    assert!(matches!(err.root(), AppError::MalformedModelOutput { .. }));
    assert_eq!(h.editor_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_agent_cannot_rewrite_the_outline() {
    let mut h = harness(&[0.9]);
    let writer_calls = Arc::new(AtomicU32::new(0));
    h.agents.writer = stub(AgentKind::Writer, &writer_calls, |_| {
        Ok(StateDelta {
            outline: Some(Outline {
                title: "Hijacked".to_string(),
                sections: vec![],
            }),
            ..Default::default()
        })
    });
    let engine = WorkflowEngine::new(h.agents, RevisionPolicy::new(0.7, 2));

    let err = engine.run(initial_state()).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Write));
    assert!(matches!(err.root(), AppError::Internal(_)));
}

#[tokio::test]
async fn test_agent_in_the_wrong_slot_is_rejected() {
    let mut h = harness(&[0.9]);
    let calls = Arc::new(AtomicU32::new(0));
    h.agents.review = stub(AgentKind::Editor, &calls, |_| Ok(StateDelta::default()));
    let engine = WorkflowEngine::new(h.agents, RevisionPolicy::new(0.7, 2));

    let err = engine.run(initial_state()).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Review));
    assert!(matches!(err.root(), AppError::Internal(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
