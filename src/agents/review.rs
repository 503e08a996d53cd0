//! Review Agent
//!
//! Grades the compiled draft against the literal criteria text. The only state
//! it writes is the review feedback; whether to revise is the engine's call.

use super::prompts::{review_prompt, REVIEW_SYSTEM};
use super::{extend_unique, null_as_default, AgentKind, EssayAgent};
use crate::llm::{ModelCall, ModelInvoker};
use crate::state::{EssayState, ReviewFeedback, StateDelta};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

const TEMPERATURE: f32 = 0.4;

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    score: Value,
    #[serde(default, alias = "comments", deserialize_with = "null_as_default")]
    weaknesses: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    strengths: Vec<String>,
    #[serde(default, alias = "suggestions", deserialize_with = "null_as_default")]
    feedback: Vec<String>,
}

pub struct ReviewAgent {
    invoker: ModelInvoker,
}

impl ReviewAgent {
    pub fn new(invoker: ModelInvoker) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl EssayAgent for ReviewAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Review
    }

    async fn run(&self, state: &EssayState) -> AppResult<StateDelta> {
        let outline = state
            .outline
            .as_ref()
            .ok_or_else(|| AppError::Internal("reviewing requires an outline".to_string()))?;

        let call = ModelCall::new(
            "review",
            REVIEW_SYSTEM,
            review_prompt(&state.topic, &state.criteria, outline, &state.compiled_draft()),
        )
        .temperature(TEMPERATURE);

        let response: ReviewResponse = self.invoker.invoke_json(&call).await?;
        let feedback = into_feedback(response)?;

        info!(
            score = feedback.score,
            comments = feedback.comments.len(),
            revision = state.revision_count(),
            "Draft reviewed"
        );

        Ok(StateDelta {
            review_feedback: Some(feedback),
            ..Default::default()
        })
    }
}

fn into_feedback(response: ReviewResponse) -> AppResult<ReviewFeedback> {
    let score = normalize_score(&response.score)?;

    let mut comments = Vec::new();
    extend_unique(&mut comments, response.weaknesses);
    extend_unique(&mut comments, response.feedback);
    let mut strengths = Vec::new();
    extend_unique(&mut strengths, response.strengths);

    Ok(ReviewFeedback {
        score,
        comments,
        strengths,
    })
}

/// Read the grade into [0, 1]. Ten-point and percentage scales are rescaled.
fn normalize_score(value: &Value) -> AppResult<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::malformed("review", format!("score is not a number: {}", value)))?;

    if !raw.is_finite() {
        return Err(AppError::malformed("review", format!("score is not finite: {}", raw)));
    }

    let scaled = if raw > 10.0 {
        raw / 100.0
    } else if raw > 1.0 {
        raw / 10.0
    } else {
        raw
    };
    Ok(scaled.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_score_normalization() {
        assert_eq!(normalize_score(&json!(0.75)).unwrap(), 0.75);
        assert_eq!(normalize_score(&json!(8)).unwrap(), 0.8);
        assert_eq!(normalize_score(&json!("85%")).unwrap(), 0.85);
        assert_eq!(normalize_score(&json!(-0.2)).unwrap(), 0.0);
        assert_eq!(normalize_score(&json!(250)).unwrap(), 1.0);
    }

    #[test]
    fn test_non_numeric_or_non_finite_score_is_malformed() {
        for bad in [json!("NaN"), json!("excellent"), json!(null), json!("inf")] {
            let err = normalize_score(&bad).unwrap_err();
            assert!(matches!(err, AppError::MalformedModelOutput { .. }), "{bad}");
        }
    }

    #[test]
    fn test_comments_merge_weaknesses_and_feedback() {
        let response: ReviewResponse = serde_json::from_value(json!({
            "score": 0.5,
            "weaknesses": ["Thin evidence in section 2"],
            "feedback": ["thin evidence in section 2", "Add a counter-argument"],
            "strengths": ["Clear structure"]
        }))
        .unwrap();

        let feedback = into_feedback(response).unwrap();
        assert_eq!(
            feedback.comments,
            vec!["Thin evidence in section 2", "Add a counter-argument"]
        );
        assert_eq!(feedback.strengths, vec!["Clear structure"]);
    }

    #[test]
    fn test_null_lists_are_empty() {
        let response: ReviewResponse = serde_json::from_value(json!({
            "score": 0.6,
            "weaknesses": null,
            "strengths": null,
            "feedback": ["Tighten the conclusion"]
        }))
        .unwrap();

        let feedback = into_feedback(response).unwrap();
        assert_eq!(feedback.score, 0.6);
        assert_eq!(feedback.comments, vec!["Tighten the conclusion"]);
        assert!(feedback.strengths.is_empty());
    }

    #[test]
    fn test_missing_score_fails_to_parse() {
        let parsed = serde_json::from_value::<ReviewResponse>(json!({"weaknesses": []}));
        assert!(parsed.is_err());
    }
}
