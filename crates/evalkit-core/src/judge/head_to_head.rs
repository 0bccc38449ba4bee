use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::client::JudgeClient;
use super::{judge_failure, request_verdict};
use crate::evaluator::{value_text, EvalOptions, Evaluator};
use crate::types::{EvalKind, EvalResult};

const DEFAULT_CRITERIA: &str = "overall quality";

/// Largest side-score gap at which a tie still counts as a pass.
const TIE_TOLERANCE: f64 = 1.0;

/// Pits the candidate (response A) against an alternative (response B, the
/// expected value) and scores from A's point of view.
pub struct HeadToHeadEvaluator {
    name: String,
    criteria: Option<String>,
    judge: Arc<dyn JudgeClient>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Winner {
    A,
    B,
    Tie,
}

impl Winner {
    /// Anything other than `A` or `B` is read as a tie.
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("A") => Winner::A,
            Some("B") => Winner::B,
            _ => Winner::Tie,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Winner::A => "A",
            Winner::B => "B",
            Winner::Tie => "Tie",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ComparisonVerdict {
    winner: Option<String>,
    confidence: Option<f64>,
    reasoning: Option<String>,
    response_a_score: f64,
    response_b_score: f64,
}

impl HeadToHeadEvaluator {
    pub fn new(judge: Arc<dyn JudgeClient>) -> Self {
        Self {
            name: "head_to_head".to_string(),
            criteria: None,
            judge,
        }
    }

    /// Default comparison criteria when the call does not supply any.
    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.criteria = Some(criteria.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn criteria_for<'a>(&'a self, options: &'a EvalOptions) -> &'a str {
        options
            .comparison_criteria
            .as_deref()
            .or(self.criteria.as_deref())
            .unwrap_or(DEFAULT_CRITERIA)
    }
}

fn prompt(candidate: &str, alternative: &str, criteria: &str) -> String {
    format!(
        r#"You are comparing two AI responses to decide which one is better.

RESPONSE A:
{candidate}

RESPONSE B:
{alternative}

Compare them on: {criteria}

Answer with a single JSON object and nothing else:
{{
  "winner": "A" or "B" or "Tie",
  "confidence": 1-5,
  "reasoning": "why the winner is better, or why they are equivalent",
  "response_a_score": 1-5,
  "response_b_score": 1-5
}}"#
    )
}

/// Maps a verdict onto (score, passed) from response A's perspective.
fn outcome(winner: Winner, a_score: f64, b_score: f64) -> (f64, bool) {
    match winner {
        Winner::A => (1.0, true),
        Winner::B => (0.0, false),
        Winner::Tie => (0.5, (a_score - b_score).abs() <= TIE_TOLERANCE),
    }
}

#[async_trait]
impl Evaluator for HeadToHeadEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EvalKind {
        EvalKind::ModelGraded
    }

    async fn evaluate(&self, candidate: &str, expected: &Value, options: &EvalOptions) -> Result<EvalResult> {
        let alternative = value_text(expected);
        let criteria = self.criteria_for(options);

        let verdict: ComparisonVerdict =
            match request_verdict(self.judge.as_ref(), &prompt(candidate, &alternative, criteria)).await {
                Ok(v) => v,
                Err(e) => return Ok(judge_failure("Head-to-head", &self.name, e)),
            };

        let winner = Winner::parse(verdict.winner.as_deref());
        let (score, passed) = outcome(winner, verdict.response_a_score, verdict.response_b_score);
        let confidence = verdict.confidence.unwrap_or(1.0) / 5.0;

        Ok(EvalResult::new(score, passed)
            .with_reasoning(verdict.reasoning.unwrap_or_else(|| "No reasoning provided".to_string()))
            .with_metadata(json!({
                "winner": winner.as_str(),
                "confidence": confidence,
                "response_a_score": verdict.response_a_score,
                "response_b_score": verdict.response_b_score,
                "alternative_response": alternative,
                "comparison_criteria": criteria,
                "model_used": self.judge.model_id(),
            })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CannedJudge;

    async fn judge_with(reply: &str) -> EvalResult {
        let evaluator = HeadToHeadEvaluator::new(CannedJudge::new(reply));
        evaluator
            .evaluate("Response A text", &json!("Response B text"), &EvalOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_winner_a() {
        let r = judge_with(r#"{"winner": "A", "confidence": 4, "response_a_score": 5, "response_b_score": 2}"#).await;
        assert!(r.passed());
        assert_eq!(r.normalized_score(), 1.0);
        assert!((r.meta("confidence").unwrap().as_f64().unwrap() - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_winner_b() {
        let r = judge_with(r#"{"winner": "B", "response_a_score": 2, "response_b_score": 5}"#).await;
        assert!(!r.passed());
        assert_eq!(r.normalized_score(), 0.0);
        assert_eq!(r.meta("alternative_response"), Some(&json!("Response B text")));
    }

    #[tokio::test]
    async fn test_tie_with_close_scores_passes() {
        let r = judge_with(r#"{"winner":"Tie","response_a_score":4,"response_b_score":3}"#).await;
        assert_eq!(r.normalized_score(), 0.5);
        assert!(r.passed());
    }

    #[tokio::test]
    async fn test_tie_with_distant_scores_fails() {
        let r = judge_with(r#"{"winner":"Tie","response_a_score":4,"response_b_score":1}"#).await;
        assert_eq!(r.normalized_score(), 0.5);
        assert!(!r.passed());
    }

    #[tokio::test]
    async fn test_unknown_winner_reads_as_tie() {
        let r = judge_with(r#"{"winner":"both","response_a_score":3,"response_b_score":3}"#).await;
        assert_eq!(r.meta("winner"), Some(&json!("Tie")));
        assert!(r.passed());
        let r = judge_with(r#"{"winner":"a","response_a_score":3,"response_b_score":3}"#).await;
        assert_eq!(r.meta("winner"), Some(&json!("A")));
    }

    #[tokio::test]
    async fn test_missing_side_score_is_failure() {
        let r = judge_with(r#"{"winner":"Tie","response_a_score":4}"#).await;
        assert!(!r.passed());
        assert_eq!(r.normalized_score(), 0.0);
        assert!(r.meta("error").and_then(Value::as_str).unwrap().contains("response_b_score"));
    }

    #[tokio::test]
    async fn test_criteria_precedence() {
        let judge = CannedJudge::new(r#"{"winner":"A","response_a_score":4,"response_b_score":3}"#);
        let evaluator = HeadToHeadEvaluator::new(judge.clone()).with_criteria("brevity");

        let r = evaluator.evaluate("a", &json!("b"), &EvalOptions::default()).await.unwrap();
        assert_eq!(r.meta("comparison_criteria"), Some(&json!("brevity")));
        assert!(judge.last_prompt().unwrap().contains("Compare them on: brevity"));

        let opts = EvalOptions::with_comparison_criteria("politeness");
        let r = evaluator.evaluate("a", &json!("b"), &opts).await.unwrap();
        assert_eq!(r.meta("comparison_criteria"), Some(&json!("politeness")));

        let plain = HeadToHeadEvaluator::new(judge);
        let r = plain.evaluate("a", &json!("b"), &EvalOptions::default()).await.unwrap();
        assert_eq!(r.meta("comparison_criteria"), Some(&json!("overall quality")));
    }
}
