use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::client::JudgeClient;
use super::{judge_failure, normalize_rubric, request_verdict, PASS_THRESHOLD};
use crate::evaluator::{EvalOptions, Evaluator};
use crate::types::{EvalKind, EvalResult};

/// Grades the quality of the reasoning in a response. No reference is used.
pub struct ChainOfThoughtEvaluator {
    name: String,
    judge: Arc<dyn JudgeClient>,
}

#[derive(Debug, Deserialize)]
struct ReasoningVerdict {
    logic_score: Option<f64>,
    clarity_score: Option<f64>,
    completeness_score: Option<f64>,
    accuracy_score: Option<f64>,
    overall_score: f64,
    #[serde(default)]
    strengths: Vec<Value>,
    #[serde(default)]
    weaknesses: Vec<Value>,
    reasoning: Option<String>,
}

impl ChainOfThoughtEvaluator {
    pub fn new(judge: Arc<dyn JudgeClient>) -> Self {
        Self {
            name: "chain_of_thought".to_string(),
            judge,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

fn prompt(candidate: &str) -> String {
    format!(
        r#"You are assessing the quality of the reasoning in an AI response.

RESPONSE:
{candidate}

Rate the reasoning on a 1-5 scale for:
1. Logic: each step follows from the previous ones
2. Clarity: the reasoning is easy to follow
3. Completeness: no necessary step is skipped
4. Accuracy: the reasoning arrives at a correct conclusion

Answer with a single JSON object and nothing else:
{{
  "logic_score": 1-5,
  "clarity_score": 1-5,
  "completeness_score": 1-5,
  "accuracy_score": 1-5,
  "overall_score": 1-5,
  "strengths": ["what the reasoning does well"],
  "weaknesses": ["where the reasoning falls short"],
  "reasoning": "analysis supporting the scores"
}}"#
    )
}

#[async_trait]
impl Evaluator for ChainOfThoughtEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EvalKind {
        EvalKind::ModelGraded
    }

    async fn evaluate(&self, candidate: &str, _expected: &Value, _options: &EvalOptions) -> Result<EvalResult> {
        let verdict: ReasoningVerdict = match request_verdict(self.judge.as_ref(), &prompt(candidate)).await {
            Ok(v) => v,
            Err(e) => return Ok(judge_failure("Chain-of-thought", &self.name, e)),
        };

        let score = normalize_rubric(verdict.overall_score);
        Ok(EvalResult::new(score, score >= PASS_THRESHOLD)
            .with_reasoning(verdict.reasoning.unwrap_or_else(|| "No reasoning provided".to_string()))
            .with_metadata(json!({
                "logic_score": verdict.logic_score,
                "clarity_score": verdict.clarity_score,
                "completeness_score": verdict.completeness_score,
                "accuracy_score": verdict.accuracy_score,
                "strengths": verdict.strengths,
                "weaknesses": verdict.weaknesses,
                "model_used": self.judge.model_id(),
            })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CannedJudge;

    const SOLUTION: &str = "Let me think step by step. 15% of 80 is 0.15 * 80 = 12. So the answer is 12.";

    #[tokio::test]
    async fn test_cot_good_reasoning() {
        let judge = CannedJudge::new(
            r#"{"logic_score": 5, "clarity_score": 5, "completeness_score": 4, "accuracy_score": 5,
                "overall_score": 5, "strengths": ["shows the multiplication"], "weaknesses": [],
                "reasoning": "Correct and clear."}"#,
        );
        let evaluator = ChainOfThoughtEvaluator::new(judge.clone());
        let r = evaluator.evaluate(SOLUTION, &Value::Null, &EvalOptions::default()).await.unwrap();
        assert!(r.passed());
        assert_eq!(r.normalized_score(), 1.0);
        assert_eq!(r.meta("strengths"), Some(&json!(["shows the multiplication"])));
        assert_eq!(r.reasoning(), Some("Correct and clear."));
        assert!(judge.last_prompt().unwrap().contains("0.15 * 80"));
    }

    #[tokio::test]
    async fn test_cot_weak_reasoning() {
        let judge = CannedJudge::new(r#"{"overall_score": 2, "weaknesses": ["no steps shown"]}"#);
        let evaluator = ChainOfThoughtEvaluator::new(judge);
        let r = evaluator.evaluate("12", &Value::Null, &EvalOptions::default()).await.unwrap();
        assert!(!r.passed());
        assert!((r.normalized_score() - 0.4).abs() < 1e-9);
        assert_eq!(r.meta("strengths"), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_cot_wrongly_typed_field_is_failure() {
        let judge = CannedJudge::new(r#"{"overall_score": "excellent"}"#);
        let evaluator = ChainOfThoughtEvaluator::new(judge);
        let r = evaluator.evaluate(SOLUTION, &Value::Null, &EvalOptions::default()).await.unwrap();
        assert!(!r.passed());
        assert_eq!(r.normalized_score(), 0.0);
        assert!(r.reasoning().unwrap().starts_with("Chain-of-thought evaluation failed"));
    }
}
