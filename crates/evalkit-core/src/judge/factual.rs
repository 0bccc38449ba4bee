use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::client::JudgeClient;
use super::{judge_failure, normalize_rubric, request_verdict, PASS_THRESHOLD};
use crate::evaluator::{value_text, EvalOptions, Evaluator};
use crate::types::{EvalKind, EvalResult};

/// Most issues a judge may raise before a factual check fails outright.
const MAX_ISSUES: usize = 1;

/// Checks a response for consistency with a reference text (the expected value).
pub struct FactualConsistencyEvaluator {
    name: String,
    judge: Arc<dyn JudgeClient>,
}

#[derive(Debug, Deserialize)]
struct FactualVerdict {
    accuracy_score: Option<f64>,
    completeness_score: Option<f64>,
    hallucination_score: Option<f64>,
    overall_score: f64,
    #[serde(default)]
    issues: Vec<Value>,
    reasoning: Option<String>,
}

impl FactualConsistencyEvaluator {
    pub fn new(judge: Arc<dyn JudgeClient>) -> Self {
        Self {
            name: "factual_consistency".to_string(),
            judge,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

fn prompt(reference: &str, candidate: &str) -> String {
    format!(
        r#"You are checking whether a response is factually consistent with a reference text.

REFERENCE:
{reference}

RESPONSE:
{candidate}

Judge the response on:
1. Accuracy: nothing contradicts the reference
2. Completeness: the key points of the reference are covered
3. Hallucination: no claims appear that the reference does not support (5 = none)

Use a 1-5 scale throughout: 1 = major problems, 2 = some problems, 3 = adequate, 4 = good, 5 = excellent.

Answer with a single JSON object and nothing else:
{{
  "accuracy_score": 1-5,
  "completeness_score": 1-5,
  "hallucination_score": 1-5,
  "overall_score": 1-5,
  "issues": ["each specific problem found"],
  "reasoning": "explanation of the scores"
}}"#
    )
}

#[async_trait]
impl Evaluator for FactualConsistencyEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EvalKind {
        EvalKind::ModelGraded
    }

    async fn evaluate(&self, candidate: &str, expected: &Value, _options: &EvalOptions) -> Result<EvalResult> {
        let reference = value_text(expected);
        if reference.trim().is_empty() {
            return Ok(judge_failure(
                "Factual consistency",
                &self.name,
                anyhow::anyhow!("no reference text supplied"),
            ));
        }

        let verdict: FactualVerdict = match request_verdict(self.judge.as_ref(), &prompt(&reference, candidate)).await {
            Ok(v) => v,
            Err(e) => return Ok(judge_failure("Factual consistency", &self.name, e)),
        };

        let score = normalize_rubric(verdict.overall_score);
        let passed = score >= PASS_THRESHOLD && verdict.issues.len() <= MAX_ISSUES;

        Ok(EvalResult::new(score, passed)
            .with_reasoning(verdict.reasoning.unwrap_or_else(|| "No reasoning provided".to_string()))
            .with_metadata(json!({
                "accuracy_score": verdict.accuracy_score,
                "completeness_score": verdict.completeness_score,
                "hallucination_score": verdict.hallucination_score,
                "identified_issues": verdict.issues,
                "reference_text": reference,
                "model_used": self.judge.model_id(),
            })))
    }
}
