use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::client::JudgeClient;
use super::{judge_failure, normalize_rubric, request_verdict, PASS_THRESHOLD};
use crate::error::EvalError;
use crate::evaluator::{EvalOptions, Evaluator};
use crate::types::{EvalKind, EvalResult};

/// Scores a response 1–5 against each named criterion of a rubric.
pub struct CriteriaEvaluator {
    name: String,
    criteria: Vec<(String, String)>,
    judge: Arc<dyn JudgeClient>,
}

#[derive(Debug, Deserialize)]
struct CriteriaVerdict {
    #[serde(default)]
    scores: Map<String, Value>,
    overall_score: f64,
    #[serde(default)]
    reasoning: Value,
    summary: Option<String>,
}

impl CriteriaEvaluator {
    /// `criteria` maps criterion name to description, in prompt order.
    pub fn new<I, K, V>(criteria: I, judge: Arc<dyn JudgeClient>) -> Result<Self, EvalError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let criteria: Vec<(String, String)> = criteria
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if criteria.is_empty() {
            return Err(EvalError::construction("criteria evaluator needs at least one criterion"));
        }
        Ok(Self {
            name: "criteria".to_string(),
            criteria,
            judge,
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn prompt(&self, candidate: &str) -> String {
        let rubric = self
            .criteria
            .iter()
            .map(|(name, description)| format!("- {}: {}", name, description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are grading an AI model's response against a rubric.

RESPONSE:
{candidate}

RUBRIC:
{rubric}

Rate every criterion on a 1-5 scale:
1 = criterion not met
2 = partially met
3 = adequately met
4 = well met
5 = fully met with distinction

Answer with a single JSON object and nothing else, using these fields:
- "scores": an object mapping each criterion name to its score
- "overall_score": the mean of the criterion scores
- "reasoning": a short justification for each criterion score
- "summary": a one or two sentence overall assessment

Example:
{{"scores": {{"accuracy": 4, "clarity": 3}}, "overall_score": 3.5, "reasoning": "accuracy: facts check out. clarity: rambles in places.", "summary": "Solid answer that could be tighter."}}"#
        )
    }

    fn criteria_map(&self) -> Map<String, Value> {
        self.criteria
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }
}

#[async_trait]
impl Evaluator for CriteriaEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EvalKind {
        EvalKind::ModelGraded
    }

    async fn evaluate(&self, candidate: &str, _expected: &Value, _options: &EvalOptions) -> Result<EvalResult> {
        let verdict: CriteriaVerdict = match request_verdict(self.judge.as_ref(), &self.prompt(candidate)).await {
            Ok(v) => v,
            Err(e) => return Ok(judge_failure("Criteria", &self.name, e)),
        };

        let score = normalize_rubric(verdict.overall_score);
        Ok(EvalResult::new(score, score >= PASS_THRESHOLD)
            .with_reasoning(verdict.summary.unwrap_or_else(|| "No summary provided".to_string()))
            .with_metadata(json!({
                "detailed_scores": verdict.scores,
                "detailed_reasoning": verdict.reasoning,
                "criteria": self.criteria_map(),
                "model_used": self.judge.model_id(),
            })))
    }
}
