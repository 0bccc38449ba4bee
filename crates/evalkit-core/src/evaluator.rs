use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EvalError;
use crate::types::{EvalKind, EvalResult};

/// Per-call inputs beyond the candidate and expected value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalOptions {
	/// What a head-to-head judge should compare on. Other evaluators ignore it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub comparison_criteria: Option<String>,
}

impl EvalOptions {
	pub fn with_comparison_criteria(criteria: impl Into<String>) -> Self {
		Self { comparison_criteria: Some(criteria.into()) }
	}
}

/// Grades one candidate against an expected value.
///
/// Implementations report gradeable problems as failed results. An `Err` means
/// the call itself was unusable (for example an `expected` of the wrong shape).
#[async_trait]
pub trait Evaluator: Send + Sync {
	fn name(&self) -> &str;

	fn kind(&self) -> EvalKind;

	async fn evaluate(&self, candidate: &str, expected: &Value, options: &EvalOptions) -> Result<EvalResult>;

	/// Evaluates `candidates[i]` against `expected[i]` in order.
	///
	/// Fails with [`EvalError::InputContract`] before grading anything when the
	/// lengths differ.
	async fn batch_evaluate(
		&self,
		candidates: &[String],
		expected: &[Value],
		options: &EvalOptions,
	) -> Result<Vec<EvalResult>> {
		ensure_paired(candidates.len(), expected.len())?;
		let mut results = Vec::with_capacity(candidates.len());
		for (candidate, exp) in candidates.iter().zip(expected) {
			results.push(self.evaluate(candidate, exp, options).await?);
		}
		Ok(results)
	}
}

pub(crate) fn ensure_paired(candidates: usize, expected: usize) -> Result<(), EvalError> {
	if candidates != expected {
		return Err(EvalError::InputContract { candidates, expected });
	}
	Ok(())
}

/// Text view of an expected value: strings as-is, `null` as empty, anything
/// else as compact JSON.
pub fn value_text(v: &Value) -> String {
	match v {
		Value::String(s) => s.clone(),
		Value::Null => String::new(),
		_ => v.to_string(),
	}
}
