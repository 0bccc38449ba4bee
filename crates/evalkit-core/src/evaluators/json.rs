use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::evaluator::{EvalOptions, Evaluator};
use crate::types::{EvalKind, EvalResult};

/// Compares a JSON candidate with an expected JSON value.
///
/// In exact mode the two must be deep-equal. In partial mode the score is
/// the share of expected top-level entries reproduced plus required keys
/// present; it passes at 0.8 with no required key missing.
pub struct JsonMatchEvaluator {
	name: String,
	exact_match: bool,
	required_keys: Vec<String>,
}

const PARTIAL_PASS: f64 = 0.8;

impl JsonMatchEvaluator {
	/// Partial matching with no required keys.
	pub fn new() -> Self {
		Self {
			name: "json_match".to_string(),
			exact_match: false,
			required_keys: Vec::new(),
		}
	}

	pub fn exact() -> Self {
		Self {
			exact_match: true,
			..Self::new()
		}
	}

	pub fn with_required_keys<I, S>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.required_keys = keys.into_iter().map(Into::into).collect();
		self
	}

	pub fn named(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	fn missing_keys(&self, candidate: &Value) -> Vec<String> {
		self.required_keys
			.iter()
			.filter(|k| candidate.get(k.as_str()).is_none())
			.cloned()
			.collect()
	}
}

impl Default for JsonMatchEvaluator {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Evaluator for JsonMatchEvaluator {
	fn name(&self) -> &str {
		&self.name
	}

	fn kind(&self) -> EvalKind {
		EvalKind::JsonMatch
	}

	async fn evaluate(&self, candidate: &str, expected: &Value, _options: &EvalOptions) -> Result<EvalResult> {
		let completion: Value = match serde_json::from_str(candidate) {
			Ok(v) => v,
			Err(e) => {
				return Ok(EvalResult::new(0.0, false)
					.with_reasoning(format!("Invalid JSON in completion: {}", e))
					.with_metadata(json!({ "parse_error": e.to_string() })));
			}
		};

		let expected: Value = match expected {
			Value::String(text) => match serde_json::from_str(text) {
				Ok(v) => v,
				Err(e) => {
					return Ok(EvalResult::new(0.0, false)
						.with_reasoning(format!("Invalid JSON in expected: {}", e))
						.with_metadata(json!({ "expected_parse_error": e.to_string() })));
				}
			},
			other => other.clone(),
		};

		let missing = self.missing_keys(&completion);

		let (score, passed, reasoning) = if self.exact_match {
			let passed = json_eq(&completion, &expected) && missing.is_empty();
			let reasoning = if passed { "Exact JSON match" } else { "JSON structures differ" };
			(if passed { 1.0 } else { 0.0 }, passed, reasoning.to_string())
		} else {
			let Some(expected_obj) = expected.as_object() else {
				let msg = format!("expected value must be a JSON object for partial matching, got {}", expected);
				return Ok(EvalResult::new(0.0, false)
					.with_reasoning(format!("Invalid expected structure: {}", msg))
					.with_metadata(json!({ "expected_shape_error": msg })));
			};

			let total = expected_obj.len() + self.required_keys.len();
			let score = if total == 0 {
				1.0
			} else {
				let matching = expected_obj
					.iter()
					.filter(|(k, v)| completion.get(k.as_str()).is_some_and(|c| json_eq(c, v)))
					.count();
				let required_present = self.required_keys.len() - missing.len();
				(matching + required_present) as f64 / total as f64
			};
			let passed = score >= PARTIAL_PASS && missing.is_empty();
			let reasoning = format!("JSON similarity: {:.1}%, Missing keys: {:?}", score * 100.0, missing);
			(score, passed, reasoning)
		};

		Ok(EvalResult::new(score, passed)
			.with_reasoning(reasoning)
			.with_metadata(json!({
				"completion_keys": keys(&completion),
				"expected_keys": keys(&expected),
				"missing_required_keys": missing,
				"exact_match": self.exact_match,
			})))
	}
}

fn keys(v: &Value) -> Vec<String> {
	v.as_object()
		.map(|m| m.keys().cloned().collect())
		.unwrap_or_default()
}

/// Deep equality where `1` and `1.0` are the same number.
fn json_eq(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Number(x), Value::Number(y)) => {
			x == y || matches!((x.as_f64(), y.as_f64()), (Some(fx), Some(fy)) if fx == fy)
		}
		(Value::Array(xs), Value::Array(ys)) => {
			xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_eq(x, y))
		}
		(Value::Object(xs), Value::Object(ys)) => objects_eq(xs, ys),
		_ => a == b,
	}
}

fn objects_eq(xs: &Map<String, Value>, ys: &Map<String, Value>) -> bool {
	xs.len() == ys.len()
		&& xs
			.iter()
			.all(|(k, x)| ys.get(k).is_some_and(|y| json_eq(x, y)))
}
