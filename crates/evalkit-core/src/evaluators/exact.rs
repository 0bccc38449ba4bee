use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::evaluator::{value_text, EvalOptions, Evaluator};
use crate::types::{EvalKind, EvalResult};

/// Whole-string equality after trimming, case-folded unless configured otherwise.
pub struct ExactMatchEvaluator {
	name: String,
	case_sensitive: bool,
}

impl ExactMatchEvaluator {
	/// Case-insensitive exact match.
	pub fn new() -> Self {
		Self {
			name: "match".to_string(),
			case_sensitive: false,
		}
	}

	pub fn case_sensitive() -> Self {
		Self {
			case_sensitive: true,
			..Self::new()
		}
	}

	pub fn named(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	fn normalize(&self, s: &str) -> String {
		let trimmed = s.trim();
		if self.case_sensitive {
			trimmed.to_string()
		} else {
			trimmed.to_lowercase()
		}
	}
}

impl Default for ExactMatchEvaluator {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Evaluator for ExactMatchEvaluator {
	fn name(&self) -> &str {
		&self.name
	}

	fn kind(&self) -> EvalKind {
		EvalKind::Match
	}

	async fn evaluate(&self, candidate: &str, expected: &Value, _options: &EvalOptions) -> Result<EvalResult> {
		let completion = self.normalize(candidate);
		let expected = self.normalize(&value_text(expected));
		let passed = completion == expected;

		let reasoning = if passed {
			"Exact match".to_string()
		} else {
			format!("Expected '{}', got '{}'", expected, completion)
		};

		Ok(EvalResult::new(if passed { 1.0 } else { 0.0 }, passed)
			.with_reasoning(reasoning)
			.with_metadata(serde_json::json!({
				"case_sensitive": self.case_sensitive,
				"expected_length": expected.chars().count(),
				"completion_length": completion.chars().count(),
			})))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[tokio::test]
	async fn test_exact_match_ignores_case_and_whitespace() {
		let evaluator = ExactMatchEvaluator::new();
		let r = evaluator
			.evaluate("  Paris \n", &json!("paris"), &EvalOptions::default())
			.await
			.unwrap();
		assert!(r.passed());
		assert_eq!(r.normalized_score(), 1.0);
		assert_eq!(r.reasoning(), Some("Exact match"));
	}

	#[tokio::test]
	async fn test_exact_match_self_always_passes() {
		let evaluator = ExactMatchEvaluator::new();
		for s in ["a", "Hello World", "ÅNGSTRÖM", "  padded  ", "{\"k\": 1}"] {
			let r = evaluator.evaluate(s, &json!(s), &EvalOptions::default()).await.unwrap();
			assert!(r.passed(), "{s:?} should match itself");
			assert_eq!(r.normalized_score(), 1.0);
		}
	}

	#[tokio::test]
	async fn test_exact_match_case_sensitive_mismatch() {
		let evaluator = ExactMatchEvaluator::case_sensitive();
		let r = evaluator
			.evaluate("Paris", &json!("paris"), &EvalOptions::default())
			.await
			.unwrap();
		assert!(!r.passed());
		assert_eq!(r.normalized_score(), 0.0);
		assert_eq!(r.reasoning(), Some("Expected 'paris', got 'Paris'"));
		assert_eq!(r.meta("case_sensitive"), Some(&json!(true)));
		assert_eq!(r.meta("expected_length"), Some(&json!(5)));
	}
}
